//! Session-based authentication
//!
//! Maps opaque session credentials to user identities, covering account
//! registration, login/logout and the self-service profile operations. An
//! anonymous login synthesizes a throwaway user (`anonymous_<sessionId>`)
//! whose namespace and rows are torn down again at logout.

use crate::store::{MetadataStore, StorageBackend};
use crate::validate;
use datacat_core::{
    authentication_error, not_found_error, parameter_error, CatalogError, CatalogResult, Session,
    SessionSettings, User, UserRole,
};
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "session_authenticator";

pub struct SessionAuthenticator {
    store: Arc<dyn MetadataStore>,
    backend: Arc<dyn StorageBackend>,
    settings: SessionSettings,
}

impl SessionAuthenticator {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        backend: Arc<dyn StorageBackend>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            backend,
            settings,
        }
    }

    async fn session_row(&self, session_id: &str) -> CatalogResult<(String, Session)> {
        self.store.get_session(session_id).await?.ok_or_else(|| {
            authentication_error!(format!("Invalid session '{}'", session_id), COMPONENT)
        })
    }

    async fn user_row(&self, user_id: &str) -> CatalogResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("user '{}'", user_id), COMPONENT))
    }

    /// Register a new account and provision its physical namespace. The
    /// user row is compensated away again if provisioning fails.
    pub async fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password: &str,
        organization: &str,
    ) -> CatalogResult<User> {
        validate::check_alias(id, "user id")?;
        validate::check_parameter(name, "name")?;
        validate::check_email(email)?;
        validate::check_parameter(password, "password")?;

        let user = User::new(id, name, email, password, organization, UserRole::User);
        self.store.insert_user(&user).await?;
        if let Err(err) = self.backend.create_namespace(id).await {
            if let Err(cleanup) = self.store.delete_user(id).await {
                warn!("Failed to roll back user row '{}': {}", id, cleanup);
            }
            return Err(err);
        }
        info!("Registered user '{}'", id);
        Ok(user.without_password())
    }

    /// Open a session. Unknown users and credential mismatches fail the
    /// same way so a caller cannot probe which ids exist.
    pub async fn login(&self, user_id: &str, password: &str, ip: &str) -> CatalogResult<Session> {
        validate::check_parameter(user_id, "user id")?;
        validate::check_parameter(password, "password")?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| authentication_error!("Bad user or password", COMPONENT))?;
        if user.password != password {
            return Err(authentication_error!("Bad user or password", COMPONENT));
        }

        let session = Session::new(ip);
        self.store.insert_session(user_id, &session).await?;
        self.store.touch_user(user_id).await?;
        info!("User '{}' logged in from {}", user_id, ip);
        Ok(session)
    }

    /// Open an anonymous session with a synthesized user id. Every step
    /// that fails compensates the earlier ones away, so a half-created
    /// anonymous identity never lingers.
    pub async fn login_anonymous(&self, ip: &str) -> CatalogResult<Session> {
        if !self.settings.allow_anonymous {
            return Err(authentication_error!(
                "Anonymous sessions are disabled",
                COMPONENT
            ));
        }
        let session = Session::new(ip);
        let user_id = format!("anonymous_{}", session.id);
        let user = User::new(&user_id, "Anonymous", "", "", "", UserRole::Anonymous);

        self.store.insert_user(&user).await?;
        if let Err(err) = self.store.insert_session(&user_id, &session).await {
            if let Err(cleanup) = self.store.delete_user(&user_id).await {
                warn!(
                    "Failed to roll back anonymous user '{}': {}",
                    user_id, cleanup
                );
            }
            return Err(err);
        }
        if let Err(err) = self.backend.create_namespace(&user_id).await {
            if let Err(cleanup) = self.store.delete_session(&session.id).await {
                warn!("Failed to roll back session '{}': {}", session.id, cleanup);
            }
            if let Err(cleanup) = self.store.delete_user(&user_id).await {
                warn!(
                    "Failed to roll back anonymous user '{}': {}",
                    user_id, cleanup
                );
            }
            return Err(err);
        }
        info!("Anonymous user '{}' logged in from {}", user_id, ip);
        Ok(session)
    }

    /// Close a session. Anonymous sessions are routed through
    /// [`Self::logout_anonymous`] so their identity is cleaned up too.
    pub async fn logout(&self, session_id: &str) -> CatalogResult<()> {
        let (user_id, _) = self.session_row(session_id).await?;
        if let Some(user) = self.store.get_user(&user_id).await? {
            if user.role == UserRole::Anonymous {
                return self.logout_anonymous(session_id).await;
            }
        }
        self.store.delete_session(session_id).await?;
        info!("User '{}' logged out", user_id);
        Ok(())
    }

    /// Close an anonymous session and remove the synthesized identity.
    /// The physical namespace goes first; if that fails the rows stay
    /// behind, so no namespace is ever orphaned without a catalog entry.
    pub async fn logout_anonymous(&self, session_id: &str) -> CatalogResult<()> {
        let (user_id, _) = self.session_row(session_id).await?;
        let user = self.user_row(&user_id).await?;
        if user.role != UserRole::Anonymous {
            return Err(parameter_error!(
                format!("Session '{}' does not belong to an anonymous user", session_id),
                COMPONENT
            ));
        }
        self.backend.delete_namespace(&user_id).await?;
        self.store.delete_session(session_id).await?;
        self.store.delete_user(&user_id).await?;
        info!("Anonymous user '{}' logged out", user_id);
        Ok(())
    }

    /// Resolve a session credential to its user id, expiring idle
    /// sessions on the way.
    pub async fn resolve_user(&self, session_id: &str) -> CatalogResult<String> {
        let (user_id, session) = self.session_row(session_id).await?;
        if session.is_expired(self.settings.ttl_minutes) {
            if let Err(err) = self.store.delete_session(session_id).await {
                warn!("Failed to drop expired session {}: {}", session_id, err);
            }
            return Err(authentication_error!(
                format!("Session '{}' has expired", session_id),
                COMPONENT
            ));
        }
        self.store.touch_session(session_id).await?;
        Ok(user_id)
    }

    /// Verify the session belongs to `claimed_user_id`; gates the
    /// self-service operations and project creation.
    pub async fn require_ownership(
        &self,
        claimed_user_id: &str,
        session_id: &str,
    ) -> CatalogResult<String> {
        let resolved = self.resolve_user(session_id).await?;
        if resolved != claimed_user_id {
            return Err(CatalogError::permission_denied(
                format!("Session does not belong to user '{}'", claimed_user_id),
                COMPONENT,
            ));
        }
        Ok(resolved)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        self.require_ownership(user_id, session_id).await?;
        validate::check_parameter(new_password, "new password")?;
        let user = self.user_row(user_id).await?;
        if user.password != old_password {
            return Err(authentication_error!("Bad user or password", COMPONENT));
        }
        self.store
            .update_user_password(user_id, new_password)
            .await?;
        info!("User '{}' changed their password", user_id);
        Ok(())
    }

    pub async fn change_email(
        &self,
        user_id: &str,
        new_email: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        self.require_ownership(user_id, session_id).await?;
        validate::check_email(new_email)?;
        self.store.update_user_email(user_id, new_email).await?;
        info!("User '{}' changed their email", user_id);
        Ok(())
    }

    /// Self-service profile read; the credential field comes back blank.
    pub async fn get_user(&self, user_id: &str, session_id: &str) -> CatalogResult<User> {
        self.require_ownership(user_id, session_id).await?;
        self.store.touch_user(user_id).await?;
        Ok(self.user_row(user_id).await?.without_password())
    }
}
