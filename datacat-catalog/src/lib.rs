//! datacat-catalog - Authorization and resource lifecycle for the data catalog
//!
//! The catalog organizes data as Users → Projects → Studies → Files and
//! folders, with analyses and jobs registered under studies. Every resource
//! carries an inline ACL; sessions gate every operation.
//!
//! ## Architecture
//!
//! - **auth**: session authentication, effective-permission resolution
//!   (AND-merged down the containment chain) and listing filters
//! - **resources**: lifecycle coordination between the metadata store and
//!   the physical backend, with compensating rollback
//! - **store**: the metadata-store and storage-backend seams plus their
//!   in-memory implementations
//!
//! [`CatalogService`] ties these together behind a session-credential
//! surface: resolve the caller, authorize, then mutate or prune.

pub mod auth;
pub mod resources;
pub mod store;
pub mod validate;

pub use auth::{AclResolver, ResultFilter, SessionAuthenticator};
pub use resources::{FileUpdate, ProjectUpdate, ResourceManager, StudyUpdate};
pub use store::{MemoryMetadataStore, MemoryStorageBackend, MetadataStore, StorageBackend};

use datacat_core::{
    AclEntry, Analysis, CatalogConfig, CatalogResult, File, Job, Project, Session, Study,
    StudyType, User,
};
use std::sync::Arc;

/// Facade over the whole catalog core. Every operation takes an opaque
/// session credential, resolves the caller, authorizes, and delegates.
pub struct CatalogService {
    authenticator: SessionAuthenticator,
    manager: ResourceManager,
    config: CatalogConfig,
}

/// Builder for [`CatalogService`]; unset collaborators fall back to the
/// in-memory implementations.
pub struct CatalogServiceBuilder {
    store: Option<Arc<dyn MetadataStore>>,
    backend: Option<Arc<dyn StorageBackend>>,
    config: CatalogConfig,
}

impl CatalogServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            backend: None,
            config: CatalogConfig::default(),
        }
    }

    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_storage_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CatalogResult<CatalogService> {
        self.config.validate()?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryMetadataStore::new()));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryStorageBackend::new()));
        let authenticator = SessionAuthenticator::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            self.config.session.clone(),
        );
        let manager = ResourceManager::new(store, backend);
        Ok(CatalogService {
            authenticator,
            manager,
            config: self.config,
        })
    }
}

impl Default for CatalogServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogService {
    pub fn builder() -> CatalogServiceBuilder {
        CatalogServiceBuilder::new()
    }

    /// Fully in-memory service with default configuration; the usual
    /// starting point for tests and experiments.
    pub fn in_memory() -> Self {
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorageBackend::new());
        let config = CatalogConfig::default();
        let authenticator = SessionAuthenticator::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            config.session.clone(),
        );
        let manager = ResourceManager::new(store, backend);
        Self {
            authenticator,
            manager,
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    // -- accounts and sessions --------------------------------------------

    pub async fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password: &str,
        organization: &str,
    ) -> CatalogResult<User> {
        self.authenticator
            .create_user(id, name, email, password, organization)
            .await
    }

    pub async fn login(&self, user_id: &str, password: &str, ip: &str) -> CatalogResult<Session> {
        self.authenticator.login(user_id, password, ip).await
    }

    pub async fn login_anonymous(&self, ip: &str) -> CatalogResult<Session> {
        self.authenticator.login_anonymous(ip).await
    }

    pub async fn logout(&self, session_id: &str) -> CatalogResult<()> {
        self.authenticator.logout(session_id).await
    }

    pub async fn resolve_user(&self, session_id: &str) -> CatalogResult<String> {
        self.authenticator.resolve_user(session_id).await
    }

    pub async fn get_user(&self, user_id: &str, session_id: &str) -> CatalogResult<User> {
        self.authenticator.get_user(user_id, session_id).await
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        self.authenticator
            .change_password(user_id, old_password, new_password, session_id)
            .await
    }

    pub async fn change_email(
        &self,
        user_id: &str,
        new_email: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        self.authenticator
            .change_email(user_id, new_email, session_id)
            .await
    }

    // -- projects ---------------------------------------------------------

    /// Create a project owned by `owner_id`; the session must belong to
    /// that same user.
    pub async fn create_project(
        &self,
        owner_id: &str,
        name: &str,
        alias: &str,
        description: &str,
        organization: &str,
        session_id: &str,
    ) -> CatalogResult<Project> {
        let caller = self
            .authenticator
            .require_ownership(owner_id, session_id)
            .await?;
        self.manager
            .create_project(&caller, name, alias, description, organization)
            .await
    }

    pub async fn get_project(&self, project_id: &str, session_id: &str) -> CatalogResult<Project> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.get_project(project_id, &caller).await
    }

    pub async fn list_projects(
        &self,
        owner_id: Option<&str>,
        session_id: &str,
    ) -> CatalogResult<Vec<Project>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.list_projects(owner_id, &caller).await
    }

    pub async fn modify_project(
        &self,
        project_id: &str,
        update: ProjectUpdate,
        session_id: &str,
    ) -> CatalogResult<Project> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.modify_project(project_id, update, &caller).await
    }

    pub async fn rename_project(
        &self,
        project_id: &str,
        new_alias: &str,
        session_id: &str,
    ) -> CatalogResult<Project> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .rename_project(project_id, new_alias, &caller)
            .await
    }

    pub async fn delete_project(&self, project_id: &str, session_id: &str) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.delete_project(project_id, &caller).await
    }

    pub async fn share_project(
        &self,
        project_id: &str,
        entry: AclEntry,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.share_project(project_id, entry, &caller).await
    }

    pub async fn unshare_project(
        &self,
        project_id: &str,
        principal: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .unshare_project(project_id, principal, &caller)
            .await
    }

    // -- studies ----------------------------------------------------------

    pub async fn create_study(
        &self,
        project_id: &str,
        name: &str,
        alias: &str,
        study_type: StudyType,
        description: &str,
        session_id: &str,
    ) -> CatalogResult<Study> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .create_study(project_id, name, alias, study_type, description, &caller)
            .await
    }

    pub async fn get_study(&self, study_id: &str, session_id: &str) -> CatalogResult<Study> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.get_study(study_id, &caller).await
    }

    pub async fn list_studies(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> CatalogResult<Vec<Study>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.list_studies(project_id, &caller).await
    }

    pub async fn modify_study(
        &self,
        study_id: &str,
        update: StudyUpdate,
        session_id: &str,
    ) -> CatalogResult<Study> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.modify_study(study_id, update, &caller).await
    }

    pub async fn delete_study(&self, study_id: &str, session_id: &str) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.delete_study(study_id, &caller).await
    }

    pub async fn share_study(
        &self,
        study_id: &str,
        entry: AclEntry,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.share_study(study_id, entry, &caller).await
    }

    pub async fn unshare_study(
        &self,
        study_id: &str,
        principal: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .unshare_study(study_id, principal, &caller)
            .await
    }

    // -- files and folders ------------------------------------------------

    pub async fn create_folder(
        &self,
        study_id: &str,
        path: &str,
        parents: bool,
        session_id: &str,
    ) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .create_folder(study_id, path, parents, &caller)
            .await
    }

    pub async fn create_file(
        &self,
        study_id: &str,
        path: &str,
        parents: bool,
        session_id: &str,
    ) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .create_file(study_id, path, parents, &caller)
            .await
    }

    pub async fn upload_file(
        &self,
        file_id: &str,
        data: &[u8],
        session_id: &str,
    ) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.upload_file(file_id, data, &caller).await
    }

    pub async fn download_file(
        &self,
        file_id: &str,
        offset: u64,
        limit: Option<u64>,
        session_id: &str,
    ) -> CatalogResult<Vec<u8>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .download_file(file_id, offset, limit, &caller)
            .await
    }

    pub async fn get_file(&self, file_id: &str, session_id: &str) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.get_file(file_id, &caller).await
    }

    pub async fn list_files(&self, study_id: &str, session_id: &str) -> CatalogResult<Vec<File>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.list_files(study_id, &caller).await
    }

    pub async fn modify_file(
        &self,
        file_id: &str,
        update: FileUpdate,
        session_id: &str,
    ) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.modify_file(file_id, update, &caller).await
    }

    pub async fn rename_file(
        &self,
        file_id: &str,
        new_name: &str,
        session_id: &str,
    ) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.rename_file(file_id, new_name, &caller).await
    }

    pub async fn set_file_ready(&self, file_id: &str, session_id: &str) -> CatalogResult<File> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.set_file_ready(file_id, &caller).await
    }

    pub async fn delete_file(&self, file_id: &str, session_id: &str) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.delete_file(file_id, &caller).await
    }

    pub async fn share_file(
        &self,
        file_id: &str,
        entry: AclEntry,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.share_file(file_id, entry, &caller).await
    }

    pub async fn unshare_file(
        &self,
        file_id: &str,
        principal: &str,
        session_id: &str,
    ) -> CatalogResult<()> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.unshare_file(file_id, principal, &caller).await
    }

    // -- analyses and jobs ------------------------------------------------

    pub async fn create_analysis(
        &self,
        study_id: &str,
        name: &str,
        alias: &str,
        description: &str,
        session_id: &str,
    ) -> CatalogResult<Analysis> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .create_analysis(study_id, name, alias, description, &caller)
            .await
    }

    pub async fn get_analysis(
        &self,
        analysis_id: &str,
        session_id: &str,
    ) -> CatalogResult<Analysis> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.get_analysis(analysis_id, &caller).await
    }

    pub async fn list_analyses(
        &self,
        study_id: &str,
        session_id: &str,
    ) -> CatalogResult<Vec<Analysis>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.list_analyses(study_id, &caller).await
    }

    pub async fn create_job(
        &self,
        analysis_id: &str,
        name: &str,
        tool_name: &str,
        command_line: &str,
        description: &str,
        session_id: &str,
    ) -> CatalogResult<Job> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager
            .create_job(
                analysis_id,
                name,
                tool_name,
                command_line,
                description,
                &caller,
            )
            .await
    }

    pub async fn get_job(&self, job_id: &str, session_id: &str) -> CatalogResult<Job> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.get_job(job_id, &caller).await
    }

    pub async fn list_jobs(&self, analysis_id: &str, session_id: &str) -> CatalogResult<Vec<Job>> {
        let caller = self.authenticator.resolve_user(session_id).await?;
        self.manager.list_jobs(analysis_id, &caller).await
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::{
        CatalogService, CatalogServiceBuilder, FileUpdate, ProjectUpdate, StudyUpdate,
    };
    pub use crate::store::{
        MemoryMetadataStore, MemoryStorageBackend, MetadataStore, StorageBackend,
    };
    pub use datacat_core::{
        AclEntry, Analysis, CatalogConfig, CatalogError, CatalogResult, File, FileStatus,
        FileType, Job, JobStatus, Permission, Project, Session, Study, StudyType, User,
        UserRole, OTHERS_PRINCIPAL,
    };
}
