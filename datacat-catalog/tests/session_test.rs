//! Account and session lifecycle tests

mod helpers;

use chrono::{Duration, Utc};
use datacat_catalog::prelude::*;
use datacat_catalog::resources::paths;
use helpers::{register, spawn_catalog, spawn_faulty_catalog};
use std::sync::Arc;

#[tokio::test]
async fn create_user_provisions_a_namespace() {
    let cat = spawn_catalog();
    let user = cat
        .service
        .create_user("imedina", "Ignacio Medina", "imedina@ebi.ac.uk", "pw", "EBI")
        .await
        .unwrap();

    assert_eq!(user.id, "imedina");
    assert_eq!(user.role, UserRole::User);
    // The credential never travels back out
    assert!(user.password.is_empty());
    assert!(cat.backend.exists(&paths::user_root("imedina")).await);
}

#[tokio::test]
async fn duplicate_user_id_is_rejected() {
    let cat = spawn_catalog();
    cat.service
        .create_user("imedina", "Ignacio Medina", "imedina@ebi.ac.uk", "pw", "EBI")
        .await
        .unwrap();

    let result = cat
        .service
        .create_user("imedina", "Someone Else", "other@ebi.ac.uk", "pw2", "EBI")
        .await;
    match result.unwrap_err() {
        CatalogError::Duplicate { resource, .. } => {
            assert!(resource.contains("imedina"));
        }
        _ => panic!("Expected Duplicate error"),
    }
}

#[tokio::test]
async fn malformed_account_fields_are_rejected() {
    let cat = spawn_catalog();

    // Slash in the id breaks the alias rules
    let result = cat
        .service
        .create_user("bad/id", "Bad", "bad@example.com", "pw", "org")
        .await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Parameter { .. }
    ));

    // Email without a domain
    let result = cat
        .service
        .create_user("gooduser", "Good", "not-an-email", "pw", "org")
        .await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Parameter { .. }
    ));
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() {
    let cat = spawn_catalog();
    cat.service
        .create_user("imedina", "Ignacio Medina", "imedina@ebi.ac.uk", "pw", "EBI")
        .await
        .unwrap();

    // Wrong password and unknown user produce the same message, so a
    // caller cannot probe which account ids exist
    let wrong_password = cat
        .service
        .login("imedina", "nope", "127.0.0.1")
        .await
        .unwrap_err();
    let unknown_user = cat
        .service
        .login("nobody", "pw", "127.0.0.1")
        .await
        .unwrap_err();

    match (&wrong_password, &unknown_user) {
        (
            CatalogError::Authentication { message: a, .. },
            CatalogError::Authentication { message: b, .. },
        ) => assert_eq!(a, b),
        _ => panic!("Expected Authentication errors"),
    }
}

#[tokio::test]
async fn session_resolves_to_its_user() {
    let cat = spawn_catalog();
    let sid = register(&cat.service, "imedina").await;

    assert_eq!(cat.service.resolve_user(&sid).await.unwrap(), "imedina");

    let result = cat.service.resolve_user("not-a-session").await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Authentication { .. }
    ));
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let cat = spawn_catalog();
    let sid = register(&cat.service, "imedina").await;

    cat.service.logout(&sid).await.unwrap();
    assert!(cat.service.resolve_user(&sid).await.is_err());

    // A second logout has nothing to tear down
    assert!(cat.service.logout(&sid).await.is_err());
}

#[tokio::test]
async fn idle_sessions_expire() {
    let store = Arc::new(MemoryMetadataStore::new());
    let mut config = CatalogConfig::default();
    config.session.ttl_minutes = 60;
    let service = CatalogService::builder()
        .with_metadata_store(store.clone())
        .with_config(config)
        .build()
        .unwrap();

    service
        .create_user("imedina", "Ignacio Medina", "imedina@ebi.ac.uk", "pw", "EBI")
        .await
        .unwrap();

    // Plant a session whose last activity is two hours old
    let mut stale = Session::new("127.0.0.1");
    stale.last_activity = Utc::now() - Duration::minutes(120);
    store.insert_session("imedina", &stale).await.unwrap();

    match service.resolve_user(&stale.id).await.unwrap_err() {
        CatalogError::Authentication { message, .. } => {
            assert!(message.contains("expired"));
        }
        _ => panic!("Expected Authentication error"),
    }

    // The expired row is gone, not just refused
    assert!(store.get_session(&stale.id).await.unwrap().is_none());
}

#[tokio::test]
async fn anonymous_lifecycle_cleans_up_after_itself() {
    let cat = spawn_catalog();
    let session = cat.service.login_anonymous("10.0.0.5").await.unwrap();

    let user_id = cat.service.resolve_user(&session.id).await.unwrap();
    assert!(user_id.starts_with("anonymous_"));
    assert!(cat.backend.exists(&paths::user_root(&user_id)).await);

    cat.service.logout(&session.id).await.unwrap();

    // Session, synthesized user and namespace are all gone
    assert!(cat.service.resolve_user(&session.id).await.is_err());
    assert!(cat.store.get_user(&user_id).await.unwrap().is_none());
    assert!(!cat.backend.exists(&paths::user_root(&user_id)).await);
}

#[tokio::test]
async fn anonymous_login_can_be_disabled() {
    let mut config = CatalogConfig::default();
    config.session.allow_anonymous = false;
    let service = CatalogService::builder()
        .with_config(config)
        .build()
        .unwrap();

    let result = service.login_anonymous("10.0.0.5").await;
    match result.unwrap_err() {
        CatalogError::Authentication { message, .. } => {
            assert!(message.contains("disabled"));
        }
        _ => panic!("Expected Authentication error"),
    }
}

#[tokio::test]
async fn failed_anonymous_namespace_rolls_back_the_identity() {
    let cat = spawn_faulty_catalog();
    cat.backend.deny("anonymous_").await;

    let error = cat.service.login_anonymous("10.0.0.5").await.unwrap_err();
    assert!(error.is_recoverable());

    // Once the backend recovers a fresh login goes through end to end
    cat.backend.heal().await;
    let session = cat.service.login_anonymous("10.0.0.5").await.unwrap();
    let user_id = cat.service.resolve_user(&session.id).await.unwrap();
    assert!(cat.backend.exists(&paths::user_root(&user_id)).await);
}

#[tokio::test]
async fn sessions_do_not_transfer_between_users() {
    let cat = spawn_catalog();
    let _imedina = register(&cat.service, "imedina").await;
    let pfurio = register(&cat.service, "pfurio").await;

    // pfurio's session cannot create projects owned by imedina
    let result = cat
        .service
        .create_project("imedina", "Stolen", "stolen", "desc", "org", &pfurio)
        .await;
    match result.unwrap_err() {
        CatalogError::PermissionDenied { message, .. } => {
            assert!(message.contains("imedina"));
        }
        _ => panic!("Expected PermissionDenied error"),
    }

    // Nor read imedina's profile
    let result = cat.service.get_user("imedina", &pfurio).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn change_password_requires_the_old_one() {
    let cat = spawn_catalog();
    let sid = register(&cat.service, "imedina").await;

    let result = cat
        .service
        .change_password("imedina", "wrong", "next", &sid)
        .await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Authentication { .. }
    ));

    cat.service
        .change_password("imedina", "secret", "next", &sid)
        .await
        .unwrap();

    // Old credential is dead, new one works
    assert!(cat.service.login("imedina", "secret", "::1").await.is_err());
    assert!(cat.service.login("imedina", "next", "::1").await.is_ok());
}

#[tokio::test]
async fn change_email_validates_and_sticks() {
    let cat = spawn_catalog();
    let sid = register(&cat.service, "imedina").await;

    let result = cat.service.change_email("imedina", "broken@", &sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Parameter { .. }
    ));

    cat.service
        .change_email("imedina", "nacho@ebi.ac.uk", &sid)
        .await
        .unwrap();

    let user = cat.service.get_user("imedina", &sid).await.unwrap();
    assert_eq!(user.email, "nacho@ebi.ac.uk");
    assert!(user.password.is_empty());
}
