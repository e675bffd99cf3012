//! Effective-permission resolution across the containment chain
//!
//! Covers owner bypass, explicit grants and denials, wildcard fallback,
//! verbatim inheritance and the AND-merge that keeps descendant grants
//! inside ancestor bounds.

mod helpers;

use datacat_catalog::prelude::*;
use helpers::{project_study, register, spawn_catalog, TestCatalog};

/// A project and study owned by imedina with three files under `data/`,
/// plus a registered guest with no grants yet.
struct AclWorld {
    cat: TestCatalog,
    owner_sid: String,
    guest_sid: String,
    project_id: String,
    study_id: String,
    shared_file: String,
    denied_file: String,
    plain_file: String,
}

async fn spawn_world() -> AclWorld {
    let cat = spawn_catalog();
    let owner_sid = register(&cat.service, "imedina").await;
    let guest_sid = register(&cat.service, "pfurio").await;
    let (project_id, study_id) = project_study(&cat.service, "imedina", &owner_sid).await;

    let shared_file = cat
        .service
        .create_file(&study_id, "data/shared.txt", false, &owner_sid)
        .await
        .unwrap()
        .id;
    let denied_file = cat
        .service
        .create_file(&study_id, "data/denied.txt", false, &owner_sid)
        .await
        .unwrap()
        .id;
    let plain_file = cat
        .service
        .create_file(&study_id, "data/plain.txt", false, &owner_sid)
        .await
        .unwrap()
        .id;

    AclWorld {
        cat,
        owner_sid,
        guest_sid,
        project_id,
        study_id,
        shared_file,
        denied_file,
        plain_file,
    }
}

impl AclWorld {
    /// Grant the guest read on the project so file-level cases are not
    /// masked by the root of the chain.
    async fn grant_project_read(&self) {
        self.cat
            .service
            .share_project(
                &self.project_id,
                AclEntry::new("pfurio", true, false, false, false),
                &self.owner_sid,
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn read_file_by_owner() {
    let w = spawn_world().await;

    // No ACL rows anywhere mention the owner, yet every read succeeds
    for id in [&w.shared_file, &w.denied_file, &w.plain_file] {
        let file = w.cat.service.get_file(id, &w.owner_sid).await.unwrap();
        assert!(file.path.starts_with("data/"));
    }
    let files = w
        .cat
        .service
        .list_files(&w.study_id, &w.owner_sid)
        .await
        .unwrap();
    assert_eq!(files.len(), 5);
}

#[tokio::test]
async fn read_explicitly_shared_file() {
    let w = spawn_world().await;
    w.grant_project_read().await;
    w.cat
        .service
        .share_file(
            &w.shared_file,
            AclEntry::new("pfurio", true, false, false, false),
            &w.owner_sid,
        )
        .await
        .unwrap();

    let file = w
        .cat
        .service
        .get_file(&w.shared_file, &w.guest_sid)
        .await
        .unwrap();
    assert_eq!(file.path, "data/shared.txt");
}

#[tokio::test]
async fn read_explicitly_unshared_file() {
    let w = spawn_world().await;
    w.grant_project_read().await;
    w.cat
        .service
        .share_file(&w.denied_file, AclEntry::none("pfurio"), &w.owner_sid)
        .await
        .unwrap();

    // The explicit all-false row beats the readable ancestor chain
    let result = w.cat.service.get_file(&w.denied_file, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn read_inherited_shared_file() {
    let w = spawn_world().await;
    w.grant_project_read().await;

    // No file row, no study row: the project grant flows down verbatim
    let file = w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .unwrap();
    assert_eq!(file.path, "data/plain.txt");
}

#[tokio::test]
async fn read_inherited_forbidden_file() {
    let w = spawn_world().await;
    w.cat
        .service
        .share_project(&w.project_id, AclEntry::none("pfurio"), &w.owner_sid)
        .await
        .unwrap();
    w.cat
        .service
        .share_study(
            &w.study_id,
            AclEntry::new("pfurio", true, true, true, true),
            &w.owner_sid,
        )
        .await
        .unwrap();

    // A full study grant cannot outrun the all-false project row
    let result = w.cat.service.get_file(&w.plain_file, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
    let result = w.cat.service.get_study(&w.study_id, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn read_non_shared_file() {
    let w = spawn_world().await;

    // Nothing anywhere mentions the guest; absence at the project root
    // means all-false
    let result = w.cat.service.get_file(&w.plain_file, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
    let result = w.cat.service.get_project(&w.project_id, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn study_share_alone_grants_nothing() {
    let w = spawn_world().await;
    w.cat
        .service
        .share_study(
            &w.study_id,
            AclEntry::new("pfurio", true, false, false, false),
            &w.owner_sid,
        )
        .await
        .unwrap();

    // Without a project-level grant the AND-merge bottoms out at all-false
    assert!(w
        .cat
        .service
        .get_study(&w.study_id, &w.guest_sid)
        .await
        .is_err());
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .is_err());
}

#[tokio::test]
async fn wildcard_grant_with_exact_override() {
    let w = spawn_world().await;
    let anne_sid = register(&w.cat.service, "anne").await;
    w.cat
        .service
        .share_project(
            &w.project_id,
            AclEntry::new(OTHERS_PRINCIPAL, true, false, false, false),
            &w.owner_sid,
        )
        .await
        .unwrap();
    w.cat
        .service
        .share_project(&w.project_id, AclEntry::none("pfurio"), &w.owner_sid)
        .await
        .unwrap();

    // anne rides the wildcard; pfurio's exact row shadows it
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &anne_sid)
        .await
        .is_ok());
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .is_err());
}

#[tokio::test]
async fn descendant_grant_never_exceeds_ancestors() {
    let w = spawn_world().await;
    w.grant_project_read().await;
    w.cat
        .service
        .share_file(&w.shared_file, AclEntry::full("pfurio"), &w.owner_sid)
        .await
        .unwrap();

    // Read survives the merge; write and delete are capped away by the
    // read-only project grant
    assert!(w
        .cat
        .service
        .get_file(&w.shared_file, &w.guest_sid)
        .await
        .is_ok());

    let update = FileUpdate {
        description: Some("probe".to_string()),
        ..Default::default()
    };
    let result = w
        .cat
        .service
        .modify_file(&w.shared_file, update, &w.guest_sid)
        .await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));

    let result = w.cat.service.delete_file(&w.shared_file, &w.guest_sid).await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn listings_prune_what_the_caller_cannot_read() {
    let w = spawn_world().await;
    w.grant_project_read().await;
    w.cat
        .service
        .share_file(&w.denied_file, AclEntry::none("pfurio"), &w.owner_sid)
        .await
        .unwrap();

    let files = w
        .cat
        .service
        .list_files(&w.study_id, &w.guest_sid)
        .await
        .unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"data/shared.txt"));
    assert!(paths.contains(&"data/plain.txt"));
    assert!(!paths.contains(&"data/denied.txt"));

    // The nested listings prune the same file
    let studies = w
        .cat
        .service
        .list_studies(&w.project_id, &w.guest_sid)
        .await
        .unwrap();
    assert_eq!(studies.len(), 1);
    assert!(studies[0].files.iter().all(|f| f.path != "data/denied.txt"));

    let projects = w
        .cat
        .service
        .list_projects(None, &w.guest_sid)
        .await
        .unwrap();
    assert_eq!(projects.len(), 1);
    let study = &projects[0].studies[0];
    assert!(study.files.iter().all(|f| f.path != "data/denied.txt"));
}

#[tokio::test]
async fn strangers_see_an_empty_catalog() {
    let w = spawn_world().await;
    let anne_sid = register(&w.cat.service, "anne").await;

    let projects = w.cat.service.list_projects(None, &anne_sid).await.unwrap();
    assert!(projects.is_empty());

    // Scoping the listing to the owner changes nothing
    let projects = w
        .cat
        .service
        .list_projects(Some("imedina"), &anne_sid)
        .await
        .unwrap();
    assert!(projects.is_empty());

    let studies = w
        .cat
        .service
        .list_studies(&w.project_id, &anne_sid)
        .await
        .unwrap();
    assert!(studies.is_empty());
}

#[tokio::test]
async fn owner_listing_nests_the_whole_tree() {
    let w = spawn_world().await;

    let projects = w
        .cat
        .service
        .list_projects(Some("imedina"), &w.owner_sid)
        .await
        .unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].studies.len(), 1);

    // Two auto-created folders plus the three files, ordered by path
    let paths: Vec<&str> = projects[0].studies[0]
        .files
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            "analysis/",
            "data/",
            "data/denied.txt",
            "data/plain.txt",
            "data/shared.txt"
        ]
    );
}

#[tokio::test]
async fn sharing_is_reserved_to_the_owner() {
    let w = spawn_world().await;
    w.grant_project_read().await;

    // A readable project is still not shareable by the reader
    let result = w
        .cat
        .service
        .share_project(
            &w.project_id,
            AclEntry::new("anne", true, false, false, false),
            &w.guest_sid,
        )
        .await;
    match result.unwrap_err() {
        CatalogError::PermissionDenied { message, .. } => {
            assert!(message.contains("owner"));
        }
        _ => panic!("Expected PermissionDenied error"),
    }
}

#[tokio::test]
async fn share_entries_are_validated() {
    let w = spawn_world().await;

    // Unknown principals are rejected up front
    let result = w
        .cat
        .service
        .share_project(
            &w.project_id,
            AclEntry::new("ghost", true, false, false, false),
            &w.owner_sid,
        )
        .await;
    assert!(matches!(result.unwrap_err(), CatalogError::NotFound { .. }));

    // Granting to the owner is meaningless and refused
    let result = w
        .cat
        .service
        .share_project(&w.project_id, AclEntry::full("imedina"), &w.owner_sid)
        .await;
    assert!(matches!(
        result.unwrap_err(),
        CatalogError::Parameter { .. }
    ));
}

#[tokio::test]
async fn unshare_restores_inheritance() {
    let w = spawn_world().await;
    w.grant_project_read().await;
    w.cat
        .service
        .share_file(&w.denied_file, AclEntry::none("pfurio"), &w.owner_sid)
        .await
        .unwrap();
    assert!(w
        .cat
        .service
        .get_file(&w.denied_file, &w.guest_sid)
        .await
        .is_err());

    // Dropping the explicit row reopens the path through the ancestors
    w.cat
        .service
        .unshare_file(&w.denied_file, "pfurio", &w.owner_sid)
        .await
        .unwrap();
    assert!(w
        .cat
        .service
        .get_file(&w.denied_file, &w.guest_sid)
        .await
        .is_ok());

    // Removing it again finds nothing to remove
    let result = w
        .cat
        .service
        .unshare_file(&w.denied_file, "pfurio", &w.owner_sid)
        .await;
    assert!(matches!(result.unwrap_err(), CatalogError::NotFound { .. }));
}

#[tokio::test]
async fn revoking_an_ancestor_closes_the_subtree() {
    let w = spawn_world().await;
    w.grant_project_read().await;

    // A study-level grant stacks on top of the project grant
    w.cat
        .service
        .share_study(
            &w.study_id,
            AclEntry::new("pfurio", true, false, false, false),
            &w.owner_sid,
        )
        .await
        .unwrap();
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .is_ok());

    // Dropping the study row falls back to the project grant
    w.cat
        .service
        .unshare_study(&w.study_id, "pfurio", &w.owner_sid)
        .await
        .unwrap();
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .is_ok());

    // Dropping the project row closes everything underneath
    w.cat
        .service
        .unshare_project(&w.project_id, "pfurio", &w.owner_sid)
        .await
        .unwrap();
    assert!(w
        .cat
        .service
        .get_file(&w.plain_file, &w.guest_sid)
        .await
        .is_err());
    assert!(w
        .cat
        .service
        .get_study(&w.study_id, &w.guest_sid)
        .await
        .is_err());
}
