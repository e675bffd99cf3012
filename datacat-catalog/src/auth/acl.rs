//! Effective permission resolution
//!
//! A principal's effective permissions on a resource come from walking the
//! containment chain (File → Study → Project) and AND-merging every level's
//! grant: a descendant can never hand out more than its ancestors allow.
//! The project owner bypasses the walk entirely and always holds every bit.

use crate::store::MetadataStore;
use datacat_core::{
    not_found_error, AclEntry, CatalogError, CatalogResult, File, Permission, Project, Study,
};
use std::sync::Arc;

const COMPONENT: &str = "acl_resolver";

/// AND-merge a containment chain of inline ACL lists, ordered closest
/// level first with the project level last.
///
/// At the project level the absence of both an exact and a `*` entry means
/// all-false; at any other level it means "defer to the parent", so that
/// level contributes nothing to the merge. The chain has a fixed maximum
/// depth of three, so this is a plain loop.
pub(crate) fn resolve_chain(principal: &str, owner_id: &str, levels: &[&[AclEntry]]) -> AclEntry {
    if principal == owner_id {
        return AclEntry::full(principal);
    }
    let mut merged: Option<AclEntry> = None;
    for (idx, entries) in levels.iter().enumerate() {
        let at_root = idx == levels.len() - 1;
        let candidate = match AclEntry::lookup(entries, principal) {
            Some(found) => AclEntry::new(
                principal,
                found.read,
                found.write,
                found.execute,
                found.delete,
            ),
            None if at_root => AclEntry::none(principal),
            None => continue,
        };
        merged = Some(match merged {
            Some(acc) => acc.intersect(&candidate),
            None => candidate,
        });
    }
    merged.unwrap_or_else(|| AclEntry::none(principal))
}

/// Resolves effective permissions by re-walking the ancestor chain on
/// every call; nothing is cached, so a revoked grant takes effect
/// immediately.
#[derive(Clone)]
pub struct AclResolver {
    store: Arc<dyn MetadataStore>,
}

impl AclResolver {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    async fn project_row(&self, project_id: &str) -> CatalogResult<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("project '{}'", project_id), COMPONENT))
    }

    async fn study_row(&self, study_id: &str) -> CatalogResult<Study> {
        self.store
            .get_study(study_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("study '{}'", study_id), COMPONENT))
    }

    async fn file_row(&self, file_id: &str) -> CatalogResult<File> {
        self.store
            .get_file(file_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("file '{}'", file_id), COMPONENT))
    }

    pub async fn effective_project_acl(
        &self,
        principal: &str,
        project_id: &str,
    ) -> CatalogResult<AclEntry> {
        let project = self.project_row(project_id).await?;
        Ok(resolve_chain(principal, &project.owner_id, &[&project.acl]))
    }

    pub async fn effective_study_acl(
        &self,
        principal: &str,
        study_id: &str,
    ) -> CatalogResult<AclEntry> {
        let study = self.study_row(study_id).await?;
        let project = self.project_row(&study.project_id).await?;
        Ok(resolve_chain(
            principal,
            &project.owner_id,
            &[&study.acl, &project.acl],
        ))
    }

    pub async fn effective_file_acl(
        &self,
        principal: &str,
        file_id: &str,
    ) -> CatalogResult<AclEntry> {
        let file = self.file_row(file_id).await?;
        let study = self.study_row(&file.study_id).await?;
        let project = self.project_row(&study.project_id).await?;
        Ok(resolve_chain(
            principal,
            &project.owner_id,
            &[&file.acl, &study.acl, &project.acl],
        ))
    }

    pub async fn check_project(
        &self,
        principal: &str,
        project_id: &str,
        permission: Permission,
    ) -> CatalogResult<()> {
        let effective = self.effective_project_acl(principal, project_id).await?;
        if !effective.has(permission) {
            return Err(CatalogError::permission_denied(
                format!(
                    "User '{}' lacks {} permission on project '{}'",
                    principal, permission, project_id
                ),
                COMPONENT,
            ));
        }
        Ok(())
    }

    pub async fn check_study(
        &self,
        principal: &str,
        study_id: &str,
        permission: Permission,
    ) -> CatalogResult<()> {
        let effective = self.effective_study_acl(principal, study_id).await?;
        if !effective.has(permission) {
            return Err(CatalogError::permission_denied(
                format!(
                    "User '{}' lacks {} permission on study '{}'",
                    principal, permission, study_id
                ),
                COMPONENT,
            ));
        }
        Ok(())
    }

    pub async fn check_file(
        &self,
        principal: &str,
        file_id: &str,
        permission: Permission,
    ) -> CatalogResult<()> {
        let effective = self.effective_file_acl(principal, file_id).await?;
        if !effective.has(permission) {
            return Err(CatalogError::permission_denied(
                format!(
                    "User '{}' lacks {} permission on file '{}'",
                    principal, permission, file_id
                ),
                COMPONENT,
            ));
        }
        Ok(())
    }

    /// Owner of a project. The same user implicitly owns every study and
    /// file beneath it.
    pub async fn project_owner(&self, project_id: &str) -> CatalogResult<String> {
        Ok(self.project_row(project_id).await?.owner_id)
    }

    pub async fn study_owner(&self, study_id: &str) -> CatalogResult<String> {
        let study = self.study_row(study_id).await?;
        self.project_owner(&study.project_id).await
    }

    pub async fn file_owner(&self, file_id: &str) -> CatalogResult<String> {
        let file = self.file_row(file_id).await?;
        self.study_owner(&file.study_id).await
    }
}
