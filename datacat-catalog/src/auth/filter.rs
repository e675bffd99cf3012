//! Permission-aware pruning of listing results
//!
//! Listings are filtered here instead of pushing permission predicates into
//! the metadata store's queries, trading query-layer efficiency for one
//! authoritative merge implementation. The ancestor's resolved grant is
//! computed once per subtree and passed down, never recomputed per child.

use crate::auth::acl::resolve_chain;
use datacat_core::{AclEntry, File, Project, Study};

/// Recursive read-visibility filter applied at every listing boundary.
pub struct ResultFilter;

/// Effective grant for one child given its inline entries and the parent's
/// already-resolved grant: an own entry is capped by the parent, no entry
/// inherits the parent verbatim.
fn child_effective(principal: &str, entries: &[AclEntry], ancestor: &AclEntry) -> AclEntry {
    match AclEntry::lookup(entries, principal) {
        Some(found) => AclEntry::new(
            principal,
            found.read,
            found.write,
            found.execute,
            found.delete,
        )
        .intersect(ancestor),
        None => ancestor.clone(),
    }
}

impl ResultFilter {
    /// Drop unreadable projects and recursively prune their studies and
    /// files. The owner keeps each of their subtrees untouched.
    pub fn filter_projects(principal: &str, projects: Vec<Project>) -> Vec<Project> {
        projects
            .into_iter()
            .filter_map(|mut project| {
                if principal == project.owner_id {
                    return Some(project);
                }
                let effective = resolve_chain(principal, &project.owner_id, &[&project.acl]);
                if !effective.read {
                    return None;
                }
                project.studies =
                    Self::filter_studies(principal, &project.owner_id, &effective, project.studies);
                Some(project)
            })
            .collect()
    }

    /// Prune studies against the containing project's resolved grant.
    pub fn filter_studies(
        principal: &str,
        owner_id: &str,
        project_acl: &AclEntry,
        studies: Vec<Study>,
    ) -> Vec<Study> {
        if principal == owner_id {
            return studies;
        }
        studies
            .into_iter()
            .filter_map(|mut study| {
                let effective = child_effective(principal, &study.acl, project_acl);
                if !effective.read {
                    return None;
                }
                study.files = Self::filter_files(principal, owner_id, &effective, study.files);
                Some(study)
            })
            .collect()
    }

    /// Prune files against the containing study's resolved grant.
    pub fn filter_files(
        principal: &str,
        owner_id: &str,
        study_acl: &AclEntry,
        files: Vec<File>,
    ) -> Vec<File> {
        if principal == owner_id {
            return files;
        }
        files
            .into_iter()
            .filter(|file| child_effective(principal, &file.acl, study_acl).read)
            .collect()
    }
}
