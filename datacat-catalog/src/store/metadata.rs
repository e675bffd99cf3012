//! Metadata store abstraction
//!
//! Single source of truth for every catalog row: users, sessions, projects,
//! studies, files, analyses and jobs. The in-memory implementation backs
//! tests and single-process deployments; the trait is the seam a database
//! adapter would plug into.

use async_trait::async_trait;
use chrono::Utc;
use datacat_core::{
    not_found_error, AclEntry, Analysis, CatalogError, CatalogResult, File, Job, Project, Session,
    Study, User,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const COMPONENT: &str = "metadata_store";

/// Persistence seam for catalog metadata.
///
/// Contract notes:
/// - `insert_*` methods reject duplicates atomically: id collisions, plus
///   the per-parent uniqueness rules called out on each method.
/// - `get_*` methods return `Ok(None)` for unknown ids; targeted updates
///   and deletes fail with [`CatalogError::NotFound`] instead.
/// - Containment lists (`Project::studies`, `Study::files`) are stored
///   empty; assembling trees is the caller's job.
/// - Referential integrity between levels is the caller's concern; the
///   store only enforces uniqueness within one table.
/// - `delete_project` and `delete_study` cascade over everything beneath.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // -- users ------------------------------------------------------------

    /// Insert a user row; rejects a duplicate user id.
    async fn insert_user(&self, user: &User) -> CatalogResult<()>;
    async fn get_user(&self, user_id: &str) -> CatalogResult<Option<User>>;
    async fn update_user_password(&self, user_id: &str, password: &str) -> CatalogResult<()>;
    async fn update_user_email(&self, user_id: &str, email: &str) -> CatalogResult<()>;
    /// Bump the user's last-activity timestamp.
    async fn touch_user(&self, user_id: &str) -> CatalogResult<()>;
    async fn delete_user(&self, user_id: &str) -> CatalogResult<()>;

    // -- sessions ---------------------------------------------------------

    async fn insert_session(&self, user_id: &str, session: &Session) -> CatalogResult<()>;
    /// Resolve a session id to `(user_id, session)`.
    async fn get_session(&self, session_id: &str) -> CatalogResult<Option<(String, Session)>>;
    async fn touch_session(&self, session_id: &str) -> CatalogResult<()>;
    async fn delete_session(&self, session_id: &str) -> CatalogResult<()>;

    // -- projects ---------------------------------------------------------

    /// Insert a project row; rejects a duplicate `(owner, alias)` pair.
    async fn insert_project(&self, project: &Project) -> CatalogResult<()>;
    async fn get_project(&self, project_id: &str) -> CatalogResult<Option<Project>>;
    /// Projects owned by `owner_id`, or every project when `None`.
    async fn list_projects(&self, owner_id: Option<&str>) -> CatalogResult<Vec<Project>>;
    /// Replace a project row; the `(owner, alias)` rule is enforced against
    /// the other rows.
    async fn update_project(&self, project: &Project) -> CatalogResult<()>;
    /// Remove a project and everything beneath it.
    async fn delete_project(&self, project_id: &str) -> CatalogResult<()>;
    /// Upsert the ACL entry for `entry.principal_id` on a project.
    async fn set_project_acl(&self, project_id: &str, entry: AclEntry) -> CatalogResult<()>;
    /// Remove the ACL entry for `principal`; fails if no such entry exists.
    async fn remove_project_acl(&self, project_id: &str, principal: &str) -> CatalogResult<()>;

    // -- studies ----------------------------------------------------------

    /// Insert a study row; rejects a duplicate `(project, alias)` pair.
    async fn insert_study(&self, study: &Study) -> CatalogResult<()>;
    async fn get_study(&self, study_id: &str) -> CatalogResult<Option<Study>>;
    async fn list_studies(&self, project_id: &str) -> CatalogResult<Vec<Study>>;
    async fn update_study(&self, study: &Study) -> CatalogResult<()>;
    /// Remove a study and everything beneath it.
    async fn delete_study(&self, study_id: &str) -> CatalogResult<()>;
    async fn set_study_acl(&self, study_id: &str, entry: AclEntry) -> CatalogResult<()>;
    async fn remove_study_acl(&self, study_id: &str, principal: &str) -> CatalogResult<()>;

    // -- files ------------------------------------------------------------

    /// Insert a file row; rejects a duplicate `(study, path)` pair.
    async fn insert_file(&self, file: &File) -> CatalogResult<()>;
    async fn get_file(&self, file_id: &str) -> CatalogResult<Option<File>>;
    async fn get_file_by_path(&self, study_id: &str, path: &str) -> CatalogResult<Option<File>>;
    /// Every file row of a study, ordered by path.
    async fn list_files(&self, study_id: &str) -> CatalogResult<Vec<File>>;
    async fn update_file(&self, file: &File) -> CatalogResult<()>;
    /// Rewrite the paths of every row strictly underneath `old_prefix`,
    /// returning how many rows changed.
    async fn rewrite_file_paths(
        &self,
        study_id: &str,
        old_prefix: &str,
        new_prefix: &str,
    ) -> CatalogResult<u64>;
    async fn delete_file(&self, file_id: &str) -> CatalogResult<()>;
    /// Remove every row strictly underneath `path_prefix`, returning how
    /// many rows were dropped.
    async fn delete_files_under(&self, study_id: &str, path_prefix: &str) -> CatalogResult<u64>;
    async fn set_file_acl(&self, file_id: &str, entry: AclEntry) -> CatalogResult<()>;
    async fn remove_file_acl(&self, file_id: &str, principal: &str) -> CatalogResult<()>;

    // -- analyses and jobs ------------------------------------------------

    /// Insert an analysis row; rejects a duplicate `(study, alias)` pair.
    async fn insert_analysis(&self, analysis: &Analysis) -> CatalogResult<()>;
    async fn get_analysis(&self, analysis_id: &str) -> CatalogResult<Option<Analysis>>;
    async fn list_analyses(&self, study_id: &str) -> CatalogResult<Vec<Analysis>>;
    async fn insert_job(&self, job: &Job) -> CatalogResult<()>;
    async fn get_job(&self, job_id: &str) -> CatalogResult<Option<Job>>;
    async fn list_jobs(&self, analysis_id: &str) -> CatalogResult<Vec<Job>>;
}

fn upsert_acl(acl: &mut Vec<AclEntry>, entry: AclEntry) {
    match acl.iter_mut().find(|e| e.principal_id == entry.principal_id) {
        Some(existing) => *existing = entry,
        None => acl.push(entry),
    }
}

fn remove_acl(acl: &mut Vec<AclEntry>, principal: &str) -> bool {
    let before = acl.len();
    acl.retain(|e| e.principal_id != principal);
    acl.len() != before
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    sessions: HashMap<String, (String, Session)>,
    projects: HashMap<String, Project>,
    studies: HashMap<String, Study>,
    files: HashMap<String, File>,
    analyses: HashMap<String, Analysis>,
    jobs: HashMap<String, Job>,
}

impl Tables {
    /// Drop a study row together with its files, analyses and jobs.
    fn cascade_study(&mut self, study_id: &str) {
        self.studies.remove(study_id);
        self.files.retain(|_, f| f.study_id != study_id);
        let analysis_ids: Vec<String> = self
            .analyses
            .values()
            .filter(|a| a.study_id == study_id)
            .map(|a| a.id.clone())
            .collect();
        self.analyses.retain(|_, a| a.study_id != study_id);
        self.jobs
            .retain(|_, j| !analysis_ids.contains(&j.analysis_id));
    }
}

/// In-memory implementation of [`MetadataStore`].
///
/// All tables live behind a single lock, so a duplicate check and the
/// following insert happen under one write guard.
pub struct MemoryMetadataStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_user(&self, user: &User) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(CatalogError::duplicate(
                format!("user '{}'", user.id),
                COMPONENT,
            ));
        }
        tables.users.insert(user.id.clone(), user.clone());
        debug!("Inserted user {}", user.id);
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> CatalogResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(user_id).cloned())
    }

    async fn update_user_password(&self, user_id: &str, password: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found_error!(format!("user '{}'", user_id), COMPONENT))?;
        user.password = password.to_string();
        debug!("Updated password for user {}", user_id);
        Ok(())
    }

    async fn update_user_email(&self, user_id: &str, email: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found_error!(format!("user '{}'", user_id), COMPONENT))?;
        user.email = email.to_string();
        debug!("Updated email for user {}", user_id);
        Ok(())
    }

    async fn touch_user(&self, user_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found_error!(format!("user '{}'", user_id), COMPONENT))?;
        user.last_activity = Some(Utc::now());
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(user_id).is_none() {
            return Err(not_found_error!(format!("user '{}'", user_id), COMPONENT));
        }
        debug!("Deleted user {}", user_id);
        Ok(())
    }

    async fn insert_session(&self, user_id: &str, session: &Session) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(CatalogError::duplicate(
                format!("session '{}'", session.id),
                COMPONENT,
            ));
        }
        tables
            .sessions
            .insert(session.id.clone(), (user_id.to_string(), session.clone()));
        debug!("Opened session {} for user {}", session.id, user_id);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> CatalogResult<Option<(String, Session)>> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(session_id).cloned())
    }

    async fn touch_session(&self, session_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found_error!(format!("session '{}'", session_id), COMPONENT))?;
        row.1.touch();
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.remove(session_id).is_none() {
            return Err(not_found_error!(
                format!("session '{}'", session_id),
                COMPONENT
            ));
        }
        debug!("Closed session {}", session_id);
        Ok(())
    }

    async fn insert_project(&self, project: &Project) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.projects.contains_key(&project.id) {
            return Err(CatalogError::duplicate(
                format!("project '{}'", project.id),
                COMPONENT,
            ));
        }
        if tables
            .projects
            .values()
            .any(|p| p.owner_id == project.owner_id && p.alias == project.alias)
        {
            return Err(CatalogError::duplicate(
                format!(
                    "project alias '{}' for user '{}'",
                    project.alias, project.owner_id
                ),
                COMPONENT,
            ));
        }
        let mut row = project.clone();
        row.studies.clear();
        debug!("Inserted project {} ({}/{})", row.id, row.owner_id, row.alias);
        tables.projects.insert(row.id.clone(), row);
        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> CatalogResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.get(project_id).cloned())
    }

    async fn list_projects(&self, owner_id: Option<&str>) -> CatalogResult<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| owner_id.map_or(true, |owner| p.owner_id == owner))
            .cloned()
            .collect();
        projects.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(projects)
    }

    async fn update_project(&self, project: &Project) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&project.id) {
            return Err(not_found_error!(
                format!("project '{}'", project.id),
                COMPONENT
            ));
        }
        if tables.projects.values().any(|p| {
            p.id != project.id && p.owner_id == project.owner_id && p.alias == project.alias
        }) {
            return Err(CatalogError::duplicate(
                format!(
                    "project alias '{}' for user '{}'",
                    project.alias, project.owner_id
                ),
                COMPONENT,
            ));
        }
        let mut row = project.clone();
        row.studies.clear();
        tables.projects.insert(row.id.clone(), row);
        debug!("Updated project {}", project.id);
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.projects.remove(project_id).is_none() {
            return Err(not_found_error!(
                format!("project '{}'", project_id),
                COMPONENT
            ));
        }
        let study_ids: Vec<String> = tables
            .studies
            .values()
            .filter(|s| s.project_id == project_id)
            .map(|s| s.id.clone())
            .collect();
        for study_id in &study_ids {
            tables.cascade_study(study_id);
        }
        debug!(
            "Deleted project {} and {} studies beneath it",
            project_id,
            study_ids.len()
        );
        Ok(())
    }

    async fn set_project_acl(&self, project_id: &str, entry: AclEntry) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found_error!(format!("project '{}'", project_id), COMPONENT))?;
        debug!(
            "Set ACL entry for '{}' on project {}",
            entry.principal_id, project_id
        );
        upsert_acl(&mut project.acl, entry);
        Ok(())
    }

    async fn remove_project_acl(&self, project_id: &str, principal: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found_error!(format!("project '{}'", project_id), COMPONENT))?;
        if !remove_acl(&mut project.acl, principal) {
            return Err(not_found_error!(
                format!("ACL entry for '{}' on project '{}'", principal, project_id),
                COMPONENT
            ));
        }
        debug!("Removed ACL entry for '{}' on project {}", principal, project_id);
        Ok(())
    }

    async fn insert_study(&self, study: &Study) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.studies.contains_key(&study.id) {
            return Err(CatalogError::duplicate(
                format!("study '{}'", study.id),
                COMPONENT,
            ));
        }
        if tables
            .studies
            .values()
            .any(|s| s.project_id == study.project_id && s.alias == study.alias)
        {
            return Err(CatalogError::duplicate(
                format!(
                    "study alias '{}' in project '{}'",
                    study.alias, study.project_id
                ),
                COMPONENT,
            ));
        }
        let mut row = study.clone();
        row.files.clear();
        debug!("Inserted study {} ({})", row.id, row.alias);
        tables.studies.insert(row.id.clone(), row);
        Ok(())
    }

    async fn get_study(&self, study_id: &str) -> CatalogResult<Option<Study>> {
        let tables = self.tables.read().await;
        Ok(tables.studies.get(study_id).cloned())
    }

    async fn list_studies(&self, project_id: &str) -> CatalogResult<Vec<Study>> {
        let tables = self.tables.read().await;
        let mut studies: Vec<Study> = tables
            .studies
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        studies.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(studies)
    }

    async fn update_study(&self, study: &Study) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.studies.contains_key(&study.id) {
            return Err(not_found_error!(format!("study '{}'", study.id), COMPONENT));
        }
        if tables.studies.values().any(|s| {
            s.id != study.id && s.project_id == study.project_id && s.alias == study.alias
        }) {
            return Err(CatalogError::duplicate(
                format!(
                    "study alias '{}' in project '{}'",
                    study.alias, study.project_id
                ),
                COMPONENT,
            ));
        }
        let mut row = study.clone();
        row.files.clear();
        tables.studies.insert(row.id.clone(), row);
        debug!("Updated study {}", study.id);
        Ok(())
    }

    async fn delete_study(&self, study_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.studies.contains_key(study_id) {
            return Err(not_found_error!(format!("study '{}'", study_id), COMPONENT));
        }
        tables.cascade_study(study_id);
        debug!("Deleted study {} and everything beneath it", study_id);
        Ok(())
    }

    async fn set_study_acl(&self, study_id: &str, entry: AclEntry) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let study = tables
            .studies
            .get_mut(study_id)
            .ok_or_else(|| not_found_error!(format!("study '{}'", study_id), COMPONENT))?;
        debug!(
            "Set ACL entry for '{}' on study {}",
            entry.principal_id, study_id
        );
        upsert_acl(&mut study.acl, entry);
        Ok(())
    }

    async fn remove_study_acl(&self, study_id: &str, principal: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let study = tables
            .studies
            .get_mut(study_id)
            .ok_or_else(|| not_found_error!(format!("study '{}'", study_id), COMPONENT))?;
        if !remove_acl(&mut study.acl, principal) {
            return Err(not_found_error!(
                format!("ACL entry for '{}' on study '{}'", principal, study_id),
                COMPONENT
            ));
        }
        debug!("Removed ACL entry for '{}' on study {}", principal, study_id);
        Ok(())
    }

    async fn insert_file(&self, file: &File) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.files.contains_key(&file.id) {
            return Err(CatalogError::duplicate(
                format!("file '{}'", file.id),
                COMPONENT,
            ));
        }
        if tables
            .files
            .values()
            .any(|f| f.study_id == file.study_id && f.path == file.path)
        {
            return Err(CatalogError::duplicate(
                format!("path '{}' in study '{}'", file.path, file.study_id),
                COMPONENT,
            ));
        }
        tables.files.insert(file.id.clone(), file.clone());
        debug!("Inserted file {} at '{}'", file.id, file.path);
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> CatalogResult<Option<File>> {
        let tables = self.tables.read().await;
        Ok(tables.files.get(file_id).cloned())
    }

    async fn get_file_by_path(&self, study_id: &str, path: &str) -> CatalogResult<Option<File>> {
        let tables = self.tables.read().await;
        Ok(tables
            .files
            .values()
            .find(|f| f.study_id == study_id && f.path == path)
            .cloned())
    }

    async fn list_files(&self, study_id: &str) -> CatalogResult<Vec<File>> {
        let tables = self.tables.read().await;
        let mut files: Vec<File> = tables
            .files
            .values()
            .filter(|f| f.study_id == study_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn update_file(&self, file: &File) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.files.contains_key(&file.id) {
            return Err(not_found_error!(format!("file '{}'", file.id), COMPONENT));
        }
        if tables
            .files
            .values()
            .any(|f| f.id != file.id && f.study_id == file.study_id && f.path == file.path)
        {
            return Err(CatalogError::duplicate(
                format!("path '{}' in study '{}'", file.path, file.study_id),
                COMPONENT,
            ));
        }
        tables.files.insert(file.id.clone(), file.clone());
        debug!("Updated file {}", file.id);
        Ok(())
    }

    async fn rewrite_file_paths(
        &self,
        study_id: &str,
        old_prefix: &str,
        new_prefix: &str,
    ) -> CatalogResult<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0u64;
        for file in tables.files.values_mut() {
            if file.study_id == study_id
                && file.path.len() > old_prefix.len()
                && file.path.starts_with(old_prefix)
            {
                file.path = format!("{}{}", new_prefix, &file.path[old_prefix.len()..]);
                changed += 1;
            }
        }
        debug!(
            "Rewrote {} paths under '{}' in study {}",
            changed, old_prefix, study_id
        );
        Ok(changed)
    }

    async fn delete_file(&self, file_id: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.files.remove(file_id).is_none() {
            return Err(not_found_error!(format!("file '{}'", file_id), COMPONENT));
        }
        debug!("Deleted file {}", file_id);
        Ok(())
    }

    async fn delete_files_under(&self, study_id: &str, path_prefix: &str) -> CatalogResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.files.len();
        tables.files.retain(|_, f| {
            !(f.study_id == study_id
                && f.path.len() > path_prefix.len()
                && f.path.starts_with(path_prefix))
        });
        let dropped = (before - tables.files.len()) as u64;
        debug!(
            "Dropped {} rows under '{}' in study {}",
            dropped, path_prefix, study_id
        );
        Ok(dropped)
    }

    async fn set_file_acl(&self, file_id: &str, entry: AclEntry) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let file = tables
            .files
            .get_mut(file_id)
            .ok_or_else(|| not_found_error!(format!("file '{}'", file_id), COMPONENT))?;
        debug!(
            "Set ACL entry for '{}' on file {}",
            entry.principal_id, file_id
        );
        upsert_acl(&mut file.acl, entry);
        Ok(())
    }

    async fn remove_file_acl(&self, file_id: &str, principal: &str) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        let file = tables
            .files
            .get_mut(file_id)
            .ok_or_else(|| not_found_error!(format!("file '{}'", file_id), COMPONENT))?;
        if !remove_acl(&mut file.acl, principal) {
            return Err(not_found_error!(
                format!("ACL entry for '{}' on file '{}'", principal, file_id),
                COMPONENT
            ));
        }
        debug!("Removed ACL entry for '{}' on file {}", principal, file_id);
        Ok(())
    }

    async fn insert_analysis(&self, analysis: &Analysis) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.analyses.contains_key(&analysis.id) {
            return Err(CatalogError::duplicate(
                format!("analysis '{}'", analysis.id),
                COMPONENT,
            ));
        }
        if tables
            .analyses
            .values()
            .any(|a| a.study_id == analysis.study_id && a.alias == analysis.alias)
        {
            return Err(CatalogError::duplicate(
                format!(
                    "analysis alias '{}' in study '{}'",
                    analysis.alias, analysis.study_id
                ),
                COMPONENT,
            ));
        }
        tables.analyses.insert(analysis.id.clone(), analysis.clone());
        debug!("Inserted analysis {} ({})", analysis.id, analysis.alias);
        Ok(())
    }

    async fn get_analysis(&self, analysis_id: &str) -> CatalogResult<Option<Analysis>> {
        let tables = self.tables.read().await;
        Ok(tables.analyses.get(analysis_id).cloned())
    }

    async fn list_analyses(&self, study_id: &str) -> CatalogResult<Vec<Analysis>> {
        let tables = self.tables.read().await;
        let mut analyses: Vec<Analysis> = tables
            .analyses
            .values()
            .filter(|a| a.study_id == study_id)
            .cloned()
            .collect();
        analyses.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(analyses)
    }

    async fn insert_job(&self, job: &Job) -> CatalogResult<()> {
        let mut tables = self.tables.write().await;
        if tables.jobs.contains_key(&job.id) {
            return Err(CatalogError::duplicate(
                format!("job '{}'", job.id),
                COMPONENT,
            ));
        }
        tables.jobs.insert(job.id.clone(), job.clone());
        debug!("Inserted job {} ({})", job.id, job.tool_name);
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> CatalogResult<Option<Job>> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.get(job_id).cloned())
    }

    async fn list_jobs(&self, analysis_id: &str) -> CatalogResult<Vec<Job>> {
        let tables = self.tables.read().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|j| j.analysis_id == analysis_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacat_core::{FileStatus, FileType, StudyType, UserRole};

    fn sample_user(id: &str) -> User {
        User::new(id, "Test User", "test@example.com", "secret", "acme", UserRole::User)
    }

    #[tokio::test]
    async fn insert_user_rejects_duplicate_id() {
        let store = MemoryMetadataStore::new();
        store.insert_user(&sample_user("alice")).await.unwrap();
        let err = store.insert_user(&sample_user("alice")).await.unwrap_err();
        match err {
            CatalogError::Duplicate { .. } => {}
            _ => panic!("Expected Duplicate error"),
        }
    }

    #[tokio::test]
    async fn project_alias_unique_per_owner() {
        let store = MemoryMetadataStore::new();
        store
            .insert_project(&Project::new("alice", "First", "p1", "", "acme"))
            .await
            .unwrap();
        // Same alias, same owner: rejected.
        let err = store
            .insert_project(&Project::new("alice", "Second", "p1", "", "acme"))
            .await
            .unwrap_err();
        match err {
            CatalogError::Duplicate { .. } => {}
            _ => panic!("Expected Duplicate error"),
        }
        // Same alias, different owner: fine.
        store
            .insert_project(&Project::new("bob", "Third", "p1", "", "acme"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_project_cascades() {
        let store = MemoryMetadataStore::new();
        let project = Project::new("alice", "P", "p", "", "acme");
        store.insert_project(&project).await.unwrap();
        let study = Study::new(&project.id, "alice", "S", "s", StudyType::Collection, "");
        store.insert_study(&study).await.unwrap();
        let file = File::new(
            &study.id,
            "alice",
            "file.txt",
            "file.txt",
            FileType::File,
            FileStatus::Ready,
        );
        store.insert_file(&file).await.unwrap();
        let analysis = Analysis::new(&study.id, "alice", "A", "a", "");
        store.insert_analysis(&analysis).await.unwrap();
        let job = Job::new(&analysis.id, "alice", "J", "tool", "tool --run", "");
        store.insert_job(&job).await.unwrap();

        store.delete_project(&project.id).await.unwrap();

        assert!(store.get_study(&study.id).await.unwrap().is_none());
        assert!(store.get_file(&file.id).await.unwrap().is_none());
        assert!(store.get_analysis(&analysis.id).await.unwrap().is_none());
        assert!(store.get_job(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rewrite_paths_touches_only_descendants() {
        let store = MemoryMetadataStore::new();
        let project = Project::new("alice", "P", "p", "", "acme");
        store.insert_project(&project).await.unwrap();
        let study = Study::new(&project.id, "alice", "S", "s", StudyType::Collection, "");
        store.insert_study(&study).await.unwrap();
        for path in ["data/", "data/a.txt", "data/sub/", "data/sub/b.txt", "other/"] {
            let file_type = if path.ends_with('/') {
                FileType::Folder
            } else {
                FileType::File
            };
            let name = path.trim_end_matches('/').rsplit('/').next().unwrap();
            store
                .insert_file(&File::new(
                    &study.id,
                    "alice",
                    name,
                    path,
                    file_type,
                    FileStatus::Ready,
                ))
                .await
                .unwrap();
        }

        let changed = store
            .rewrite_file_paths(&study.id, "data/", "renamed/")
            .await
            .unwrap();
        assert_eq!(changed, 3);
        assert!(store
            .get_file_by_path(&study.id, "renamed/sub/b.txt")
            .await
            .unwrap()
            .is_some());
        // The folder row itself and unrelated rows are untouched.
        assert!(store
            .get_file_by_path(&study.id, "data/")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_file_by_path(&study.id, "other/")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn acl_upsert_replaces_existing_entry() {
        let store = MemoryMetadataStore::new();
        let project = Project::new("alice", "P", "p", "", "acme");
        store.insert_project(&project).await.unwrap();

        store
            .set_project_acl(&project.id, AclEntry::new("bob", true, false, false, false))
            .await
            .unwrap();
        store
            .set_project_acl(&project.id, AclEntry::new("bob", true, true, false, false))
            .await
            .unwrap();

        let row = store.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(row.acl.len(), 1);
        assert!(row.acl[0].write);

        store.remove_project_acl(&project.id, "bob").await.unwrap();
        let err = store
            .remove_project_acl(&project.id, "bob")
            .await
            .unwrap_err();
        match err {
            CatalogError::NotFound { .. } => {}
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn unknown_ids_read_as_none_but_fail_updates() {
        let store = MemoryMetadataStore::new();
        assert!(store.get_user("ghost").await.unwrap().is_none());
        assert!(store.get_project("ghost").await.unwrap().is_none());
        let err = store.touch_user("ghost").await.unwrap_err();
        match err {
            CatalogError::NotFound { .. } => {}
            _ => panic!("Expected NotFound error"),
        }
    }
}
