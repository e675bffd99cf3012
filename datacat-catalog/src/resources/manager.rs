//! Resource lifecycle coordination
//!
//! Creates, modifies, renames and deletes projects, studies and files,
//! keeping the metadata store and the physical backend consistent with
//! compensating rollback: creates go metadata-first and compensate the row
//! away when the physical step fails; deletes go physical-first and keep
//! the row when it doesn't. Every mutation is authorized through
//! [`AclResolver`] before anything is written.

use crate::auth::{AclResolver, ResultFilter};
use crate::resources::paths;
use crate::store::{MetadataStore, StorageBackend};
use crate::validate;
use datacat_core::{
    not_found_error, parameter_error, performance, AclEntry, Analysis, CatalogError,
    CatalogResult, File, FileStatus, FileType, Job, Permission, Project, Study, StudyType,
    OTHERS_PRINCIPAL,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "resource_manager";

/// Folders every new study starts with.
const AUTO_STUDY_FOLDERS: [&str; 2] = ["data", "analysis"];

/// Partial update for a project; `None` fields stay untouched and
/// attributes are merged key-wise.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub attributes: Option<HashMap<String, String>>,
}

impl ProjectUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.organization.is_none()
            && self.attributes.is_none()
    }
}

/// Partial update for a study.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StudyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub study_type: Option<StudyType>,
    pub attributes: Option<HashMap<String, String>>,
}

impl StudyUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.study_type.is_none()
            && self.attributes.is_none()
    }
}

/// Partial update for a file or folder.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FileUpdate {
    pub description: Option<String>,
    pub attributes: Option<HashMap<String, String>>,
}

impl FileUpdate {
    fn is_empty(&self) -> bool {
        self.description.is_none() && self.attributes.is_none()
    }
}

pub struct ResourceManager {
    store: Arc<dyn MetadataStore>,
    backend: Arc<dyn StorageBackend>,
    resolver: AclResolver,
}

impl ResourceManager {
    pub fn new(store: Arc<dyn MetadataStore>, backend: Arc<dyn StorageBackend>) -> Self {
        let resolver = AclResolver::new(Arc::clone(&store));
        Self {
            store,
            backend,
            resolver,
        }
    }

    // -- row lookup -------------------------------------------------------

    async fn project_row(&self, project_id: &str) -> CatalogResult<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("project '{}'", project_id), COMPONENT))
    }

    async fn study_context(&self, study_id: &str) -> CatalogResult<(Study, Project)> {
        let study = self
            .store
            .get_study(study_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("study '{}'", study_id), COMPONENT))?;
        let project = self.project_row(&study.project_id).await?;
        Ok((study, project))
    }

    async fn file_context(&self, file_id: &str) -> CatalogResult<(File, Study, Project)> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("file '{}'", file_id), COMPONENT))?;
        let (study, project) = self.study_context(&file.study_id).await?;
        Ok((file, study, project))
    }

    async fn analysis_row(&self, analysis_id: &str) -> CatalogResult<Analysis> {
        self.store
            .get_analysis(analysis_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("analysis '{}'", analysis_id), COMPONENT))
    }

    // -- rollback helpers -------------------------------------------------

    async fn roll_back_project(&self, project_id: &str) {
        if let Err(cleanup) = self.store.delete_project(project_id).await {
            warn!(
                "Failed to roll back project row '{}': {}",
                project_id, cleanup
            );
        }
    }

    async fn roll_back_study(&self, study_id: &str) {
        if let Err(cleanup) = self.store.delete_study(study_id).await {
            warn!("Failed to roll back study row '{}': {}", study_id, cleanup);
        }
    }

    async fn roll_back_file(&self, file_id: &str) {
        if let Err(cleanup) = self.store.delete_file(file_id).await {
            warn!("Failed to roll back file row '{}': {}", file_id, cleanup);
        }
    }

    // -- projects ---------------------------------------------------------

    /// Create a project for `owner_id`. The caller must already have been
    /// verified as that user (see `SessionAuthenticator::require_ownership`).
    pub async fn create_project(
        &self,
        owner_id: &str,
        name: &str,
        alias: &str,
        description: &str,
        organization: &str,
    ) -> CatalogResult<Project> {
        validate::check_alias(alias, "alias")?;
        validate::check_parameter(name, "name")?;
        validate::check_parameter(description, "description")?;
        validate::check_parameter(organization, "organization")?;
        if self.store.get_user(owner_id).await?.is_none() {
            return Err(not_found_error!(format!("user '{}'", owner_id), COMPONENT));
        }

        let project = Project::new(owner_id, name, alias, description, organization);
        self.store.insert_project(&project).await?;
        let root = paths::project_root(owner_id, &project.id);
        if let Err(err) = self.backend.create_folder(&root).await {
            self.roll_back_project(&project.id).await;
            return Err(err);
        }
        info!(
            "Created project '{}' ({}) for user '{}'",
            alias, project.id, owner_id
        );
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str, caller: &str) -> CatalogResult<Project> {
        let project = self.project_row(project_id).await?;
        self.resolver
            .check_project(caller, project_id, Permission::Read)
            .await?;
        Ok(project)
    }

    /// Assembled project trees the caller may read, pruned recursively.
    pub async fn list_projects(
        &self,
        owner_id: Option<&str>,
        caller: &str,
    ) -> CatalogResult<Vec<Project>> {
        performance::measure_async("list_projects", async {
            let mut projects = self.store.list_projects(owner_id).await?;
            for project in &mut projects {
                project.studies = self.assemble_studies(&project.id).await?;
            }
            Ok(ResultFilter::filter_projects(caller, projects))
        })
        .await
    }

    async fn assemble_studies(&self, project_id: &str) -> CatalogResult<Vec<Study>> {
        let mut studies = self.store.list_studies(project_id).await?;
        for study in &mut studies {
            study.files = self.store.list_files(&study.id).await?;
        }
        Ok(studies)
    }

    pub async fn modify_project(
        &self,
        project_id: &str,
        update: ProjectUpdate,
        caller: &str,
    ) -> CatalogResult<Project> {
        if update.is_empty() {
            return Err(parameter_error!("No fields to modify", COMPONENT));
        }
        self.resolver
            .check_project(caller, project_id, Permission::Write)
            .await?;
        let mut project = self.project_row(project_id).await?;
        if let Some(name) = update.name {
            validate::check_parameter(&name, "name")?;
            project.name = name;
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(organization) = update.organization {
            project.organization = organization;
        }
        if let Some(attributes) = update.attributes {
            project.attributes.extend(attributes);
        }
        self.store.update_project(&project).await?;
        info!("Modified project {}", project_id);
        Ok(project)
    }

    /// Change a project's alias. Physical paths are id-based, so this is a
    /// pure metadata operation.
    pub async fn rename_project(
        &self,
        project_id: &str,
        new_alias: &str,
        caller: &str,
    ) -> CatalogResult<Project> {
        validate::check_alias(new_alias, "alias")?;
        let mut project = self.project_row(project_id).await?;
        if project.owner_id != caller {
            return Err(CatalogError::permission_denied(
                format!("Only the owner may rename project '{}'", project_id),
                COMPONENT,
            ));
        }
        let old_alias = std::mem::replace(&mut project.alias, new_alias.to_string());
        self.store.update_project(&project).await?;
        info!(
            "Renamed project {} from '{}' to '{}'",
            project_id, old_alias, new_alias
        );
        Ok(project)
    }

    pub async fn delete_project(&self, project_id: &str, caller: &str) -> CatalogResult<()> {
        let project = self.project_row(project_id).await?;
        self.resolver
            .check_project(caller, project_id, Permission::Delete)
            .await?;
        // Physical removal first: if it fails, the rows stay intact.
        self.backend
            .delete_resource(&paths::project_root(&project.owner_id, &project.id))
            .await?;
        self.store.delete_project(project_id).await?;
        info!("Deleted project '{}' ({})", project.alias, project_id);
        Ok(())
    }

    pub async fn share_project(
        &self,
        project_id: &str,
        entry: AclEntry,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.project_owner(project_id).await?;
        Self::require_owner(&owner, caller, "this project")?;
        self.check_share_entry(&entry, &owner).await?;
        info!(
            "Sharing project {} with '{}'",
            project_id, entry.principal_id
        );
        self.store.set_project_acl(project_id, entry).await
    }

    pub async fn unshare_project(
        &self,
        project_id: &str,
        principal: &str,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.project_owner(project_id).await?;
        Self::require_owner(&owner, caller, "this project")?;
        self.store.remove_project_acl(project_id, principal).await
    }

    // -- studies ----------------------------------------------------------

    /// Create a study under a project the caller can write to. The
    /// project's `*` grant is snapshotted by value into the study, and a
    /// non-owner creator gets a full study-scoped entry of their own.
    pub async fn create_study(
        &self,
        project_id: &str,
        name: &str,
        alias: &str,
        study_type: StudyType,
        description: &str,
        caller: &str,
    ) -> CatalogResult<Study> {
        validate::check_alias(alias, "alias")?;
        validate::check_parameter(name, "name")?;

        let project = self.project_row(project_id).await?;
        self.resolver
            .check_project(caller, project_id, Permission::Write)
            .await?;

        let mut study = Study::new(project_id, caller, name, alias, study_type, description);
        // Value snapshot: later edits to the project ACL must not leak
        // into studies that already exist.
        if let Some(entry) = project
            .acl
            .iter()
            .find(|e| e.principal_id == OTHERS_PRINCIPAL)
        {
            study.acl.push(entry.clone());
        }
        if caller != project.owner_id {
            study.acl.push(AclEntry::full(caller));
        }

        self.store.insert_study(&study).await?;
        let root = paths::study_root(&project.owner_id, &project.id, &study.id);
        if let Err(err) = self.backend.create_folder(&root).await {
            self.roll_back_study(&study.id).await;
            return Err(err);
        }
        for folder in AUTO_STUDY_FOLDERS {
            let row = File::new(
                &study.id,
                caller,
                folder,
                format!("{}/", folder),
                FileType::Folder,
                FileStatus::Ready,
            );
            self.commit_entry(&project, &study, &row).await?;
        }
        info!(
            "Created study '{}' ({}) in project {}",
            alias, study.id, project_id
        );
        Ok(study)
    }

    pub async fn get_study(&self, study_id: &str, caller: &str) -> CatalogResult<Study> {
        let (study, _project) = self.study_context(study_id).await?;
        self.resolver
            .check_study(caller, study_id, Permission::Read)
            .await?;
        Ok(study)
    }

    /// Studies of a project the caller may read, files included and both
    /// levels pruned against the project's resolved grant.
    pub async fn list_studies(&self, project_id: &str, caller: &str) -> CatalogResult<Vec<Study>> {
        let project = self.project_row(project_id).await?;
        let studies = self.assemble_studies(project_id).await?;
        let effective = self
            .resolver
            .effective_project_acl(caller, project_id)
            .await?;
        Ok(ResultFilter::filter_studies(
            caller,
            &project.owner_id,
            &effective,
            studies,
        ))
    }

    pub async fn modify_study(
        &self,
        study_id: &str,
        update: StudyUpdate,
        caller: &str,
    ) -> CatalogResult<Study> {
        if update.is_empty() {
            return Err(parameter_error!("No fields to modify", COMPONENT));
        }
        self.resolver
            .check_study(caller, study_id, Permission::Write)
            .await?;
        let (mut study, _project) = self.study_context(study_id).await?;
        if let Some(name) = update.name {
            validate::check_parameter(&name, "name")?;
            study.name = name;
        }
        if let Some(description) = update.description {
            study.description = description;
        }
        if let Some(study_type) = update.study_type {
            study.study_type = study_type;
        }
        if let Some(attributes) = update.attributes {
            study.attributes.extend(attributes);
        }
        self.store.update_study(&study).await?;
        info!("Modified study {}", study_id);
        Ok(study)
    }

    pub async fn delete_study(&self, study_id: &str, caller: &str) -> CatalogResult<()> {
        let (study, project) = self.study_context(study_id).await?;
        self.resolver
            .check_study(caller, study_id, Permission::Delete)
            .await?;
        self.backend
            .delete_resource(&paths::study_root(&project.owner_id, &project.id, &study.id))
            .await?;
        self.store.delete_study(study_id).await?;
        info!("Deleted study '{}' ({})", study.alias, study_id);
        Ok(())
    }

    pub async fn share_study(
        &self,
        study_id: &str,
        entry: AclEntry,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.study_owner(study_id).await?;
        Self::require_owner(&owner, caller, "this study")?;
        self.check_share_entry(&entry, &owner).await?;
        info!("Sharing study {} with '{}'", study_id, entry.principal_id);
        self.store.set_study_acl(study_id, entry).await
    }

    pub async fn unshare_study(
        &self,
        study_id: &str,
        principal: &str,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.study_owner(study_id).await?;
        Self::require_owner(&owner, caller, "this study")?;
        self.store.remove_study_acl(study_id, principal).await
    }

    // -- files and folders ------------------------------------------------

    /// Create a folder. With `parents` set, missing ancestors are created
    /// on the way; an existing folder at the path is returned unchanged.
    pub async fn create_folder(
        &self,
        study_id: &str,
        path: &str,
        parents: bool,
        caller: &str,
    ) -> CatalogResult<File> {
        performance::measure_async(
            "create_folder",
            self.create_entry(study_id, path, FileType::Folder, parents, caller),
        )
        .await
    }

    /// Register a file in `uploading` status with an empty physical
    /// placeholder; the bytes arrive later via [`Self::upload_file`].
    pub async fn create_file(
        &self,
        study_id: &str,
        path: &str,
        parents: bool,
        caller: &str,
    ) -> CatalogResult<File> {
        performance::measure_async(
            "create_file",
            self.create_entry(study_id, path, FileType::File, parents, caller),
        )
        .await
    }

    async fn create_entry(
        &self,
        study_id: &str,
        path: &str,
        file_type: FileType,
        parents: bool,
        caller: &str,
    ) -> CatalogResult<File> {
        validate::check_relative_path(path, "path")?;
        let (study, project) = self.study_context(study_id).await?;

        let normalized = match file_type {
            FileType::Folder => paths::as_folder_path(path),
            FileType::File => {
                if path.ends_with('/') {
                    return Err(parameter_error!(
                        format!("File path may not end with '/': {}", path),
                        "path",
                        COMPONENT
                    ));
                }
                path.to_string()
            }
        };

        // Idempotent folder creation: an existing folder row comes back
        // unchanged. Anything else at either spelling of the path is a
        // collision.
        if let Some(existing) = self.store.get_file_by_path(study_id, &normalized).await? {
            if file_type == FileType::Folder && existing.is_folder() {
                warn!(
                    "Folder '{}' already exists in study {}",
                    normalized, study_id
                );
                return Ok(existing);
            }
            return Err(CatalogError::duplicate(
                format!("path '{}' in study '{}'", normalized, study_id),
                COMPONENT,
            ));
        }
        let sibling = match file_type {
            FileType::Folder => normalized.trim_end_matches('/').to_string(),
            FileType::File => paths::as_folder_path(&normalized),
        };
        if self
            .store
            .get_file_by_path(study_id, &sibling)
            .await?
            .is_some()
        {
            return Err(CatalogError::duplicate(
                format!("path '{}' in study '{}'", normalized, study_id),
                COMPONENT,
            ));
        }

        // Walk ancestors innermost-first: stop at the nearest existing
        // folder, collecting every missing one on the way.
        let mut missing: Vec<String> = Vec::new();
        let mut nearest: Option<File> = None;
        for ancestor in paths::parent_paths(&normalized).into_iter().rev() {
            if ancestor.is_empty() {
                break;
            }
            match self.store.get_file_by_path(study_id, &ancestor).await? {
                Some(row) => {
                    nearest = Some(row);
                    break;
                }
                None => {
                    if self
                        .store
                        .get_file_by_path(study_id, ancestor.trim_end_matches('/'))
                        .await?
                        .is_some()
                    {
                        return Err(CatalogError::duplicate(
                            format!(
                                "path '{}' in study '{}' is held by a file",
                                ancestor, study_id
                            ),
                            COMPONENT,
                        ));
                    }
                    missing.push(ancestor);
                }
            }
        }
        if !missing.is_empty() && !parents {
            return Err(not_found_error!(
                format!(
                    "parent folder '{}' in study '{}'",
                    paths::parent_path(&normalized),
                    study_id
                ),
                COMPONENT
            ));
        }

        // One write check against the nearest pre-existing ancestor;
        // folders created below start with empty ACLs and defer to the
        // same grant.
        match &nearest {
            Some(folder) => {
                self.resolver
                    .check_file(caller, &folder.id, Permission::Write)
                    .await?
            }
            None => {
                self.resolver
                    .check_study(caller, study_id, Permission::Write)
                    .await?
            }
        }

        // Missing ancestors go outermost-first so each step's parent
        // already exists, physically and in metadata.
        for ancestor in missing.iter().rev() {
            let row = File::new(
                study_id,
                caller,
                paths::file_name(ancestor),
                ancestor.clone(),
                FileType::Folder,
                FileStatus::Ready,
            );
            self.commit_entry(&project, &study, &row).await?;
        }

        let status = match file_type {
            FileType::Folder => FileStatus::Ready,
            FileType::File => FileStatus::Uploading,
        };
        let row = File::new(
            study_id,
            caller,
            paths::file_name(&normalized),
            normalized.clone(),
            file_type,
            status,
        );
        let created = self.commit_entry(&project, &study, &row).await?;
        info!(
            "Created {} '{}' in study {}",
            created.file_type, created.path, study_id
        );
        Ok(created)
    }

    /// Insert one file row, then its physical counterpart. Only this
    /// step's row is compensated away on a physical failure; rows
    /// committed by earlier steps of the same call stay.
    async fn commit_entry(
        &self,
        project: &Project,
        study: &Study,
        row: &File,
    ) -> CatalogResult<File> {
        self.store.insert_file(row).await?;
        let physical =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &row.path);
        let physical_result = if row.is_folder() {
            self.backend.create_folder(&physical).await
        } else {
            self.backend.create_file(&physical).await
        };
        if let Err(err) = physical_result {
            self.roll_back_file(&row.id).await;
            return Err(err);
        }
        Ok(row.clone())
    }

    /// Write a file's bytes. Only the creator may upload, and only while
    /// the row is in `uploading`. A failed write leaves the row in
    /// `uploading`, so the same call can be retried.
    pub async fn upload_file(
        &self,
        file_id: &str,
        data: &[u8],
        caller: &str,
    ) -> CatalogResult<File> {
        let (mut file, study, project) = self.file_context(file_id).await?;
        if file.creator_id != caller {
            return Err(CatalogError::permission_denied(
                format!("Only the creator may upload file '{}'", file_id),
                COMPONENT,
            ));
        }
        if file.is_folder() {
            return Err(CatalogError::invalid_state(
                format!("'{}' is a folder", file.path),
                COMPONENT,
            ));
        }
        if file.status != FileStatus::Uploading {
            return Err(CatalogError::invalid_state(
                format!("File '{}' is {}, expected uploading", file.path, file.status),
                COMPONENT,
            ));
        }

        let physical =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &file.path);
        let size = self.backend.write_object(&physical, data).await?;
        file.status = FileStatus::Uploaded;
        file.size = size;
        self.store.update_file(&file).await?;
        info!(
            "Uploaded {} bytes to '{}' in study {}",
            size, file.path, study.id
        );
        Ok(file)
    }

    /// Read a byte range of an uploaded file.
    pub async fn download_file(
        &self,
        file_id: &str,
        offset: u64,
        limit: Option<u64>,
        caller: &str,
    ) -> CatalogResult<Vec<u8>> {
        let (file, study, project) = self.file_context(file_id).await?;
        self.resolver
            .check_file(caller, file_id, Permission::Read)
            .await?;
        if file.is_folder() {
            return Err(CatalogError::invalid_state(
                format!("'{}' is a folder", file.path),
                COMPONENT,
            ));
        }
        if file.status == FileStatus::Uploading {
            return Err(CatalogError::invalid_state(
                format!("File '{}' has no uploaded content yet", file.path),
                COMPONENT,
            ));
        }
        let physical =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &file.path);
        self.backend.read_object(&physical, offset, limit).await
    }

    pub async fn get_file(&self, file_id: &str, caller: &str) -> CatalogResult<File> {
        let (file, _study, _project) = self.file_context(file_id).await?;
        self.resolver
            .check_file(caller, file_id, Permission::Read)
            .await?;
        Ok(file)
    }

    /// Files of a study the caller may read, pruned against the study's
    /// resolved grant.
    pub async fn list_files(&self, study_id: &str, caller: &str) -> CatalogResult<Vec<File>> {
        let (_study, project) = self.study_context(study_id).await?;
        let files = self.store.list_files(study_id).await?;
        let effective = self.resolver.effective_study_acl(caller, study_id).await?;
        Ok(ResultFilter::filter_files(
            caller,
            &project.owner_id,
            &effective,
            files,
        ))
    }

    pub async fn modify_file(
        &self,
        file_id: &str,
        update: FileUpdate,
        caller: &str,
    ) -> CatalogResult<File> {
        if update.is_empty() {
            return Err(parameter_error!("No fields to modify", COMPONENT));
        }
        self.resolver
            .check_file(caller, file_id, Permission::Write)
            .await?;
        let (mut file, _study, _project) = self.file_context(file_id).await?;
        if let Some(description) = update.description {
            file.description = description;
        }
        if let Some(attributes) = update.attributes {
            file.attributes.extend(attributes);
        }
        self.store.update_file(&file).await?;
        info!("Modified file {}", file_id);
        Ok(file)
    }

    /// Mark an uploaded file as validated and ready for consumption.
    pub async fn set_file_ready(&self, file_id: &str, caller: &str) -> CatalogResult<File> {
        self.resolver
            .check_file(caller, file_id, Permission::Write)
            .await?;
        let (mut file, _study, _project) = self.file_context(file_id).await?;
        if file.status != FileStatus::Uploaded {
            return Err(CatalogError::invalid_state(
                format!("File '{}' is {}, expected uploaded", file.path, file.status),
                COMPONENT,
            ));
        }
        file.status = FileStatus::Ready;
        self.store.update_file(&file).await?;
        info!("File '{}' is ready", file.path);
        Ok(file)
    }

    /// Rename a file or folder within its parent. Metadata changes first;
    /// if the physical rename then fails, the rows are renamed back.
    pub async fn rename_file(
        &self,
        file_id: &str,
        new_name: &str,
        caller: &str,
    ) -> CatalogResult<File> {
        validate::check_file_name(new_name, "new name")?;
        let (file, study, project) = self.file_context(file_id).await?;
        self.resolver
            .check_file(caller, file_id, Permission::Write)
            .await?;

        let parent = paths::parent_path(&file.path);
        let new_path = if file.is_folder() {
            format!("{}{}/", parent, new_name)
        } else {
            format!("{}{}", parent, new_name)
        };
        if new_path == file.path {
            return Ok(file);
        }
        if self
            .store
            .get_file_by_path(&study.id, &new_path)
            .await?
            .is_some()
        {
            return Err(CatalogError::duplicate(
                format!("path '{}' in study '{}'", new_path, study.id),
                COMPONENT,
            ));
        }

        let old_path = file.path.clone();
        let mut renamed = file;
        renamed.path = new_path.clone();
        renamed.name = new_name.to_string();
        self.store.update_file(&renamed).await?;
        let mut moved_children = 0;
        if renamed.is_folder() {
            moved_children = self
                .store
                .rewrite_file_paths(&study.id, &old_path, &new_path)
                .await?;
        }

        let physical_old =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &old_path);
        let physical_new =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &new_path);
        if let Err(err) = self
            .backend
            .rename_resource(&physical_old, &physical_new)
            .await
        {
            // Rename the rows back so metadata keeps matching the backend.
            if renamed.is_folder() {
                if let Err(cleanup) = self
                    .store
                    .rewrite_file_paths(&study.id, &new_path, &old_path)
                    .await
                {
                    warn!(
                        "Failed to restore child paths under '{}': {}",
                        old_path, cleanup
                    );
                }
            }
            let mut restored = renamed.clone();
            restored.path = old_path.clone();
            restored.name = paths::file_name(&old_path).to_string();
            if let Err(cleanup) = self.store.update_file(&restored).await {
                warn!("Failed to restore file row '{}': {}", file_id, cleanup);
            }
            return Err(err);
        }
        info!(
            "Renamed '{}' to '{}' ({} children moved)",
            old_path, new_path, moved_children
        );
        Ok(renamed)
    }

    pub async fn delete_file(&self, file_id: &str, caller: &str) -> CatalogResult<()> {
        let (file, study, project) = self.file_context(file_id).await?;
        self.resolver
            .check_file(caller, file_id, Permission::Delete)
            .await?;

        let physical =
            paths::physical_path(&project.owner_id, &project.id, &study.id, &file.path);
        self.backend.delete_resource(&physical).await?;
        self.store.delete_file(file_id).await?;
        if file.is_folder() {
            let dropped = self.store.delete_files_under(&study.id, &file.path).await?;
            info!(
                "Deleted folder '{}' and {} entries beneath it",
                file.path, dropped
            );
        } else {
            info!("Deleted file '{}'", file.path);
        }
        Ok(())
    }

    pub async fn share_file(
        &self,
        file_id: &str,
        entry: AclEntry,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.file_owner(file_id).await?;
        Self::require_owner(&owner, caller, "this file")?;
        self.check_share_entry(&entry, &owner).await?;
        info!("Sharing file {} with '{}'", file_id, entry.principal_id);
        self.store.set_file_acl(file_id, entry).await
    }

    pub async fn unshare_file(
        &self,
        file_id: &str,
        principal: &str,
        caller: &str,
    ) -> CatalogResult<()> {
        let owner = self.resolver.file_owner(file_id).await?;
        Self::require_owner(&owner, caller, "this file")?;
        self.store.remove_file_acl(file_id, principal).await
    }

    // -- analyses and jobs ------------------------------------------------

    pub async fn create_analysis(
        &self,
        study_id: &str,
        name: &str,
        alias: &str,
        description: &str,
        caller: &str,
    ) -> CatalogResult<Analysis> {
        validate::check_alias(alias, "alias")?;
        validate::check_parameter(name, "name")?;
        self.resolver
            .check_study(caller, study_id, Permission::Write)
            .await?;
        let analysis = Analysis::new(study_id, caller, name, alias, description);
        self.store.insert_analysis(&analysis).await?;
        info!(
            "Created analysis '{}' ({}) in study {}",
            alias, analysis.id, study_id
        );
        Ok(analysis)
    }

    pub async fn get_analysis(&self, analysis_id: &str, caller: &str) -> CatalogResult<Analysis> {
        let analysis = self.analysis_row(analysis_id).await?;
        self.resolver
            .check_study(caller, &analysis.study_id, Permission::Read)
            .await?;
        Ok(analysis)
    }

    pub async fn list_analyses(&self, study_id: &str, caller: &str) -> CatalogResult<Vec<Analysis>> {
        self.resolver
            .check_study(caller, study_id, Permission::Read)
            .await?;
        self.store.list_analyses(study_id).await
    }

    /// Queue a job under an analysis; gated by the study's execute bit.
    pub async fn create_job(
        &self,
        analysis_id: &str,
        name: &str,
        tool_name: &str,
        command_line: &str,
        description: &str,
        caller: &str,
    ) -> CatalogResult<Job> {
        validate::check_parameter(name, "name")?;
        validate::check_parameter(tool_name, "tool name")?;
        let analysis = self.analysis_row(analysis_id).await?;
        self.resolver
            .check_study(caller, &analysis.study_id, Permission::Execute)
            .await?;
        let job = Job::new(
            analysis_id,
            caller,
            name,
            tool_name,
            command_line,
            description,
        );
        self.store.insert_job(&job).await?;
        info!("Queued job '{}' ({}) for analysis {}", name, job.id, analysis_id);
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str, caller: &str) -> CatalogResult<Job> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| not_found_error!(format!("job '{}'", job_id), COMPONENT))?;
        let analysis = self.analysis_row(&job.analysis_id).await?;
        self.resolver
            .check_study(caller, &analysis.study_id, Permission::Read)
            .await?;
        Ok(job)
    }

    pub async fn list_jobs(&self, analysis_id: &str, caller: &str) -> CatalogResult<Vec<Job>> {
        let analysis = self.analysis_row(analysis_id).await?;
        self.resolver
            .check_study(caller, &analysis.study_id, Permission::Read)
            .await?;
        self.store.list_jobs(analysis_id).await
    }

    // -- sharing helpers --------------------------------------------------

    fn require_owner(owner_id: &str, caller: &str, resource: &str) -> CatalogResult<()> {
        if owner_id != caller {
            return Err(CatalogError::permission_denied(
                format!("Only the owner may share or unshare {}", resource),
                COMPONENT,
            ));
        }
        Ok(())
    }

    async fn check_share_entry(&self, entry: &AclEntry, owner_id: &str) -> CatalogResult<()> {
        validate::check_parameter(&entry.principal_id, "principal")?;
        if entry.principal_id == owner_id {
            return Err(parameter_error!(
                "The owner already holds every permission implicitly",
                "principal",
                COMPONENT
            ));
        }
        if entry.principal_id != OTHERS_PRINCIPAL
            && self.store.get_user(&entry.principal_id).await?.is_none()
        {
            return Err(not_found_error!(
                format!("user '{}'", entry.principal_id),
                COMPONENT
            ));
        }
        Ok(())
    }
}
