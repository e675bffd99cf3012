//! Core data types shared across the datacat workspace
//!
//! 目录核心数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Wildcard principal standing for "everyone else" in an ACL list.
pub const OTHERS_PRINCIPAL: &str = "*";

/// Role attached to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Platform administrator
    Admin,
    /// Regular registered user
    User,
    /// Synthesized identity backing an anonymous session
    Anonymous,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
            UserRole::Anonymous => write!(f, "anonymous"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "anonymous" => Ok(UserRole::Anonymous),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

/// A registered (or anonymous) account
///
/// 用户账户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Caller-chosen account id, unique across the catalog
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Opaque password credential; compared verbatim, never interpreted
    pub password: String,
    /// Organization the account belongs to
    pub organization: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    /// Touched on login and on profile reads
    pub last_activity: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        organization: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            password: password.into(),
            organization: organization.into(),
            role,
            created_at: Utc::now(),
            last_activity: None,
        }
    }

    /// Copy safe to hand back to callers: the credential is blanked.
    pub fn without_password(mut self) -> Self {
        self.password.clear();
        self
    }
}

/// An authenticated session, identified by an opaque bearer id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Bearer credential (UUID v4)
    pub id: String,
    /// Source IP recorded at login
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(ip: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ip: ip.into(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the session has outlived the given TTL. A TTL of zero or less
    /// disables expiry.
    pub fn is_expired(&self, ttl_minutes: i64) -> bool {
        if ttl_minutes <= 0 {
            return false;
        }
        let idle = Utc::now().signed_duration_since(self.last_activity);
        idle > chrono::Duration::minutes(ttl_minutes)
    }
}

/// One of the four grantable permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Execute,
    Delete,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
            Permission::Execute => write!(f, "execute"),
            Permission::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "execute" => Ok(Permission::Execute),
            "delete" => Ok(Permission::Delete),
            _ => Err(format!("Unknown permission: {}", s)),
        }
    }
}

/// Access-control entry for one principal on one resource
///
/// The resource id is implicit: entries live inline on the Project, Study or
/// File row they grant access to. The principal is either a concrete user id
/// or [`OTHERS_PRINCIPAL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal_id: String,
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub delete: bool,
}

impl AclEntry {
    pub fn new(
        principal_id: impl Into<String>,
        read: bool,
        write: bool,
        execute: bool,
        delete: bool,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            read,
            write,
            execute,
            delete,
        }
    }

    /// Entry with every bit granted
    pub fn full(principal_id: impl Into<String>) -> Self {
        Self::new(principal_id, true, true, true, true)
    }

    /// Entry with every bit denied
    pub fn none(principal_id: impl Into<String>) -> Self {
        Self::new(principal_id, false, false, false, false)
    }

    /// Field-wise AND with another entry; the principal of `self` is kept.
    pub fn intersect(&self, other: &AclEntry) -> AclEntry {
        AclEntry {
            principal_id: self.principal_id.clone(),
            read: self.read && other.read,
            write: self.write && other.write,
            execute: self.execute && other.execute,
            delete: self.delete && other.delete,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.read,
            Permission::Write => self.write,
            Permission::Execute => self.execute,
            Permission::Delete => self.delete,
        }
    }

    /// Find the entry governing `principal` in an inline ACL list: an exact
    /// match wins, otherwise the `*` fallback applies.
    pub fn lookup<'a>(entries: &'a [AclEntry], principal: &str) -> Option<&'a AclEntry> {
        entries
            .iter()
            .find(|e| e.principal_id == principal)
            .or_else(|| entries.iter().find(|e| e.principal_id == OTHERS_PRINCIPAL))
    }
}

/// Top-level container owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Unique per owner; restricted character set
    pub alias: String,
    pub description: String,
    pub organization: String,
    pub created_at: DateTime<Utc>,
    pub attributes: HashMap<String, String>,
    pub acl: Vec<AclEntry>,
    /// Populated only by listing operations; stored rows keep this empty
    #[serde(default)]
    pub studies: Vec<Study>,
}

impl Project {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        alias: impl Into<String>,
        description: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            alias: alias.into(),
            description: description.into(),
            organization: organization.into(),
            created_at: Utc::now(),
            attributes: HashMap::new(),
            acl: Vec::new(),
            studies: Vec::new(),
        }
    }
}

/// Kind of study a container holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyType {
    CaseControl,
    Cohort,
    Family,
    TimeSeries,
    #[default]
    Collection,
}

impl fmt::Display for StudyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyType::CaseControl => write!(f, "case_control"),
            StudyType::Cohort => write!(f, "cohort"),
            StudyType::Family => write!(f, "family"),
            StudyType::TimeSeries => write!(f, "time_series"),
            StudyType::Collection => write!(f, "collection"),
        }
    }
}

impl std::str::FromStr for StudyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "case_control" => Ok(StudyType::CaseControl),
            "cohort" => Ok(StudyType::Cohort),
            "family" => Ok(StudyType::Family),
            "time_series" => Ok(StudyType::TimeSeries),
            "collection" => Ok(StudyType::Collection),
            _ => Err(format!("Unknown study type: {}", s)),
        }
    }
}

/// Second-level container; belongs to a project, holds files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    pub project_id: String,
    /// May differ from the project owner; the creator is granted a full entry
    /// at creation time when they are not the owner
    pub creator_id: String,
    pub name: String,
    /// Unique per project
    pub alias: String,
    pub study_type: StudyType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub attributes: HashMap<String, String>,
    pub acl: Vec<AclEntry>,
    /// Populated only by listing operations; stored rows keep this empty
    #[serde(default)]
    pub files: Vec<File>,
}

impl Study {
    pub fn new(
        project_id: impl Into<String>,
        creator_id: impl Into<String>,
        name: impl Into<String>,
        alias: impl Into<String>,
        study_type: StudyType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            creator_id: creator_id.into(),
            name: name.into(),
            alias: alias.into(),
            study_type,
            description: description.into(),
            created_at: Utc::now(),
            attributes: HashMap::new(),
            acl: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// 文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Folder,
    File,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Folder => write!(f, "folder"),
            FileType::File => write!(f, "file"),
        }
    }
}

/// Upload lifecycle of a file entry
///
/// Folders are created directly in `Ready`. Regular files start in
/// `Uploading`, move to `Uploaded` once their bytes land, and to `Ready`
/// after external validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Uploaded,
    Ready,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Uploading => write!(f, "uploading"),
            FileStatus::Uploaded => write!(f, "uploaded"),
            FileStatus::Ready => write!(f, "ready"),
        }
    }
}

/// A file or folder entry inside a study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub study_id: String,
    pub creator_id: String,
    /// Final path segment
    pub name: String,
    /// Relative to the study root; folder paths end with `/`, file paths
    /// never do
    pub path: String,
    pub file_type: FileType,
    pub status: FileStatus,
    pub description: String,
    /// Bytes on the backend; recorded when an upload lands
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub attributes: HashMap<String, String>,
    pub acl: Vec<AclEntry>,
}

impl File {
    pub fn new(
        study_id: impl Into<String>,
        creator_id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        file_type: FileType,
        status: FileStatus,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            study_id: study_id.into(),
            creator_id: creator_id.into(),
            name: name.into(),
            path: path.into(),
            file_type,
            status,
            description: String::new(),
            size: 0,
            created_at: Utc::now(),
            attributes: HashMap::new(),
            acl: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }
}

/// Analysis registered under a study; gated by the study's ACL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub study_id: String,
    pub creator_id: String,
    pub name: String,
    /// Unique per study
    pub alias: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Analysis {
    pub fn new(
        study_id: impl Into<String>,
        creator_id: impl Into<String>,
        name: impl Into<String>,
        alias: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            study_id: study_id.into(),
            creator_id: creator_id.into(),
            name: name.into(),
            alias: alias.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Execution state of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Job registered under an analysis; gated by the containing study's ACL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub analysis_id: String,
    pub user_id: String,
    pub name: String,
    pub tool_name: String,
    pub command_line: String,
    pub description: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        analysis_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        tool_name: impl Into<String>,
        command_line: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            analysis_id: analysis_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            tool_name: tool_name.into(),
            command_line: command_line.into(),
            description: description.into(),
            status: JobStatus::default(),
            created_at: Utc::now(),
        }
    }
}
