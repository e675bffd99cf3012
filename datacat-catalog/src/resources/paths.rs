//! Catalog and physical path arithmetic
//!
//! Catalog paths are relative to their study: folder paths end with `/`,
//! file paths never do, and the study root is the empty string. Physical
//! paths are composed purely from ids, so metadata renames (for example a
//! project alias change) never move anything on the backend.

/// Proper ancestors of a catalog path, study root (`""`) first, the
/// immediate parent last. The path itself is not included.
pub fn parent_paths(path: &str) -> Vec<String> {
    let mut parents = vec![String::new()];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return parents;
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    let mut prefix = String::new();
    for segment in &segments[..segments.len() - 1] {
        prefix.push_str(segment);
        prefix.push('/');
        parents.push(prefix.clone());
    }
    parents
}

/// Immediate parent of a catalog path; `""` for a top-level entry.
pub fn parent_path(path: &str) -> String {
    parent_paths(path).pop().unwrap_or_default()
}

/// Final path segment, with any trailing `/` stripped.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Normalize a folder path to its canonical trailing-`/` form.
pub fn as_folder_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Physical root folder of a user namespace.
pub fn user_root(user_id: &str) -> String {
    format!("{}/", user_id)
}

/// Physical root folder of a project.
pub fn project_root(owner_id: &str, project_id: &str) -> String {
    format!("{}/{}/", owner_id, project_id)
}

/// Physical root folder of a study.
pub fn study_root(owner_id: &str, project_id: &str, study_id: &str) -> String {
    format!("{}/{}/{}/", owner_id, project_id, study_id)
}

/// Physical location of a catalog file or folder.
pub fn physical_path(owner_id: &str, project_id: &str, study_id: &str, file_path: &str) -> String {
    format!("{}{}", study_root(owner_id, project_id, study_id), file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_run_from_root_to_immediate() {
        assert_eq!(
            parent_paths("data/test/folder/file.txt"),
            vec!["", "data/", "data/test/", "data/test/folder/"]
        );
        assert_eq!(parent_paths("data/test/"), vec!["", "data/"]);
        assert_eq!(parent_paths("data/"), vec![""]);
        assert_eq!(parent_paths("file.txt"), vec![""]);
    }

    #[test]
    fn immediate_parent() {
        assert_eq!(parent_path("data/test/file.txt"), "data/test/");
        assert_eq!(parent_path("data/"), "");
        assert_eq!(parent_path("file.txt"), "");
    }

    #[test]
    fn final_segment() {
        assert_eq!(file_name("data/test/file.txt"), "file.txt");
        assert_eq!(file_name("data/test/"), "test");
        assert_eq!(file_name("data/"), "data");
    }

    #[test]
    fn folder_normalization_is_idempotent() {
        assert_eq!(as_folder_path("data/test"), "data/test/");
        assert_eq!(as_folder_path("data/test/"), "data/test/");
    }

    #[test]
    fn physical_layout_is_id_based() {
        assert_eq!(
            physical_path("alice", "p1", "s1", "data/a.txt"),
            "alice/p1/s1/data/a.txt"
        );
        assert_eq!(study_root("alice", "p1", "s1"), "alice/p1/s1/");
        assert_eq!(project_root("alice", "p1"), "alice/p1/");
        assert_eq!(user_root("alice"), "alice/");
    }
}
