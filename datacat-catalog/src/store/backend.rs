//! Physical storage abstraction
//!
//! Catalog rows describe resources; the bytes and directories themselves
//! live behind [`StorageBackend`]. Physical paths are composed from ids
//! (`<owner>/<project>/<study>/<file path>`), so metadata renames such as a
//! project alias change never move anything here.

use async_trait::async_trait;
use datacat_core::{storage_error, CatalogResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const COMPONENT: &str = "storage_backend";

/// Seam between the catalog and whatever holds the bytes.
///
/// Folder paths end with `/`, object paths do not. All paths are relative
/// to the backend root; the first segment is always a user namespace.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Provision the root folder for a user; fails if it already exists.
    async fn create_namespace(&self, user_id: &str) -> CatalogResult<()>;
    /// Remove a user's root folder and everything beneath it.
    async fn delete_namespace(&self, user_id: &str) -> CatalogResult<()>;
    /// Create a folder; the parent folder must already exist.
    async fn create_folder(&self, path: &str) -> CatalogResult<()>;
    /// Create an empty object placeholder; the parent folder must exist.
    async fn create_file(&self, path: &str) -> CatalogResult<()>;
    /// Write object bytes, replacing any placeholder or earlier attempt.
    /// Returns the stored size.
    async fn write_object(&self, path: &str, data: &[u8]) -> CatalogResult<u64>;
    /// Read a byte range of an object. `offset` past the end yields an
    /// empty buffer; `limit = None` reads to the end.
    async fn read_object(&self, path: &str, offset: u64, limit: Option<u64>)
        -> CatalogResult<Vec<u8>>;
    /// Move a folder (with its subtree) or an object to a new path.
    async fn rename_resource(&self, old_path: &str, new_path: &str) -> CatalogResult<()>;
    /// Remove a folder (recursively) or an object; fails if nothing is
    /// there.
    async fn delete_resource(&self, path: &str) -> CatalogResult<()>;
}

enum Entry {
    Folder,
    Object(Vec<u8>),
}

/// Parent folder of a physical path, or `None` at the backend root.
fn parent_of(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    trimmed.rfind('/').map(|idx| &path[..=idx])
}

/// In-memory [`StorageBackend`] used by tests and single-process setups.
pub struct MemoryStorageBackend {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether any entry (folder or object) sits at `path`. Test helper.
    pub async fn exists(&self, path: &str) -> bool {
        self.entries.read().await.contains_key(path)
    }
}

impl Default for MemoryStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn require_parent(entries: &HashMap<String, Entry>, path: &str) -> CatalogResult<()> {
    match parent_of(path) {
        None => Ok(()),
        Some(parent) => match entries.get(parent) {
            Some(Entry::Folder) => Ok(()),
            _ => Err(storage_error!(
                format!("Parent folder '{}' does not exist", parent),
                COMPONENT
            )),
        },
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn create_namespace(&self, user_id: &str) -> CatalogResult<()> {
        let mut entries = self.entries.write().await;
        let root = format!("{}/", user_id);
        if entries.contains_key(&root) {
            return Err(storage_error!(
                format!("Namespace '{}' already exists", root),
                COMPONENT
            ));
        }
        entries.insert(root.clone(), Entry::Folder);
        debug!("Provisioned namespace '{}'", root);
        Ok(())
    }

    async fn delete_namespace(&self, user_id: &str) -> CatalogResult<()> {
        let root = format!("{}/", user_id);
        self.delete_resource(&root).await
    }

    async fn create_folder(&self, path: &str) -> CatalogResult<()> {
        let mut entries = self.entries.write().await;
        if !path.ends_with('/') {
            return Err(storage_error!(
                format!("Folder path must end with '/': {}", path),
                COMPONENT
            ));
        }
        if entries.contains_key(path) {
            return Err(storage_error!(
                format!("Resource already exists at '{}'", path),
                COMPONENT
            ));
        }
        require_parent(&entries, path)?;
        entries.insert(path.to_string(), Entry::Folder);
        debug!("Created folder '{}'", path);
        Ok(())
    }

    async fn create_file(&self, path: &str) -> CatalogResult<()> {
        let mut entries = self.entries.write().await;
        if path.ends_with('/') {
            return Err(storage_error!(
                format!("Object path may not end with '/': {}", path),
                COMPONENT
            ));
        }
        if entries.contains_key(path) {
            return Err(storage_error!(
                format!("Resource already exists at '{}'", path),
                COMPONENT
            ));
        }
        require_parent(&entries, path)?;
        entries.insert(path.to_string(), Entry::Object(Vec::new()));
        debug!("Created empty object '{}'", path);
        Ok(())
    }

    async fn write_object(&self, path: &str, data: &[u8]) -> CatalogResult<u64> {
        let mut entries = self.entries.write().await;
        if let Some(Entry::Folder) = entries.get(path) {
            return Err(storage_error!(
                format!("'{}' is a folder, not an object", path),
                COMPONENT
            ));
        }
        require_parent(&entries, path)?;
        let size = data.len() as u64;
        entries.insert(path.to_string(), Entry::Object(data.to_vec()));
        debug!("Wrote {} bytes to '{}'", size, path);
        Ok(size)
    }

    async fn read_object(
        &self,
        path: &str,
        offset: u64,
        limit: Option<u64>,
    ) -> CatalogResult<Vec<u8>> {
        let entries = self.entries.read().await;
        match entries.get(path) {
            Some(Entry::Object(bytes)) => {
                let start = offset.min(bytes.len() as u64) as usize;
                let end = match limit {
                    Some(limit) => ((start as u64).saturating_add(limit))
                        .min(bytes.len() as u64) as usize,
                    None => bytes.len(),
                };
                Ok(bytes[start..end].to_vec())
            }
            Some(Entry::Folder) => Err(storage_error!(
                format!("'{}' is a folder, not an object", path),
                COMPONENT
            )),
            None => Err(storage_error!(
                format!("No object at '{}'", path),
                COMPONENT
            )),
        }
    }

    async fn rename_resource(&self, old_path: &str, new_path: &str) -> CatalogResult<()> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(old_path) {
            return Err(storage_error!(
                format!("No resource at '{}'", old_path),
                COMPONENT
            ));
        }
        if entries.contains_key(new_path) {
            return Err(storage_error!(
                format!("Resource already exists at '{}'", new_path),
                COMPONENT
            ));
        }
        require_parent(&entries, new_path)?;
        let moved: Vec<String> = entries
            .keys()
            .filter(|k| k.as_str() == old_path || (old_path.ends_with('/') && k.starts_with(old_path)))
            .cloned()
            .collect();
        for key in &moved {
            if let Some(entry) = entries.remove(key) {
                let target = format!("{}{}", new_path, &key[old_path.len()..]);
                entries.insert(target, entry);
            }
        }
        debug!(
            "Renamed '{}' to '{}' ({} entries)",
            old_path,
            new_path,
            moved.len()
        );
        Ok(())
    }

    async fn delete_resource(&self, path: &str) -> CatalogResult<()> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(path) {
            return Err(storage_error!(
                format!("No resource at '{}'", path),
                COMPONENT
            ));
        }
        let before = entries.len();
        entries.retain(|k, _| {
            k.as_str() != path && !(path.ends_with('/') && k.starts_with(path))
        });
        debug!(
            "Deleted '{}' ({} entries removed)",
            path,
            before - entries.len()
        );
        Ok(())
    }
}
