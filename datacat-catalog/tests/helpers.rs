//! Shared fixtures for the catalog integration tests

use async_trait::async_trait;
use datacat_catalog::prelude::*;
use datacat_core::storage_error;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A catalog service with direct handles to its collaborators, so tests
/// can reach behind the facade when a fixture needs it.
pub struct TestCatalog {
    pub service: CatalogService,
    pub store: Arc<MemoryMetadataStore>,
    pub backend: Arc<MemoryStorageBackend>,
}

/// In-memory catalog with the default configuration.
pub fn spawn_catalog() -> TestCatalog {
    let store = Arc::new(MemoryMetadataStore::new());
    let backend = Arc::new(MemoryStorageBackend::new());
    let service = CatalogService::builder()
        .with_metadata_store(store.clone())
        .with_storage_backend(backend.clone())
        .build()
        .expect("default configuration should validate");
    TestCatalog {
        service,
        store,
        backend,
    }
}

/// Catalog wired to a failure-injecting backend, for rollback tests.
pub struct FaultyCatalog {
    pub service: CatalogService,
    pub store: Arc<MemoryMetadataStore>,
    pub backend: Arc<FailingBackend>,
}

pub fn spawn_faulty_catalog() -> FaultyCatalog {
    let store = Arc::new(MemoryMetadataStore::new());
    let backend = Arc::new(FailingBackend::new());
    let service = CatalogService::builder()
        .with_metadata_store(store.clone())
        .with_storage_backend(backend.clone())
        .build()
        .expect("default configuration should validate");
    FaultyCatalog {
        service,
        store,
        backend,
    }
}

/// Register a user and return a live session id.
pub async fn register(service: &CatalogService, user_id: &str) -> String {
    service
        .create_user(
            user_id,
            "Test User",
            &format!("{}@example.com", user_id),
            "secret",
            "datacat",
        )
        .await
        .expect("user creation should succeed");
    service
        .login(user_id, "secret", "127.0.0.1")
        .await
        .expect("login should succeed")
        .id
}

/// The canonical project + study fixture; returns their ids.
pub async fn project_study(service: &CatalogService, owner: &str, sid: &str) -> (String, String) {
    let project = service
        .create_project(
            owner,
            "1000 Genomes",
            "1000G",
            "1000 Genomes Project",
            "EBI",
            sid,
        )
        .await
        .expect("project creation should succeed");
    let study = service
        .create_study(
            &project.id,
            "Phase 1",
            "phase1",
            StudyType::CaseControl,
            "Phase 1 of the project",
            sid,
        )
        .await
        .expect("study creation should succeed");
    (project.id, study.id)
}

/// Storage backend that fails any operation whose path contains one of the
/// configured fragments, and otherwise behaves like the in-memory backend.
pub struct FailingBackend {
    inner: MemoryStorageBackend,
    denied: RwLock<HashSet<String>>,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorageBackend::new(),
            denied: RwLock::new(HashSet::new()),
        }
    }

    /// Fail every operation touching a path that contains `fragment`.
    pub async fn deny(&self, fragment: &str) {
        self.denied.write().await.insert(fragment.to_string());
    }

    /// Lift all injected failures.
    pub async fn heal(&self) {
        self.denied.write().await.clear();
    }

    /// Whether any entry sits at `path` in the wrapped backend.
    pub async fn exists(&self, path: &str) -> bool {
        self.inner.exists(path).await
    }

    async fn check(&self, path: &str) -> CatalogResult<()> {
        let denied = self.denied.read().await;
        if denied.iter().any(|fragment| path.contains(fragment.as_str())) {
            return Err(storage_error!(
                format!("Injected failure for '{}'", path),
                "failing_backend"
            ));
        }
        Ok(())
    }
}

impl Default for FailingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    async fn create_namespace(&self, user_id: &str) -> CatalogResult<()> {
        self.check(user_id).await?;
        self.inner.create_namespace(user_id).await
    }

    async fn delete_namespace(&self, user_id: &str) -> CatalogResult<()> {
        self.check(user_id).await?;
        self.inner.delete_namespace(user_id).await
    }

    async fn create_folder(&self, path: &str) -> CatalogResult<()> {
        self.check(path).await?;
        self.inner.create_folder(path).await
    }

    async fn create_file(&self, path: &str) -> CatalogResult<()> {
        self.check(path).await?;
        self.inner.create_file(path).await
    }

    async fn write_object(&self, path: &str, data: &[u8]) -> CatalogResult<u64> {
        self.check(path).await?;
        self.inner.write_object(path, data).await
    }

    async fn read_object(
        &self,
        path: &str,
        offset: u64,
        limit: Option<u64>,
    ) -> CatalogResult<Vec<u8>> {
        self.check(path).await?;
        self.inner.read_object(path, offset, limit).await
    }

    async fn rename_resource(&self, old_path: &str, new_path: &str) -> CatalogResult<()> {
        self.check(old_path).await?;
        self.check(new_path).await?;
        self.inner.rename_resource(old_path, new_path).await
    }

    async fn delete_resource(&self, path: &str) -> CatalogResult<()> {
        self.check(path).await?;
        self.inner.delete_resource(path).await
    }
}
