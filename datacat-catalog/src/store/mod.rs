//! Storage seams: catalog metadata rows and physical bytes

pub mod backend;
pub mod metadata;

pub use backend::{MemoryStorageBackend, StorageBackend};
pub use metadata::{MemoryMetadataStore, MetadataStore};
