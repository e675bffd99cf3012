//! Resource hierarchy management

pub mod manager;
pub mod paths;

pub use manager::{FileUpdate, ProjectUpdate, ResourceManager, StudyUpdate};
