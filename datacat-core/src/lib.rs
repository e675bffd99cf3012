//! datacat-core - 数据目录核心类型与基础设施
//!
//! Shared vocabulary of the datacat workspace: the data model, the error
//! taxonomy, logging bootstrap and configuration.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
