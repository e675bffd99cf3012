//! Unified error handling for datacat
//!
//! Every failure surfaced by the catalog belongs to one taxonomy,
//! [`CatalogError`]. Domain variants carry an [`ErrorContext`] with a unique
//! error id, the originating component, and recovery suggestions, so a
//! failure can be traced through logs without guessing.

use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Context attached to every domain error
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when the error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Component where the error originated
    pub component: String,
    /// Operation being performed
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Suggested recovery actions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// The catalog error taxonomy
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Missing, empty or malformed input (bad alias, absolute path, bad email)
    #[error("Invalid parameter: {message}")]
    Parameter {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    /// Unknown user, bad credentials, or an invalid/expired session
    #[error("Authentication failed: {message}")]
    Authentication { message: String, context: ErrorContext },

    /// An ACL check failed at some level of the hierarchy
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String, context: ErrorContext },

    /// A resource id or path did not resolve
    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    /// Alias or path collision rejected by the metadata store
    #[error("Duplicate resource: {resource}")]
    Duplicate {
        resource: String,
        context: ErrorContext,
    },

    /// The operation is illegal for the resource's current status
    #[error("Invalid state: {message}")]
    InvalidState { message: String, context: ErrorContext },

    /// Physical storage backend failure
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// Configuration loading or validation failure
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// Bug-class failure inside the catalog itself
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// Permission denial with a ready-made context
    pub fn permission_denied(message: impl Into<String>, component: &str) -> Self {
        CatalogError::PermissionDenied {
            message: message.into(),
            context: ErrorContext::new(component)
                .with_suggestion("Ask the resource owner to share it with you"),
        }
    }

    /// Duplicate-resource rejection from the store
    pub fn duplicate(resource: impl Into<String>, component: &str) -> Self {
        CatalogError::Duplicate {
            resource: resource.into(),
            context: ErrorContext::new(component)
                .with_suggestion("Pick a different alias or path"),
        }
    }

    /// Status-machine violation
    pub fn invalid_state(message: impl Into<String>, component: &str) -> Self {
        CatalogError::InvalidState {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    /// Get the error context if present
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            CatalogError::Parameter { context, .. }
            | CatalogError::Authentication { context, .. }
            | CatalogError::PermissionDenied { context, .. }
            | CatalogError::NotFound { context, .. }
            | CatalogError::Duplicate { context, .. }
            | CatalogError::InvalidState { context, .. }
            | CatalogError::Storage { context, .. }
            | CatalogError::Config { context, .. }
            | CatalogError::Internal { context, .. } => Some(context),
            CatalogError::Io(_) | CatalogError::Serialization(_) => None,
        }
    }

    /// Whether retrying the same call can succeed. Only physical I/O is
    /// retryable; the caller owns the retry policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CatalogError::Storage { .. } | CatalogError::Io(_))
    }

    /// Short category label for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            CatalogError::Parameter { .. } => "parameter",
            CatalogError::Authentication { .. } => "authentication",
            CatalogError::PermissionDenied { .. } => "permission",
            CatalogError::NotFound { .. } => "not_found",
            CatalogError::Duplicate { .. } => "duplicate",
            CatalogError::InvalidState { .. } => "state",
            CatalogError::Storage { .. } => "storage",
            CatalogError::Config { .. } => "config",
            CatalogError::Internal { .. } => "internal",
            CatalogError::Io(_) => "io",
            CatalogError::Serialization(_) => "serialization",
        }
    }

    /// HTTP status a transport layer should map this error to
    pub fn http_status(&self) -> u16 {
        match self {
            CatalogError::Parameter { .. } => 400,
            CatalogError::Authentication { .. } => 401,
            CatalogError::PermissionDenied { .. } => 403,
            CatalogError::NotFound { .. } => 404,
            CatalogError::Duplicate { .. } => 409,
            CatalogError::InvalidState { .. } => 409,
            CatalogError::Storage { .. }
            | CatalogError::Config { .. }
            | CatalogError::Internal { .. }
            | CatalogError::Io(_)
            | CatalogError::Serialization(_) => 500,
        }
    }

    /// Emit the error through tracing at the appropriate level
    pub fn log(&self) {
        let error_id = self
            .context()
            .map(|c| c.error_id.as_str())
            .unwrap_or("unknown");

        match self {
            CatalogError::Storage { .. }
            | CatalogError::Config { .. }
            | CatalogError::Internal { .. }
            | CatalogError::Io(_)
            | CatalogError::Serialization(_) => {
                tracing::error!(
                    error_id = error_id,
                    category = self.category(),
                    "{}",
                    self
                );
            }
            _ => {
                tracing::warn!(
                    error_id = error_id,
                    category = self.category(),
                    "{}",
                    self
                );
            }
        }
    }
}

/// Create a parameter error with context
#[macro_export]
macro_rules! parameter_error {
    ($msg:expr, $component:expr) => {
        $crate::CatalogError::Parameter {
            message: $msg.to_string(),
            field: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the request parameters"),
        }
    };
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::CatalogError::Parameter {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the request parameters")
                .with_suggestion(&format!("Verify the '{}' field", $field)),
        }
    };
}

/// Create an authentication error with context
#[macro_export]
macro_rules! authentication_error {
    ($msg:expr, $component:expr) => {
        $crate::CatalogError::Authentication {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Log in again to obtain a fresh session"),
        }
    };
}

/// Create a not-found error with context
#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::CatalogError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the resource id or path"),
        }
    };
}

/// Create a storage error with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::CatalogError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the storage backend is reachable")
                .with_suggestion("Retry the operation once the backend recovers"),
        }
    };
    ($msg:expr, $source:expr, $component:expr) => {
        $crate::CatalogError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the storage backend is reachable")
                .with_suggestion("Retry the operation once the backend recovers"),
        }
    };
}
