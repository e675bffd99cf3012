//! Logging bootstrap and performance helpers
//!
//! Structured tracing with configurable format, optional file output and
//! per-target filter directives.

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include file and line information
    pub include_location: bool,
    /// Include thread ids and names
    pub include_thread: bool,
    /// Write to a file instead of stdout
    pub log_to_file: bool,
    /// Target file when `log_to_file` is set
    pub log_file_path: Option<String>,
    /// Emit span close events so operation durations show up
    pub enable_performance_monitoring: bool,
    /// Extra per-target filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            include_thread: false,
            log_to_file: false,
            log_file_path: None,
            enable_performance_monitoring: true,
            filter_directives: vec![
                "datacat=debug".to_string(),
                "datacat_core=debug".to_string(),
                "datacat_catalog=debug".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    fn span_events(&self) -> FmtSpan {
        if self.enable_performance_monitoring {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Open the log file as an `Arc` so it satisfies the `MakeWriter`
    /// bound of `with_writer`.
    fn log_file(
        &self,
    ) -> Result<Option<Arc<std::fs::File>>, Box<dyn std::error::Error + Send + Sync>> {
        if !self.log_to_file {
            return Ok(None);
        }
        let path = self
            .log_file_path
            .as_ref()
            .ok_or("log_file_path must be specified when log_to_file is true")?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Some(Arc::new(file)))
    }
}

/// Initialize the global tracing subscriber from a [`LoggingConfig`].
///
/// `RUST_LOG` takes precedence over the configured level when set. Can only
/// succeed once per process.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let registry = tracing_subscriber::registry().with(filter);
    let file = config.log_file()?;

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread);
            match file {
                Some(file) => registry.with(layer.with_writer(file)).init(),
                None => registry.with(layer.with_writer(io::stdout)).init(),
            }
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread);
            match file {
                Some(file) => registry.with(layer.with_writer(file)).init(),
                None => registry.with(layer.with_writer(io::stdout)).init(),
            }
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread);
            match file {
                Some(file) => registry.with(layer.with_writer(file)).init(),
                None => registry.with(layer.with_writer(io::stdout)).init(),
            }
        }
    }

    Ok(())
}

/// Duration measurement helpers
pub mod performance {
    use std::time::Instant;
    use tracing::{info_span, Instrument};

    /// Run an async operation inside a performance span and log its duration.
    pub async fn measure_async<F, T>(operation_name: &str, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let span = info_span!("performance", operation = operation_name);
        let start = Instant::now();
        let result = future.instrument(span).await;
        tracing::info!(
            target: "performance",
            operation = operation_name,
            duration_ms = start.elapsed().as_millis(),
            "Operation completed"
        );
        result
    }

    /// Synchronous counterpart of [`measure_async`].
    pub fn measure_sync<F, T>(operation_name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _span = info_span!("performance", operation = operation_name).entered();
        let start = Instant::now();
        let result = f();
        tracing::info!(
            target: "performance",
            operation = operation_name,
            duration_ms = start.elapsed().as_millis(),
            "Operation completed"
        );
        result
    }
}

#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "Starting operation");
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "Starting operation");
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr) => {
        tracing::info!(operation = $operation, "Operation completed");
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info!(operation = $operation, $($field)*, "Operation completed");
    };
}

#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr) => {
        tracing::error!(operation = $operation, error = %$error, "Operation failed");
    };
    ($operation:expr, $error:expr, $($field:tt)*) => {
        tracing::error!(operation = $operation, error = %$error, $($field)*, "Operation failed");
    };
}
