//! Unified error hierarchy for fitmetrics
//!
//! Store failures abort a metrics fetch and are caught at the engine
//! boundary; sensor failures are contained per field inside the premium
//! aggregator. Missing context is not an error at all.

use thiserror::Error;

/// Top-level error type for all fitmetrics operations
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Session store errors
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Sensor provider errors
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Session store (persistence read/write) errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached
    #[error("Session store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Record not found
    #[error("Record not found: {table}.{id}")]
    NotFound { table: String, id: String },

    /// Stored row could not be decoded
    #[error("Corrupt record in {table}: {reason}")]
    Corrupt { table: String, reason: String },

    /// Underlying SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Sensor provider query errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// User has not granted read access
    #[error("Authorization denied for {data_type}")]
    AuthorizationDenied { data_type: String },

    /// Type or unit combination the provider cannot serve
    #[error("Unsupported data type: {data_type}")]
    UnsupportedType { data_type: String },

    /// Provider failed for any other reason
    #[error("Sensor query failed: {reason}")]
    QueryFailed { reason: String },
}

/// Result type alias for fitmetrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MetricsError::Store(StoreError::NotFound { .. }) => ErrorSeverity::Warning,
            MetricsError::Store(StoreError::Corrupt { .. }) => ErrorSeverity::Critical,
            MetricsError::Store(_) => ErrorSeverity::Error,
            MetricsError::Sensor(SensorError::UnsupportedType { .. }) => ErrorSeverity::Info,
            MetricsError::Sensor(_) => ErrorSeverity::Warning,
            MetricsError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            MetricsError::Store(_) => "Failed to load metrics. Please try again.".to_string(),
            MetricsError::Sensor(SensorError::AuthorizationDenied { .. }) => {
                "Health data access is not authorized. Enable it in settings to see heart-rate metrics."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Emit this error at the tracing level its severity maps to
    pub fn log(&self, context: &str) {
        let severity = self.severity();
        let level = severity.to_tracing_level();
        if level == tracing::Level::ERROR {
            tracing::error!(error = %self, ?severity, "{}", context);
        } else if level == tracing::Level::WARN {
            tracing::warn!(error = %self, ?severity, "{}", context);
        } else {
            tracing::info!(error = %self, ?severity, "{}", context);
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
