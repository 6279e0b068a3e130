//! Error types for the cdm-guard data quality engine.
//!
//! Every fallible operation in the crate returns [`CdmError`]. Configuration
//! problems (unknown check kinds, bad severity labels, malformed bounds) are
//! raised as soon as they are detected and are not recoverable mid-run.
//! Query and storage failures propagate out of the executor that hit them.
//!
//! Absent tables or columns are *not* errors: executors report them as
//! `SKIPPED` results. Violations are not errors either.

use thiserror::Error;

/// The main error type for cdm-guard.
#[derive(Error, Debug)]
pub enum CdmError {
    /// A check kind name that is not registered with the engine.
    #[error("Unknown check kind: '{0}'")]
    UnknownCheckKind(String),

    /// A severity-bounds mapping used a label outside PASS/WARN/FAIL/SKIPPED.
    #[error("Invalid severity label '{label}'. Expected one of: PASS, WARN, FAIL, SKIPPED")]
    InvalidSeverityLabel {
        /// The offending label as written
        label: String,
    },

    /// A severity-bounds mapping that cannot be used for classification.
    #[error("Malformed severity bounds: {0}")]
    MalformedBounds(String),

    /// A check result was built with both (or neither) of an explicit status
    /// and a violation fraction.
    #[error("Invalid check result for '{check}': {message}")]
    InvalidCheckResult {
        /// Name of the check kind
        check: String,
        /// What was wrong
        message: String,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The data model does not describe the requested table.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A generated query could not be executed or its result could not be read.
    #[error("Query failed for '{check}': {message}")]
    QueryFailed {
        /// Name of the check (or store operation) that issued the query
        check: String,
        /// Detailed error message
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from the submission source.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g. "CSV", "directory")
        source_type: String,
        /// Detailed error message
        message: String,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while reading a CSV header.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error while decoding a JSON data model.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error while decoding a TOML run configuration.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An identifier that cannot be safely quoted into SQL.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, CdmError>`.
pub type Result<T> = std::result::Result<T, CdmError>;

impl CdmError {
    /// Creates a new query failure error.
    pub fn query_failed(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid check result error.
    pub fn invalid_result(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCheckResult {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors the caller cannot fix by retrying: bad labels,
    /// unknown kinds, malformed bounds and other configuration problems.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CdmError::UnknownCheckKind(_)
                | CdmError::InvalidSeverityLabel { .. }
                | CdmError::MalformedBounds(_)
                | CdmError::InvalidCheckResult { .. }
                | CdmError::Configuration(_)
                | CdmError::Toml(_)
        )
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<CdmError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            CdmError::Internal(inner) => CdmError::Internal(format!("{msg}: {inner}")),
            other => CdmError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                CdmError::Internal(inner) => CdmError::Internal(format!("{msg}: {inner}")),
                other => CdmError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_check_kind_message() {
        let err = CdmError::UnknownCheckKind("row_count".to_string());
        assert_eq!(err.to_string(), "Unknown check kind: 'row_count'");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_label_message() {
        let err = CdmError::InvalidSeverityLabel {
            label: "OK".to_string(),
        };
        assert!(err.to_string().contains("'OK'"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_query_failure_is_not_configuration() {
        let err = CdmError::query_failed("foreign_key_violation", "table scan failed");
        assert_eq!(
            err.to_string(),
            "Query failed for 'foreign_key_violation': table scan failed"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_data_source_error() {
        let err = CdmError::data_source("CSV", "file is empty");
        assert_eq!(err.to_string(), "Data source error: file is empty");
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(CdmError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation()
            .context("While loading person")
            .unwrap_err();
        assert!(err.to_string().contains("While loading person"));
        assert!(err.to_string().contains("Something went wrong"));
    }
}
