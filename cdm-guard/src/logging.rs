//! Logging utilities and configuration for cdm-guard.
//!
//! Check results are emitted as structured events on the
//! [`DQ_LOG_TARGET`](crate::core::DQ_LOG_TARGET) target; everything else logs
//! under the `cdm_guard` module targets.

/// Default maximum length of a sample value rendered into a diagnostic.
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 256;

/// Truncates a string to the maximum field length if needed.
///
/// Truncation happens on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Utilities for setting up structured logging.
pub mod setup {
    use crate::error::{CdmError, Result};
    use serde::{Deserialize, Serialize};
    use std::fs::{File, OpenOptions};
    use std::path::{Path, PathBuf};
    use std::str::FromStr;
    use std::sync::Mutex;
    use tracing::{Level, Subscriber};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    /// Configuration for cdm-guard's logging setup, read from the `[logging]`
    /// section of a run configuration.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: String,
        /// Log level for cdm-guard components specifically
        pub crate_level: String,
        /// Whether to use JSON output format
        pub json: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
        /// Log file every event is also appended to, without ANSI colour
        pub file: Option<PathBuf>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: "info".to_string(),
                crate_level: "info".to_string(),
                json: false,
                env_filter: None,
                file: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: "warn".to_string(),
                crate_level: "info".to_string(),
                json: true,
                env_filter: None,
                file: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: "debug".to_string(),
                crate_level: "debug".to_string(),
                json: false,
                env_filter: None,
                file: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level.as_str().to_lowercase();
            self
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level.as_str().to_lowercase();
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
            self.file = Some(path.into());
            self
        }

        /// Builds the environment filter string.
        ///
        /// Fails with a configuration error when a level name is not recognized.
        pub fn env_filter(&self) -> Result<String> {
            if let Some(ref filter) = self.env_filter {
                return Ok(filter.clone());
            }
            let level = parse_level(&self.level)?;
            let crate_level = parse_level(&self.crate_level)?;
            Ok(format!(
                "{},cdm_guard={}",
                level.as_str().to_lowercase(),
                crate_level.as_str().to_lowercase()
            ))
        }
    }

    fn parse_level(level: &str) -> Result<Level> {
        Level::from_str(level)
            .map_err(|_| CdmError::Configuration(format!("unknown log level '{level}'")))
    }

    fn open_log_file(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                CdmError::Configuration(format!("cannot open log file {}: {e}", path.display()))
            })
    }

    /// The fmt layer appending to the configured log file, if any.
    pub(crate) fn file_layer<S>(
        config: &LoggingConfig,
    ) -> Result<Option<Box<dyn Layer<S> + Send + Sync + 'static>>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let Some(path) = &config.file else {
            return Ok(None);
        };
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?));
        Ok(Some(if config.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }))
    }

    /// Installs a global subscriber with an env filter, a plain or JSON console
    /// layer and, when configured, a log file layer in the same format.
    ///
    /// `RUST_LOG` takes precedence over the configured levels.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use cdm_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(&LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: &LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new(config.env_filter()?),
        };

        let fmt_layer = if config.json {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer(config)?)
            .try_init()
            .map_err(|e| CdmError::Configuration(format!("logging already initialized: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::setup::{file_layer, LoggingConfig};
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn log_to_file(config: &LoggingConfig) {
        let layer = file_layer(config).unwrap().unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "cdm_guard::dq", status = "FAIL", "not_null_violation person.person_id");
        });
    }

    #[test]
    fn test_file_layer_plain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("dq.log");
        let config = LoggingConfig::default().with_file(&path);

        log_to_file(&config);
        log_to_file(&config);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("not_null_violation person.person_id"));
        assert!(contents.contains("FAIL"));
        assert!(!contents.contains("\x1b["));
    }

    #[test]
    fn test_file_layer_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dq.json");
        let config = LoggingConfig::default().with_file(&path).with_json_format(true);

        log_to_file(&config);

        let contents = std::fs::read_to_string(&path).unwrap();
        let event: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(event["target"], "cdm_guard::dq");
        assert_eq!(event["fields"]["status"], "FAIL");
    }

    #[test]
    fn test_no_file_layer_by_default() {
        let layer = file_layer::<tracing_subscriber::Registry>(&LoggingConfig::default()).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
        // multi-byte characters are never split
        assert_eq!(truncate_field("ééé", 3), "é...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        let config = LoggingConfig::default().with_crate_level(Level::DEBUG);
        assert_eq!(config.env_filter().unwrap(), "info,cdm_guard=debug");

        let config = LoggingConfig::default().with_env_filter("cdm_guard::dq=warn");
        assert_eq!(config.env_filter().unwrap(), "cdm_guard::dq=warn");
    }

    #[test]
    fn test_unknown_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn test_deserialize_section() {
        let config: LoggingConfig = toml::from_str("level = \"warn\"\njson = true").unwrap();
        assert_eq!(config.level, "warn");
        assert!(config.json);
        assert_eq!(config.crate_level, "info");
        assert_eq!(config.file, None);

        let config: LoggingConfig = toml::from_str("file = \"/var/log/cdm-guard/dq.log\"").unwrap();
        assert_eq!(config.file, Some(PathBuf::from("/var/log/cdm-guard/dq.log")));
    }
}
