//! Run summary formatting.
//!
//! [`HumanFormatter`] renders the text report printed at the end of a run;
//! [`JsonFormatter`] renders the same summary for programmatic consumers.
//!
//! # Examples
//!
//! ```rust
//! use cdm_guard::core::RunContext;
//! use cdm_guard::formatters::{FormatterConfig, HumanFormatter, ReportFormatter};
//!
//! let run = RunContext::default();
//! let text = HumanFormatter::with_config(FormatterConfig::plain())
//!     .format(&run.summary())
//!     .unwrap();
//! assert!(text.starts_with("Data Quality Check Summary:"));
//! ```

use crate::core::{CheckResult, RunSummary};
use crate::error::{CdmError, Result};
use std::fmt::Write;

const RULE: &str = "---------------------------------";

/// Configuration options for formatting run summaries.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Wrap each listed result in the ANSI colour of its status
    pub use_colors: bool,
    /// Maximum number of FAIL and of WARN results listed (-1 for all)
    pub max_issues: i32,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            max_issues: -1,
        }
    }
}

impl FormatterConfig {
    /// Uncoloured output listing every result, for files and CI logs.
    pub fn plain() -> Self {
        Self {
            use_colors: false,
            max_issues: -1,
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn with_max_issues(mut self, max: i32) -> Self {
        self.max_issues = max;
        self
    }

    fn limit<'a>(&self, results: &'a [CheckResult]) -> &'a [CheckResult] {
        match usize::try_from(self.max_issues) {
            Ok(max) if max < results.len() => &results[..max],
            _ => results,
        }
    }
}

/// Formats a [`RunSummary`] into a string.
pub trait ReportFormatter {
    fn format(&self, summary: &RunSummary) -> Result<String>;

    /// Formats with a configuration other than the formatter's own.
    fn format_with_config(&self, summary: &RunSummary, _config: &FormatterConfig) -> Result<String> {
        self.format(summary)
    }
}

/// Formats a summary as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, summary: &RunSummary) -> Result<String> {
        self.format_with_config(summary, &self.config)
    }

    fn format_with_config(&self, summary: &RunSummary, config: &FormatterConfig) -> Result<String> {
        let mut filtered = summary.clone();
        filtered.failures = config.limit(&summary.failures).to_vec();
        filtered.warnings = config.limit(&summary.warnings).to_vec();

        let json = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        json.map_err(|e| CdmError::Internal(format!("Failed to serialize summary to JSON: {e}")))
    }
}

/// Formats a summary as the plain-text end-of-run report.
///
/// ```text
/// Data Quality Check Summary:
/// ---------------------------------
/// Total checks: 12
///   PASS: 9
///   WARN: 1
///   FAIL: 1
///   SKIPPED: 1
/// ---------------------------------
/// Failed DQ Checks:
/// [FAIL] Check: missing_submission_file. Table: (care_site); ...
/// Warning DQ Checks:
/// [WARN] Check: extra_column_in_csv_header. ...
/// ```
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, summary: &RunSummary) -> Result<String> {
        self.format_with_config(summary, &self.config)
    }

    fn format_with_config(&self, summary: &RunSummary, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        write_summary(&mut out, summary, config)
            .map_err(|e| CdmError::Internal(format!("Failed to format summary: {e}")))?;
        Ok(out)
    }
}

fn write_summary(out: &mut String, summary: &RunSummary, config: &FormatterConfig) -> std::fmt::Result {
    writeln!(out, "Data Quality Check Summary:")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Total checks: {}", summary.total_checks)?;
    writeln!(out, "  PASS: {}", summary.pass_count)?;
    writeln!(out, "  WARN: {}", summary.warn_count)?;
    writeln!(out, "  FAIL: {}", summary.fail_count)?;
    writeln!(out, "  SKIPPED: {}", summary.skipped_count)?;
    writeln!(out, "{RULE}")?;
    write!(out, "Failed DQ Checks:")?;
    write_listing(out, &summary.failures, config)?;
    write!(out, "\nWarning DQ Checks:")?;
    write_listing(out, &summary.warnings, config)
}

fn write_listing(out: &mut String, results: &[CheckResult], config: &FormatterConfig) -> std::fmt::Result {
    let shown = config.limit(results);
    for result in shown {
        write!(out, "\n{}", result.render(config.use_colors))?;
    }
    if shown.len() < results.len() {
        write!(out, "\n... and {} more", results.len() - shown.len())?;
    }
    Ok(())
}
