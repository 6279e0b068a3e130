//! The outcome record of one data quality check.

use super::{CheckKind, CheckStatus, RunContext, SeverityBounds};
use crate::error::{CdmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The immutable result of one check.
///
/// A result is created through [`CheckResult::builder`] and becomes visible only
/// once [`CheckResultBuilder::record`] registers it with a [`RunContext`]. The
/// status is either supplied explicitly or inferred from a violation fraction
/// and severity bounds; exactly one of the two paths is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    kind: CheckKind,
    status: CheckStatus,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    files: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    tables: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    columns: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    violation_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    severity_bounds: Option<SeverityBounds>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl CheckResult {
    /// Starts building a result for the given check kind.
    pub fn builder(kind: CheckKind) -> CheckResultBuilder {
        CheckResultBuilder::new(kind)
    }

    pub fn kind(&self) -> CheckKind {
        self.kind
    }

    pub fn status(&self) -> CheckStatus {
        self.status
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    pub fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }

    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    /// Fraction of rows violating the constraint, when one was measured.
    pub fn violation_fraction(&self) -> Option<f64> {
        self.violation_fraction
    }

    /// Bounds the status was inferred from, when it was inferred.
    pub fn severity_bounds(&self) -> Option<&SeverityBounds> {
        self.severity_bounds.as_ref()
    }

    /// Troubleshooting message for the reader of the report.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }

    /// Looks up one extra value by key.
    pub fn extra_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    /// Renders the result, optionally wrapped in the ANSI colour of its status.
    pub fn render(&self, use_colors: bool) -> String {
        if use_colors {
            format!("{}{self}\x1b[0m", self.status.ansi_color())
        } else {
            self.to_string()
        }
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] Check: {}. ", self.status, self.kind)?;
        if !self.columns.is_empty() {
            write!(f, "Column: ({}); ", join(&self.columns))?;
        }
        if !self.tables.is_empty() {
            write!(f, "Table: ({}); ", join(&self.tables))?;
        }
        if !self.files.is_empty() {
            write!(f, "File: ({}); ", join(&self.files))?;
        }
        for (key, value) in &self.extra {
            match value {
                serde_json::Value::String(s) => write!(f, "{key}: {s}; ")?,
                other => write!(f, "{key}: {other}; ")?,
            }
        }
        if let Some(fraction) = self.violation_fraction.filter(|v| *v > 0.0) {
            write!(f, "(violation: {:.2}%) ", fraction * 100.0)?;
        }
        if self.status != CheckStatus::Pass {
            if let Some(message) = &self.message {
                f.write_str(message)?;
            }
        }
        Ok(())
    }
}

/// Builder for [`CheckResult`].
///
/// # Examples
///
/// ```rust
/// use cdm_guard::core::{CheckKind, CheckResult, CheckStatus, RunContext, SeverityBounds};
///
/// # fn example() -> cdm_guard::error::Result<()> {
/// let mut run = RunContext::default();
/// let bounds = SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.05)])?;
/// let result = CheckResult::builder(CheckKind::NotNull)
///     .table("person")
///     .column("gender_concept_id")
///     .violation(0.03, bounds)
///     .record(&mut run)?;
/// assert_eq!(result.status(), CheckStatus::Warn);
/// assert_eq!(run.ledger().warns().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CheckResultBuilder {
    kind: CheckKind,
    status: Option<CheckStatus>,
    violation: Option<(f64, SeverityBounds)>,
    files: BTreeSet<String>,
    tables: BTreeSet<String>,
    columns: BTreeSet<String>,
    message: Option<String>,
    extra: BTreeMap<String, serde_json::Value>,
}

impl CheckResultBuilder {
    fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            status: None,
            violation: None,
            files: BTreeSet::new(),
            tables: BTreeSet::new(),
            columns: BTreeSet::new(),
            message: None,
            extra: BTreeMap::new(),
        }
    }

    /// Supplies the status explicitly.
    pub fn status(mut self, status: CheckStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Supplies a violation fraction and the bounds to infer the status from.
    pub fn violation(mut self, fraction: f64, bounds: SeverityBounds) -> Self {
        self.violation = Some((fraction, bounds));
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.files.insert(file.into());
        self
    }

    pub fn files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.insert(table.into());
        self
    }

    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.insert(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches a free-form value, e.g. the reference side of a foreign key.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn build(self) -> Result<CheckResult> {
        let kind = self.kind;
        let (status, violation_fraction, severity_bounds) = match (self.status, self.violation) {
            (Some(status), None) => (status, None, None),
            (None, Some((fraction, bounds))) => {
                if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                    return Err(CdmError::invalid_result(
                        kind.as_str(),
                        format!("violation fraction must be in [0, 1], got {fraction}"),
                    ));
                }
                (bounds.classify(fraction), Some(fraction), Some(bounds))
            }
            (Some(_), Some(_)) => {
                return Err(CdmError::invalid_result(
                    kind.as_str(),
                    "both an explicit status and a violation fraction were supplied",
                ))
            }
            (None, None) => {
                return Err(CdmError::invalid_result(
                    kind.as_str(),
                    "status not provided and no violation fraction to infer it from",
                ))
            }
        };

        Ok(CheckResult {
            kind,
            status,
            files: self.files,
            tables: self.tables,
            columns: self.columns,
            violation_fraction,
            severity_bounds,
            message: self.message,
            extra: self.extra,
        })
    }

    /// Builds the result and registers it with the run exactly once.
    pub fn record(self, run: &mut RunContext) -> Result<CheckResult> {
        let result = self.build()?;
        Ok(run.record(result))
    }
}
