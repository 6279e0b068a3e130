//! Check statuses and severity bounds.

use crate::error::{CdmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The outcome of a single data quality check.
///
/// Variants are ordered by severity, least severe first. Statuses are always
/// compared by value; a result is never coerced to a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    /// The check passed
    Pass,
    /// The check found a tolerable problem
    Warn,
    /// The check found a problem that fails the submission
    Fail,
    /// The check could not run against its subject
    Skipped,
}

impl CheckStatus {
    /// All statuses, in severity order.
    pub const ALL: [CheckStatus; 4] = [
        CheckStatus::Pass,
        CheckStatus::Warn,
        CheckStatus::Fail,
        CheckStatus::Skipped,
    ];

    /// Returns the label used in reports and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "SKIPPED",
        }
    }

    /// ANSI escape used when a report is printed to a terminal.
    pub fn ansi_color(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "\x1b[92m",
            CheckStatus::Warn => "\x1b[93m",
            CheckStatus::Fail => "\x1b[91m",
            CheckStatus::Skipped => "\x1b[94m",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = CdmError;

    fn from_str(s: &str) -> Result<Self> {
        CheckStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CdmError::InvalidSeverityLabel {
                label: s.to_string(),
            })
    }
}

/// Upper bounds on the violation fraction still classified under each status.
///
/// Bounds are kept sorted ascending (ties broken by status severity), so
/// classification is a linear scan for the first bound that is `>=` the
/// fraction. A fraction above every bound classifies as [`CheckStatus::Fail`].
///
/// # Examples
///
/// ```rust
/// use cdm_guard::core::{CheckStatus, SeverityBounds};
///
/// let bounds = SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.05)]).unwrap();
/// assert_eq!(bounds.classify(0.0), CheckStatus::Pass);
/// assert_eq!(bounds.classify(0.05), CheckStatus::Warn);
/// assert_eq!(bounds.classify(0.05000001), CheckStatus::Fail);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct SeverityBounds {
    bounds: Vec<(CheckStatus, f64)>,
}

impl SeverityBounds {
    /// Builds bounds from typed statuses.
    pub fn new<I>(bounds: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CheckStatus, f64)>,
    {
        let mut collected: Vec<(CheckStatus, f64)> = Vec::new();
        for (status, bound) in bounds {
            if !bound.is_finite() || !(0.0..=1.0).contains(&bound) {
                return Err(CdmError::MalformedBounds(format!(
                    "bound for {status} must be a fraction in [0, 1], got {bound}"
                )));
            }
            if collected.iter().any(|(existing, _)| *existing == status) {
                return Err(CdmError::MalformedBounds(format!(
                    "status {status} appears more than once"
                )));
            }
            collected.push((status, bound));
        }
        if collected.is_empty() {
            return Err(CdmError::MalformedBounds(
                "at least one status bound is required".to_string(),
            ));
        }
        collected.sort_by(|(sa, ba), (sb, bb)| ba.total_cmp(bb).then(sa.cmp(sb)));
        Ok(Self { bounds: collected })
    }

    /// Builds bounds from textual labels, as found in configuration files.
    ///
    /// Every label is validated before any bound is inspected, so an unknown
    /// label always surfaces as [`CdmError::InvalidSeverityLabel`].
    pub fn from_labels<I, S>(bounds: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let typed = bounds
            .into_iter()
            .map(|(label, bound)| label.as_ref().parse::<CheckStatus>().map(|s| (s, bound)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(typed)
    }

    /// Zero tolerance: any violation is a failure.
    pub fn strict() -> Self {
        Self {
            bounds: vec![(CheckStatus::Pass, 0.0)],
        }
    }

    /// Classifies a violation fraction. The boundary is inclusive.
    pub fn classify(&self, violation_fraction: f64) -> CheckStatus {
        self.bounds
            .iter()
            .find(|(_, bound)| violation_fraction <= *bound)
            .map(|(status, _)| *status)
            .unwrap_or(CheckStatus::Fail)
    }

    /// Returns the bound configured for a status, if any.
    pub fn bound(&self, status: CheckStatus) -> Option<f64> {
        self.bounds
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, bound)| *bound)
    }

    /// Iterates over `(status, bound)` pairs in ascending bound order.
    pub fn iter(&self) -> impl Iterator<Item = &(CheckStatus, f64)> {
        self.bounds.iter()
    }
}

impl Default for SeverityBounds {
    fn default() -> Self {
        Self::strict()
    }
}

impl fmt::Display for SeverityBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .bounds
            .iter()
            .map(|(status, bound)| format!("{status}: {bound}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl TryFrom<BTreeMap<String, f64>> for SeverityBounds {
    type Error = CdmError;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self> {
        Self::from_labels(value)
    }
}

impl From<SeverityBounds> for BTreeMap<String, f64> {
    fn from(value: SeverityBounds) -> Self {
        value
            .bounds
            .into_iter()
            .map(|(status, bound)| (status.as_str().to_string(), bound))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_warn() -> SeverityBounds {
        SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.05)]).unwrap()
    }

    #[test]
    fn test_inclusive_boundary() {
        let bounds = pass_warn();
        assert_eq!(bounds.classify(0.0), CheckStatus::Pass);
        assert_eq!(bounds.classify(0.03), CheckStatus::Warn);
        assert_eq!(bounds.classify(0.05), CheckStatus::Warn);
        assert_eq!(bounds.classify(0.05000001), CheckStatus::Fail);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let bounds = SeverityBounds::from_labels([("WARN", 0.1), ("PASS", 0.01)]).unwrap();
        let order: Vec<CheckStatus> = bounds.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, vec![CheckStatus::Pass, CheckStatus::Warn]);
        assert_eq!(bounds.classify(0.005), CheckStatus::Pass);
    }

    #[test]
    fn test_ties_prefer_less_severe() {
        let bounds = SeverityBounds::from_labels([("WARN", 0.1), ("PASS", 0.1)]).unwrap();
        assert_eq!(bounds.classify(0.1), CheckStatus::Pass);
    }

    #[test]
    fn test_explicit_fail_bound() {
        let bounds =
            SeverityBounds::from_labels([("PASS", 0.0), ("FAIL", 0.5), ("WARN", 0.1)]).unwrap();
        assert_eq!(bounds.classify(0.3), CheckStatus::Fail);
        assert_eq!(bounds.classify(0.9), CheckStatus::Fail);
    }

    #[test]
    fn test_invalid_label() {
        let err = SeverityBounds::from_labels([("PASS", 0.0), ("OK", 0.1)]).unwrap_err();
        assert!(matches!(err, CdmError::InvalidSeverityLabel { label } if label == "OK"));
    }

    #[test]
    fn test_label_is_checked_before_bound() {
        let err = SeverityBounds::from_labels([("pass", 7.0)]).unwrap_err();
        assert!(matches!(err, CdmError::InvalidSeverityLabel { .. }));
    }

    #[test]
    fn test_malformed_bounds() {
        assert!(matches!(
            SeverityBounds::from_labels([("PASS", 1.5)]),
            Err(CdmError::MalformedBounds(_))
        ));
        assert!(matches!(
            SeverityBounds::from_labels([("PASS", f64::NAN)]),
            Err(CdmError::MalformedBounds(_))
        ));
        assert!(matches!(
            SeverityBounds::from_labels(Vec::<(&str, f64)>::new()),
            Err(CdmError::MalformedBounds(_))
        ));
    }

    #[test]
    fn test_serde_round_trip_through_map() {
        let bounds: SeverityBounds = serde_json::from_str(r#"{"WARN": 0.05, "PASS": 0.0}"#).unwrap();
        assert_eq!(bounds, pass_warn());
        let json = serde_json::to_string(&bounds).unwrap();
        assert_eq!(json, r#"{"PASS":0.0,"WARN":0.05}"#);

        let bad: std::result::Result<SeverityBounds, _> =
            serde_json::from_str(r#"{"GREAT": 0.05}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(pass_warn().to_string(), "{PASS: 0, WARN: 0.05}");
        assert_eq!(SeverityBounds::strict().to_string(), "{PASS: 0}");
    }
}
