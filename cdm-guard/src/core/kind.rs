//! The registered kinds of data quality check.

use crate::error::{CdmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every check the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// A required table has no submission file
    MissingSubmissionFile,
    /// A submission file does not correspond to any schema table
    ExtraSubmissionFile,
    /// A file header repeats a column name
    #[serde(rename = "csv_header_duplication")]
    HeaderDuplication,
    /// A file header has columns the schema does not declare
    #[serde(rename = "extra_column_in_csv_header")]
    ExtraHeaderColumn,
    /// A file header lacks columns the schema declares
    #[serde(rename = "missing_column_in_csv_header")]
    MissingHeaderColumn,
    /// A not-null constraint is violated
    #[serde(rename = "not_null_violation")]
    NotNull,
    /// A uniqueness (or primary-key uniqueness) constraint is violated
    #[serde(rename = "distinct_violation")]
    Distinct,
    /// A foreign-key constraint is violated
    #[serde(rename = "foreign_key_violation")]
    ForeignKey,
}

impl CheckKind {
    /// All registered kinds.
    pub const ALL: [CheckKind; 8] = [
        CheckKind::MissingSubmissionFile,
        CheckKind::ExtraSubmissionFile,
        CheckKind::HeaderDuplication,
        CheckKind::ExtraHeaderColumn,
        CheckKind::MissingHeaderColumn,
        CheckKind::NotNull,
        CheckKind::Distinct,
        CheckKind::ForeignKey,
    ];

    /// Kinds whose severity comes from threshold rules rather than being fixed.
    pub const THRESHOLDED: [CheckKind; 3] =
        [CheckKind::NotNull, CheckKind::Distinct, CheckKind::ForeignKey];

    /// The registered name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::MissingSubmissionFile => "missing_submission_file",
            CheckKind::ExtraSubmissionFile => "extra_submission_file",
            CheckKind::HeaderDuplication => "csv_header_duplication",
            CheckKind::ExtraHeaderColumn => "extra_column_in_csv_header",
            CheckKind::MissingHeaderColumn => "missing_column_in_csv_header",
            CheckKind::NotNull => "not_null_violation",
            CheckKind::Distinct => "distinct_violation",
            CheckKind::ForeignKey => "foreign_key_violation",
        }
    }

    /// Whether this kind consults threshold rules.
    pub fn uses_thresholds(&self) -> bool {
        Self::THRESHOLDED.contains(self)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = CdmError;

    fn from_str(s: &str) -> Result<Self> {
        CheckKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CdmError::UnknownCheckKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(kind.as_str().parse::<CheckKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "row_count_violation".parse::<CheckKind>().unwrap_err();
        assert!(matches!(err, CdmError::UnknownCheckKind(name) if name == "row_count_violation"));
    }

    #[test]
    fn test_thresholded_kinds() {
        assert!(CheckKind::ForeignKey.uses_thresholds());
        assert!(CheckKind::NotNull.uses_thresholds());
        assert!(!CheckKind::MissingSubmissionFile.uses_thresholds());
        assert!(!CheckKind::HeaderDuplication.uses_thresholds());
    }
}
