//! Check executors, one per [`CheckKind`].
//!
//! Shape checks work on the submission directory and file headers and have
//! fixed severities:
//!
//! - [`FileCompleteness`]: missing (FAIL) and surplus (WARN) submission files
//! - [`HeaderChecks`]: duplicated (FAIL), extra (WARN) and missing (FAIL) header columns
//!
//! Constraint checks implement [`ConstraintCheck`] and run against a
//! [`QueryStore`]:
//!
//! - [`NotNullCheck`]
//! - [`DistinctCheck`] (single column or composite key)
//! - [`ForeignKeyCheck`]
//!
//! A constraint check whose table or column is absent from the store records a
//! SKIPPED result instead of failing. Zero violations record PASS without
//! consulting thresholds; otherwise the violation fraction is graded against
//! the bounds resolved for the (kind, table, column) triple.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cdm_guard::checks::{ConstraintCheck, ForeignKeyCheck};
//! use cdm_guard::core::RunContext;
//! use cdm_guard::sources::DataFusionStore;
//!
//! # async fn example(store: &DataFusionStore) -> cdm_guard::error::Result<()> {
//! let mut run = RunContext::default();
//! let check = ForeignKeyCheck::new("visit_occurrence", "person_id", "person", "person_id");
//! let result = check.execute(store, &mut run).await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

use crate::core::{CheckKind, CheckResult, RunContext, SeverityBounds};
use crate::error::Result;
use crate::logging::{truncate_field, DEFAULT_MAX_FIELD_LENGTH};
use crate::sources::QueryStore;
use crate::thresholds::MatchFields;
use async_trait::async_trait;
use std::fmt::Debug;

mod completeness;
mod distinct;
mod foreign_key;
mod header;
mod not_null;

pub use completeness::{extra_files, missing_tables, FileCompleteness};
pub use distinct::DistinctCheck;
pub use foreign_key::ForeignKeyCheck;
pub use header::{duplicated_columns, HeaderChecks};
pub use not_null::NotNullCheck;

/// Maximum number of duplicated value combinations reported by a distinct check.
pub const MAX_DISTINCT_SAMPLES: usize = 10;

/// Maximum number of unmatched values reported by a foreign-key check.
pub const MAX_FOREIGN_KEY_SAMPLES: usize = 5;

/// A constraint check executed against a queryable store.
///
/// Executing a check records exactly one result into the run context. Query
/// failures propagate as errors and record nothing.
#[async_trait]
pub trait ConstraintCheck: Debug + Send + Sync {
    /// The kind of result this check records.
    fn kind(&self) -> CheckKind;

    /// Runs the check and records its result.
    async fn execute(&self, store: &dyn QueryStore, run: &mut RunContext) -> Result<CheckResult>;
}

/// Fraction of `total` rows that violate a constraint.
pub(crate) fn violation_fraction(violations: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (violations as f64 / total as f64).min(1.0)
    }
}

/// Bounds supplied on the check itself, else the run's resolved threshold.
pub(crate) fn resolve_bounds(
    run: &RunContext,
    kind: CheckKind,
    explicit: Option<&SeverityBounds>,
    fields: &MatchFields<'_>,
) -> Result<SeverityBounds> {
    match explicit {
        Some(bounds) => Ok(bounds.clone()),
        None => run.thresholds().resolve_or_strict(kind, fields),
    }
}

/// Renders sampled rows; composite rows render as `(a, b)`.
pub(crate) fn render_samples(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            let cells = row
                .iter()
                .map(|cell| truncate_field(cell, DEFAULT_MAX_FIELD_LENGTH))
                .collect::<Vec<_>>();
            if cells.len() == 1 {
                cells.join("")
            } else {
                format!("({})", cells.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
