//! End-of-run summary.

use super::{CheckResult, RunLedger};
use serde::{Deserialize, Serialize};

/// Counts of every status plus the FAIL and WARN results, in recording order.
///
/// PASS and SKIPPED results are counted but not listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub total_checks: usize,
    pub pass_count: usize,
    pub warn_count: usize,
    pub fail_count: usize,
    pub skipped_count: usize,
    pub failures: Vec<CheckResult>,
    pub warnings: Vec<CheckResult>,
}

impl RunSummary {
    pub fn from_ledger(run_id: &str, ledger: &RunLedger) -> Self {
        Self {
            run_id: run_id.to_string(),
            total_checks: ledger.total(),
            pass_count: ledger.pass_count(),
            warn_count: ledger.warns().len(),
            fail_count: ledger.fails().len(),
            skipped_count: ledger.skips().len(),
            failures: ledger.fails().to_vec(),
            warnings: ledger.warns().to_vec(),
        }
    }

    /// True when at least one check failed.
    pub fn has_failures(&self) -> bool {
        self.fail_count > 0
    }

    /// Percentage of checks that passed, 100 for an empty run.
    pub fn pass_rate(&self) -> f64 {
        if self.total_checks == 0 {
            100.0
        } else {
            self.pass_count as f64 / self.total_checks as f64 * 100.0
        }
    }
}
