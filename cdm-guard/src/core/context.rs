//! Run-scoped state shared by every check of one validation run.
//!
//! [`RunContext`] replaces process-wide accumulators: each run owns its own
//! ledger of results, its threshold rules and its run id, so consecutive or
//! concurrent runs never observe each other's results.

use super::{CheckResult, CheckStatus, RunSummary};
use crate::thresholds::ThresholdResolver;
use chrono::Local;
use tracing::{info, warn};

/// Log target used for per-check result events.
pub const DQ_LOG_TARGET: &str = "cdm_guard::dq";

/// Accumulates recorded results by status.
///
/// Passing results are only counted; the other statuses are kept in
/// recording order.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    pass_count: usize,
    fails: Vec<CheckResult>,
    warns: Vec<CheckResult>,
    skips: Vec<CheckResult>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, result: CheckResult) {
        match result.status() {
            CheckStatus::Pass => self.pass_count += 1,
            CheckStatus::Warn => self.warns.push(result),
            CheckStatus::Fail => self.fails.push(result),
            CheckStatus::Skipped => self.skips.push(result),
        }
    }

    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn fails(&self) -> &[CheckResult] {
        &self.fails
    }

    pub fn warns(&self) -> &[CheckResult] {
        &self.warns
    }

    pub fn skips(&self) -> &[CheckResult] {
        &self.skips
    }

    /// Number of recorded results of every status.
    pub fn total(&self) -> usize {
        self.pass_count + self.fails.len() + self.warns.len() + self.skips.len()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The context object every check invocation records its result into.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    thresholds: ThresholdResolver,
    ledger: RunLedger,
}

impl RunContext {
    /// Creates a context with a fresh timestamp run id.
    pub fn new(thresholds: ThresholdResolver) -> Self {
        Self {
            run_id: new_run_id(),
            thresholds,
            ledger: RunLedger::new(),
        }
    }

    /// Overrides the generated run id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn thresholds(&self) -> &ThresholdResolver {
        &self.thresholds
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Clears recorded results and starts a new run id, keeping the thresholds.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.run_id = new_run_id();
    }

    /// Summarizes everything recorded so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_ledger(&self.run_id, &self.ledger)
    }

    pub(crate) fn record(&mut self, result: CheckResult) -> CheckResult {
        log_result(&self.run_id, &result);
        self.ledger.push(result.clone());
        result
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(ThresholdResolver::default())
    }
}

fn new_run_id() -> String {
    Local::now().format("%Y-%m-%d_%H:%M:%S%.6f").to_string()
}

fn log_result(run_id: &str, result: &CheckResult) {
    let tables = result.tables().iter().cloned().collect::<Vec<_>>().join(",");
    let columns = result.columns().iter().cloned().collect::<Vec<_>>().join(",");
    let violation_pct = result.violation_fraction().map(|f| f * 100.0);
    if result.status() == CheckStatus::Fail {
        warn!(
            target: DQ_LOG_TARGET,
            run_id,
            check = %result.kind(),
            status = %result.status(),
            tables,
            columns,
            violation_pct,
            "{result}"
        );
    } else {
        info!(
            target: DQ_LOG_TARGET,
            run_id,
            check = %result.kind(),
            status = %result.status(),
            tables,
            columns,
            violation_pct,
            "{result}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CheckKind;

    fn record(run: &mut RunContext, status: CheckStatus) {
        CheckResult::builder(CheckKind::NotNull)
            .table("person")
            .status(status)
            .record(run)
            .unwrap();
    }

    #[test]
    fn test_ledger_buckets() {
        let mut run = RunContext::default().with_run_id("test-run");
        record(&mut run, CheckStatus::Pass);
        record(&mut run, CheckStatus::Pass);
        record(&mut run, CheckStatus::Warn);
        record(&mut run, CheckStatus::Fail);
        record(&mut run, CheckStatus::Skipped);

        let ledger = run.ledger();
        assert_eq!(ledger.pass_count(), 2);
        assert_eq!(ledger.warns().len(), 1);
        assert_eq!(ledger.fails().len(), 1);
        assert_eq!(ledger.skips().len(), 1);
        assert_eq!(ledger.total(), 5);
        assert_eq!(run.run_id(), "test-run");
    }

    #[test]
    fn test_runs_are_isolated() {
        let mut first = RunContext::default();
        let second = RunContext::default();
        record(&mut first, CheckStatus::Fail);
        assert_eq!(first.ledger().total(), 1);
        assert_eq!(second.ledger().total(), 0);
    }

    #[test]
    fn test_reset() {
        let mut run = RunContext::default().with_run_id("before");
        record(&mut run, CheckStatus::Fail);
        run.reset();
        assert_eq!(run.ledger().total(), 0);
        assert_ne!(run.run_id(), "before");
    }
}
