//! Core result types for the cdm-guard engine.
//!
//! - **[`CheckKind`]**: the registered kinds of check
//! - **[`CheckStatus`]** and **[`SeverityBounds`]**: the status model and how a
//!   violation fraction is graded into a status
//! - **[`CheckResult`]**: the immutable outcome of one check
//! - **[`RunContext`]**: run-scoped state every check records its result into
//! - **[`RunSummary`]**: the end-of-run aggregate
//!
//! ## Status inference
//!
//! ```text
//! violation fraction ──► SeverityBounds (sorted ascending)
//!                          PASS ≤ 0.00
//!                          WARN ≤ 0.05   ──► first bound ≥ fraction
//!                          (none)        ──► FAIL
//! ```

mod context;
mod kind;
mod result;
mod status;
mod summary;

pub use context::{RunContext, RunLedger, DQ_LOG_TARGET};
pub use kind::CheckKind;
pub use result::{CheckResult, CheckResultBuilder};
pub use status::{CheckStatus, SeverityBounds};
pub use summary::RunSummary;
