//! Prelude for commonly used types and traits in cdm-guard.

pub use crate::checks::ConstraintCheck;
pub use crate::config::RunConfig;
pub use crate::core::{CheckKind, CheckResult, CheckStatus, RunContext, RunSummary, SeverityBounds};
pub use crate::error::{CdmError, ErrorContext, Result};
pub use crate::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ReportFormatter};
pub use crate::logging::setup::{init_logging, LoggingConfig};
pub use crate::model::DataModel;
pub use crate::planner::{run_from_config, SkipPropagationPlanner};
pub use crate::sources::{CsvOptions, DataFusionStore, QueryStore, SubmissionDir};
