//! # cdm-guard - Data Quality Checks for Common Data Model Submissions
//!
//! cdm-guard validates a directory of per-table CSV files against a versioned
//! common data model and reports every rule violation with a graded severity.
//! Submissions are loaded into DataFusion and checked with ad hoc SQL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cdm_guard::prelude::*;
//! use std::path::Path;
//!
//! # async fn example() -> cdm_guard::error::Result<()> {
//! let config = RunConfig::from_path(Path::new("cdm-guard.toml"))?;
//! init_logging(&config.logging)?;
//!
//! let run = run_from_config(&config).await?;
//! let report = HumanFormatter::new().format(&run.summary())?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## What gets checked
//!
//! - **File completeness**: every required table has a file (FAIL), no file is
//!   unaccounted for (WARN)
//! - **Header shape**: no duplicated (FAIL), extra (WARN) or missing (FAIL) columns
//! - **Foreign keys**, **not-null**, **uniqueness** and **primary keys** declared
//!   in the data model, graded by configurable thresholds
//!
//! Checks that would run against a table or column already known to be bad
//! are suppressed rather than reported as failures; see [`planner`].
//!
//! ## Architecture
//!
//! - **`core`**: check kinds, statuses, results and the run context
//! - **`thresholds`**: last-match-wins severity threshold rules
//! - **`checks`**: one executor per check kind
//! - **`planner`**: phase ordering and skip propagation
//! - **`sources`**: the submission directory, the DataFusion store and the loader
//! - **`model`**: the data model document
//! - **`config`**: TOML run configuration
//! - **`formatters`**: text and JSON run reports
//! - **`logging`**: tracing subscriber setup

pub mod checks;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod model;
pub mod planner;
pub mod prelude;
pub mod security;
pub mod sources;
pub mod thresholds;

#[cfg(test)]
pub(crate) mod test_helpers;
