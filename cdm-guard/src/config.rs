//! Run configuration.
//!
//! A run is configured from a TOML document:
//!
//! ```toml
//! [submission]
//! dir = "/data/site_a/2024-06"
//! file_extension = ".csv"
//!
//! [submission.csv]
//! delimiter = ","
//!
//! [model]
//! path = "models/pedsnet-5.7.0.json"
//!
//! [tables]
//! skip_load = ["*_staging"]
//!
//! [logging]
//! level = "info"
//! json = true
//!
//! [[thresholds.foreign_key_violation]]
//! bounds = { PASS = 0.0, WARN = 0.05 }
//!
//! [[thresholds.foreign_key_violation]]
//! table = "visit_*"
//! column = "provider_id"
//! bounds = { PASS = 0.01 }
//! ```
//!
//! Threshold rules for a kind are kept in declared order and resolved
//! last-match-wins, so a specific rule must follow the general one it overrides.

use crate::error::{CdmError, ErrorContext, Result};
use crate::logging::setup::LoggingConfig;
use crate::model::DataModel;
use crate::sources::{CsvOptions, StoreConfig, SubmissionDir};
use crate::thresholds::{ThresholdResolver, ThresholdRuleConfig};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Vocabulary and derived-era tables a site is not required to submit.
pub const DEFAULT_OPTIONAL_TABLES: [&str; 15] = [
    "cohort_definition",
    "concept",
    "concept_ancestor",
    "concept_class",
    "concept_relationship",
    "concept_synonym",
    "condition_era",
    "domain",
    "dose_era",
    "drug_era",
    "drug_strength",
    "observation_period",
    "relationship",
    "source_to_concept_map",
    "vocabulary",
];

/// Complete configuration of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub submission: SubmissionConfig,
    pub model: ModelConfig,
    pub tables: TablesConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    /// Check-kind name to ordered threshold rules
    pub thresholds: BTreeMap<String, Vec<ThresholdRuleConfig>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub dir: PathBuf,
    pub file_extension: String,
    /// Delimiter and quote character of the submission files
    pub csv: CsvOptions,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_extension: ".csv".to_string(),
            csv: CsvOptions::default(),
        }
    }
}

/// Where the data model document comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Local JSON document
    pub path: Option<PathBuf>,
    /// Expected model name; checked against the document when set
    pub name: Option<String>,
    /// Expected model version; checked against the document when set
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Tables not required for a complete submission
    pub optional: Vec<String>,
    /// Glob patterns of tables that are neither required nor loaded
    pub skip_load: Vec<String>,
    /// Whether constraint checks run on optional tables
    pub check_optional: bool,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            optional: DEFAULT_OPTIONAL_TABLES.iter().map(|t| t.to_string()).collect(),
            skip_load: Vec::new(),
            check_optional: false,
        }
    }
}

impl TablesConfig {
    /// Compiles the table policy, validating every `skip_load` pattern.
    pub fn selection(&self) -> Result<TableSelection> {
        let skip_load = self
            .skip_load
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    CdmError::Configuration(format!("invalid skip_load pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TableSelection {
            optional: self.optional.iter().cloned().collect(),
            skip_load,
            check_optional: self.check_optional,
        })
    }
}

/// Which schema tables a run requires, loads and checks.
#[derive(Debug, Clone, Default)]
pub struct TableSelection {
    optional: BTreeSet<String>,
    skip_load: Vec<Pattern>,
    check_optional: bool,
}

impl TableSelection {
    /// A policy where every table is required, loaded and checked.
    pub fn all_required() -> Self {
        Self::default()
    }

    pub fn with_optional<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn with_check_optional(mut self, enabled: bool) -> Self {
        self.check_optional = enabled;
        self
    }

    pub fn is_optional(&self, table: &str) -> bool {
        self.optional.contains(table)
    }

    pub fn is_skip_load(&self, table: &str) -> bool {
        self.skip_load.iter().any(|p| p.matches(table))
    }

    /// Whether a present file must be reported missing when absent.
    pub fn is_required(&self, table: &str) -> bool {
        !self.is_optional(table) && !self.is_skip_load(table)
    }

    /// Whether constraint checks run against the table.
    pub fn is_checked(&self, table: &str) -> bool {
        self.check_optional || !self.is_optional(table)
    }

    pub fn optional_tables(&self) -> &BTreeSet<String> {
        &self.optional
    }
}

impl RunConfig {
    /// Parses and validates a configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration file.
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config = Self::from_toml_str(&source)?;
        debug!(thresholds = config.thresholds.len(), "configuration loaded");
        Ok(config)
    }

    /// Checks everything that can fail before a run starts.
    pub fn validate(&self) -> Result<()> {
        self.build_resolver()?;
        self.tables.selection()?;
        self.logging.env_filter()?;
        self.submission.csv.validate()?;
        if self.submission.file_extension.trim_start_matches('.').is_empty() {
            return Err(CdmError::Configuration(
                "submission file_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Threshold resolver for the run; kinds not configured keep zero tolerance.
    pub fn build_resolver(&self) -> Result<ThresholdResolver> {
        ThresholdResolver::from_config(&self.thresholds)
    }

    pub fn submission_dir(&self) -> SubmissionDir {
        SubmissionDir::with_extension(&self.submission.dir, &self.submission.file_extension)
            .with_csv_options(self.submission.csv)
    }

    /// Reads the configured data model and checks its name and version.
    pub fn load_model(&self) -> Result<DataModel> {
        let path = self.model.path.as_deref().ok_or_else(|| {
            CdmError::Configuration("[model] path is required to load the data model".to_string())
        })?;
        let model = DataModel::from_path(path)?;
        if let Some(name) = &self.model.name {
            if !model.model.eq_ignore_ascii_case(name) {
                return Err(CdmError::Schema(format!(
                    "expected data model '{name}', document describes '{}'",
                    model.model
                )));
            }
        }
        if let Some(version) = &self.model.version {
            if &model.version != version {
                return Err(CdmError::Schema(format!(
                    "expected data model version '{version}', document has '{}'",
                    model.version
                )));
            }
        }
        Ok(model)
    }
}
