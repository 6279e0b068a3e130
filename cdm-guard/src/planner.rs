//! Run orchestration with skip propagation.
//!
//! Phases run strictly in this order, each reading the exclusions earlier
//! phases recorded:
//!
//! 1. file completeness: missing tables are excluded from every later check
//! 2. header checks per present file, in schema order: duplicated columns
//!    exclude the table from loading and checks, missing columns exclude
//!    just those columns
//! 3. load of every present, loadable file
//! 4. foreign keys, then not-null, then uniques, then primary keys
//!
//! A constraint touching an excluded table or column emits no result at all.
//! Tables that are absent from the store for other reasons (skip-loaded
//! tables) still run and record SKIPPED through the executor pre-checks.

use crate::checks::{
    ConstraintCheck, DistinctCheck, FileCompleteness, ForeignKeyCheck, HeaderChecks, NotNullCheck,
};
use crate::config::{RunConfig, TableSelection};
use crate::core::{CheckStatus, RunContext, RunSummary};
use crate::error::Result;
use crate::model::DataModel;
use crate::sources::{DataFusionStore, QueryStore, SubmissionDir, TableLoader};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, instrument};

/// Tables and columns disqualified by earlier checks of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipState {
    excluded_tables: BTreeSet<String>,
    excluded_columns: BTreeMap<String, BTreeSet<String>>,
}

impl SkipState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_table(&mut self, table: impl Into<String>) {
        self.excluded_tables.insert(table.into());
    }

    pub fn exclude_columns<I, S>(&mut self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns
            .entry(table.to_string())
            .or_default()
            .extend(columns.into_iter().map(Into::into));
    }

    pub fn is_table_excluded(&self, table: &str) -> bool {
        self.excluded_tables.contains(table)
    }

    /// True when the column itself is excluded; table exclusion is separate.
    pub fn is_column_excluded(&self, table: &str, column: &str) -> bool {
        self.excluded_columns
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }

    pub fn excluded_tables(&self) -> &BTreeSet<String> {
        &self.excluded_tables
    }

    pub fn excluded_columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.excluded_columns.get(table)
    }
}

/// Orchestrates one validation run over a submission.
#[derive(Debug)]
pub struct SkipPropagationPlanner<'a> {
    model: &'a DataModel,
    submission: &'a SubmissionDir,
    store: &'a DataFusionStore,
    selection: TableSelection,
    skip: SkipState,
    unloadable: BTreeSet<String>,
}

impl<'a> SkipPropagationPlanner<'a> {
    /// A planner where every schema table is required and checked.
    pub fn new(
        model: &'a DataModel,
        submission: &'a SubmissionDir,
        store: &'a DataFusionStore,
    ) -> Self {
        Self {
            model,
            submission,
            store,
            selection: TableSelection::all_required(),
            skip: SkipState::new(),
            unloadable: BTreeSet::new(),
        }
    }

    pub fn with_selection(mut self, selection: TableSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn skip_state(&self) -> &SkipState {
        &self.skip
    }

    /// Runs every phase and summarizes the run.
    ///
    /// A context that already holds results is reset first, so the summary
    /// covers this run only. A query or load failure aborts the run; check
    /// failures never do.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary> {
        if run.ledger().total() > 0 {
            debug!(previous_run_id = %run.run_id(), "resetting reused run context");
            run.reset();
        }
        tracing::Span::current().record("run_id", run.run_id());
        self.skip = SkipState::new();
        self.unloadable = self
            .model
            .table_names()
            .into_iter()
            .filter(|t| self.selection.is_skip_load(t))
            .map(str::to_string)
            .collect();
        for table in self.model.table_names() {
            if !self.selection.is_checked(table) {
                self.skip.exclude_table(table);
            }
        }

        self.check_completeness(run)?;
        self.check_headers(run)?;
        self.load_tables().await?;
        self.check_foreign_keys(run).await?;
        self.check_not_null(run).await?;
        self.check_uniques(run).await?;
        self.check_primary_keys(run).await?;

        let summary = run.summary();
        info!(
            total = summary.total_checks,
            pass = summary.pass_count,
            warn = summary.warn_count,
            fail = summary.fail_count,
            skipped = summary.skipped_count,
            "data quality run finished"
        );
        Ok(summary)
    }

    #[instrument(skip_all)]
    fn check_completeness(&mut self, run: &mut RunContext) -> Result<()> {
        let all_tables = self
            .model
            .table_names()
            .into_iter()
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        let required = all_tables
            .iter()
            .filter(|t| self.selection.is_required(t))
            .cloned()
            .collect::<BTreeSet<_>>();

        let completeness = FileCompleteness::new(self.submission);
        let missing = completeness.check_missing(run, &required, self.selection.optional_tables())?;
        if missing.status() != CheckStatus::Pass {
            for table in missing.tables() {
                self.skip.exclude_table(table.as_str());
            }
        }
        completeness.check_extra(run, &all_tables)?;
        Ok(())
    }

    #[instrument(skip_all)]
    fn check_headers(&mut self, run: &mut RunContext) -> Result<()> {
        for table in &self.model.tables {
            let name = table.name.as_str();
            if !self.submission.has_file(name) {
                debug!(table = name, "no submission file; skipping header checks");
                continue;
            }
            let header = self.submission.read_header(name)?;
            let checks = HeaderChecks::new(name, self.submission.file_name(name), &header);
            let schema_columns = table.column_names();

            let duplicates = checks.check_duplicates(run)?;
            if duplicates.status() != CheckStatus::Pass {
                self.unloadable.insert(name.to_string());
                self.skip.exclude_table(name);
            }
            checks.check_extra(run, &schema_columns)?;
            let missing = checks.check_missing(run, &schema_columns)?;
            if missing.status() != CheckStatus::Pass {
                self.skip.exclude_columns(name, missing.columns().iter().cloned());
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn load_tables(&self) -> Result<()> {
        let loader = TableLoader::new(self.store, self.submission, self.model);
        for table in self.model.table_names() {
            if !self.submission.has_file(table) {
                continue;
            }
            if self.unloadable.contains(table) {
                debug!(table, "table is not loaded");
                continue;
            }
            loader.load(table).await?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn check_foreign_keys(&self, run: &mut RunContext) -> Result<()> {
        for fk in &self.model.constraints().foreign_keys {
            if self.skip.is_table_excluded(&fk.source_table)
                || self.skip.is_table_excluded(&fk.target_table)
                || self.skip.is_column_excluded(&fk.source_table, &fk.source_field)
                || self.skip.is_column_excluded(&fk.target_table, &fk.target_field)
            {
                debug!(
                    main = %format!("{}.{}", fk.source_table, fk.source_field),
                    reference = %format!("{}.{}", fk.target_table, fk.target_field),
                    "foreign key check suppressed"
                );
                continue;
            }
            self.execute(&ForeignKeyCheck::from(fk), run).await?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn check_not_null(&self, run: &mut RunContext) -> Result<()> {
        for def in &self.model.constraints().not_null {
            if self.is_suppressed(&def.table, &def.field) {
                debug!(table = %def.table, column = %def.field, "not-null check suppressed");
                continue;
            }
            self.execute(&NotNullCheck::new(&def.table, &def.field), run)
                .await?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn check_uniques(&self, run: &mut RunContext) -> Result<()> {
        for def in &self.model.constraints().uniques {
            if self.is_suppressed(&def.table, &def.field) {
                debug!(table = %def.table, column = %def.field, "distinct check suppressed");
                continue;
            }
            self.execute(&DistinctCheck::new(&def.table, &def.field), run)
                .await?;
        }
        Ok(())
    }

    /// A key expands into one not-null check per column plus one composite
    /// distinct check; a column exclusion suppresses only what it touches.
    #[instrument(skip_all)]
    async fn check_primary_keys(&self, run: &mut RunContext) -> Result<()> {
        for pk in &self.model.constraints().primary_keys {
            if self.skip.is_table_excluded(&pk.table) {
                debug!(table = %pk.table, "primary key checks suppressed");
                continue;
            }
            for column in &pk.fields {
                if self.skip.is_column_excluded(&pk.table, column) {
                    debug!(table = %pk.table, column = %column, "primary key not-null check suppressed");
                    continue;
                }
                self.execute(&NotNullCheck::new(&pk.table, column), run)
                    .await?;
            }
            if pk
                .fields
                .iter()
                .any(|c| self.skip.is_column_excluded(&pk.table, c))
            {
                debug!(table = %pk.table, "primary key distinct check suppressed");
                continue;
            }
            let check = DistinctCheck::composite(&pk.table, &pk.fields)?;
            self.execute(&check, run).await?;
        }
        Ok(())
    }

    fn is_suppressed(&self, table: &str, column: &str) -> bool {
        self.skip.is_table_excluded(table) || self.skip.is_column_excluded(table, column)
    }

    async fn execute(&self, check: &dyn ConstraintCheck, run: &mut RunContext) -> Result<()> {
        let store: &dyn QueryStore = self.store;
        if let Err(e) = check.execute(store, run).await {
            error!(
                check = %check.kind(),
                configuration = e.is_configuration(),
                error = %e,
                "check aborted the run"
            );
            return Err(e);
        }
        Ok(())
    }
}

/// Runs a complete validation from a configuration and returns the run context
/// holding every recorded result.
///
/// # Examples
///
/// ```rust,no_run
/// use cdm_guard::config::RunConfig;
/// use cdm_guard::planner::run_from_config;
/// use std::path::Path;
///
/// # async fn example() -> cdm_guard::error::Result<()> {
/// let config = RunConfig::from_path(Path::new("cdm-guard.toml"))?;
/// let run = run_from_config(&config).await?;
/// println!("{} checks failed", run.ledger().fails().len());
/// # Ok(())
/// # }
/// ```
pub async fn run_from_config(config: &RunConfig) -> Result<RunContext> {
    let model = config.load_model()?;
    let submission = config.submission_dir();
    let store = DataFusionStore::with_config(config.store.clone());
    let mut run = RunContext::new(config.build_resolver()?);
    info!(run_id = %run.run_id(), model = %model.model, version = %model.version, "starting data quality run");

    SkipPropagationPlanner::new(&model, &submission, &store)
        .with_selection(config.tables.selection()?)
        .run(&mut run)
        .await?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_state() {
        let mut skip = SkipState::new();
        skip.exclude_table("care_site");
        skip.exclude_columns("person", ["birth_date"]);
        skip.exclude_columns("person", ["race_concept_id"]);

        assert!(skip.is_table_excluded("care_site"));
        assert!(!skip.is_table_excluded("person"));
        assert!(skip.is_column_excluded("person", "birth_date"));
        assert!(skip.is_column_excluded("person", "race_concept_id"));
        assert!(!skip.is_column_excluded("person", "person_id"));
        assert!(!skip.is_column_excluded("care_site", "care_site_id"));
        assert_eq!(skip.excluded_columns("person").map(|c| c.len()), Some(2));
    }
}
