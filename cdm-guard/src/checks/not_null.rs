use super::{resolve_bounds, violation_fraction, ConstraintCheck};
use crate::core::{CheckKind, CheckResult, CheckStatus, RunContext, SeverityBounds};
use crate::error::Result;
use crate::sources::QueryStore;
use crate::thresholds::MatchFields;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Counts NULLs in one column.
#[derive(Debug, Clone)]
pub struct NotNullCheck {
    table: String,
    column: String,
    bounds: Option<SeverityBounds>,
}

impl NotNullCheck {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            bounds: None,
        }
    }

    /// Grades violations with these bounds instead of the run's thresholds.
    pub fn with_bounds(mut self, bounds: SeverityBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

#[async_trait]
impl ConstraintCheck for NotNullCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::NotNull
    }

    #[instrument(skip(self, store, run), fields(check = "not_null_violation", table = %self.table, column = %self.column))]
    async fn execute(&self, store: &dyn QueryStore, run: &mut RunContext) -> Result<CheckResult> {
        let builder = CheckResult::builder(self.kind())
            .table(&self.table)
            .column(&self.column);

        if !store.table_exists(&self.table).await? {
            return builder
                .status(CheckStatus::Skipped)
                .message(format!("Table {} does not exist in the store.", self.table))
                .record(run);
        }
        if !store.column_exists(&self.table, &self.column).await? {
            return builder
                .status(CheckStatus::Skipped)
                .message(format!(
                    "Column {} does not exist in table {}.",
                    self.column, self.table
                ))
                .record(run);
        }

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            store.quote_identifier(&self.table)?,
            store.quote_identifier(&self.column)?
        );
        debug!(%sql, "counting NULL values");
        let violations = store.query_count(&sql).await?;
        if violations == 0 {
            return builder.status(CheckStatus::Pass).record(run);
        }

        let total = store.row_count(&self.table).await?;
        let fraction = violation_fraction(violations, total);
        let bounds = resolve_bounds(
            run,
            self.kind(),
            self.bounds.as_ref(),
            &MatchFields::new().table(&self.table).column(&self.column),
        )?;
        builder
            .violation(fraction, bounds)
            .message(format!(
                "The column \"{}\" in table \"{}\" has {violations} NULL values out of {total} rows ({:.2}%). \
                 Please ensure this column does not contain NULL values.",
                self.column,
                self.table,
                fraction * 100.0
            ))
            .record(run)
    }
}
