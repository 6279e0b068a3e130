use super::{render_samples, resolve_bounds, violation_fraction, ConstraintCheck, MAX_DISTINCT_SAMPLES};
use crate::core::{CheckKind, CheckResult, CheckStatus, RunContext, SeverityBounds};
use crate::error::{CdmError, Result};
use crate::sources::QueryStore;
use crate::thresholds::MatchFields;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Uniqueness of one column or of a column combination.
///
/// For a composite key, distinct rows are counted over the columns jointly, so
/// `(1, 1)` and `(1, 2)` are distinct and NULLs group together like any
/// other value. A single column counts only its non-null distinct values, so
/// each NULL row is a violation.
#[derive(Debug, Clone)]
pub struct DistinctCheck {
    table: String,
    columns: Vec<String>,
    bounds: Option<SeverityBounds>,
}

impl DistinctCheck {
    /// A single-column uniqueness check.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec![column.into()],
            bounds: None,
        }
    }

    /// A composite uniqueness check over the columns in key order.
    pub fn composite<I, S>(table: impl Into<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = table.into();
        let columns = columns.into_iter().map(Into::into).collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(CdmError::Configuration(format!(
                "distinct check on '{table}' needs at least one column"
            )));
        }
        Ok(Self {
            table,
            columns,
            bounds: None,
        })
    }

    pub fn with_bounds(mut self, bounds: SeverityBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column whose name is matched against threshold rules.
    ///
    /// Composite keys resolve on their first column only.
    fn threshold_column(&self) -> &str {
        &self.columns[0]
    }
}

#[async_trait]
impl ConstraintCheck for DistinctCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Distinct
    }

    #[instrument(skip(self, store, run), fields(check = "distinct_violation", table = %self.table, columns = ?self.columns))]
    async fn execute(&self, store: &dyn QueryStore, run: &mut RunContext) -> Result<CheckResult> {
        if !store.table_exists(&self.table).await? {
            return CheckResult::builder(self.kind())
                .table(&self.table)
                .columns(&self.columns)
                .status(CheckStatus::Skipped)
                .message(format!("Table {} does not exist in the store.", self.table))
                .record(run);
        }
        for column in &self.columns {
            if !store.column_exists(&self.table, column).await? {
                return CheckResult::builder(self.kind())
                    .table(&self.table)
                    .column(column)
                    .status(CheckStatus::Skipped)
                    .message(format!(
                        "Column {column} does not exist in table {}.",
                        self.table
                    ))
                    .record(run);
            }
        }

        let table = store.quote_identifier(&self.table)?;
        let columns = store.quote_list(&self.columns)?;

        // COUNT(DISTINCT) drops NULLs, so every NULL in a single column is a
        // violation; composite rows are compared whole and NULLs group.
        let sql = if self.columns.len() == 1 {
            format!("SELECT COUNT(DISTINCT {columns}) FROM {table}")
        } else {
            format!("SELECT COUNT(*) FROM (SELECT DISTINCT {columns} FROM {table}) AS distinct_rows")
        };
        debug!(%sql, "counting distinct rows");
        let distinct = store.query_count(&sql).await?;
        let total = store.row_count(&self.table).await?;
        let violations = total.saturating_sub(distinct);

        let builder = CheckResult::builder(self.kind())
            .table(&self.table)
            .columns(&self.columns);
        if violations == 0 {
            return builder.status(CheckStatus::Pass).record(run);
        }

        let sample_sql = format!(
            "SELECT {columns} FROM {table} GROUP BY {columns} HAVING COUNT(*) > 1 \
             ORDER BY {columns} LIMIT {MAX_DISTINCT_SAMPLES}"
        );
        debug!(sql = %sample_sql, "sampling duplicated values");
        let samples = render_samples(&store.query_rows(&sample_sql).await?);

        let fraction = violation_fraction(violations, total);
        let bounds = resolve_bounds(
            run,
            self.kind(),
            self.bounds.as_ref(),
            &MatchFields::new()
                .table(&self.table)
                .column(self.threshold_column()),
        )?;
        builder
            .violation(fraction, bounds)
            .extra("violation_count", violations)
            .message(format!(
                "The column(s) \"{}\" in table \"{}\" have {violations} non-distinct values out of {total} rows ({:.2}%). \
                 Sample non-distinct values: {samples}. Please ensure the column(s) contain only distinct values.",
                self.columns.join(", "),
                self.table,
                fraction * 100.0
            ))
            .record(run)
    }
}
