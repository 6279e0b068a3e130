//! Referential integrity between two tables.
//!
//! A main-table row violates the constraint when its column is non-null and
//! no reference-table row carries the same value: a left anti-join over
//! non-null values. NULL foreign keys are never violations.

use super::{
    render_samples, resolve_bounds, violation_fraction, ConstraintCheck, MAX_FOREIGN_KEY_SAMPLES,
};
use crate::core::{CheckKind, CheckResult, CheckResultBuilder, CheckStatus, RunContext, SeverityBounds};
use crate::error::Result;
use crate::model::ForeignKeyDef;
use crate::sources::QueryStore;
use crate::thresholds::MatchFields;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Checks that every non-null `main_table.main_column` value exists in
/// `reference_table.reference_column`.
#[derive(Debug, Clone)]
pub struct ForeignKeyCheck {
    main_table: String,
    main_column: String,
    reference_table: String,
    reference_column: String,
    bounds: Option<SeverityBounds>,
}

impl ForeignKeyCheck {
    pub fn new(
        main_table: impl Into<String>,
        main_column: impl Into<String>,
        reference_table: impl Into<String>,
        reference_column: impl Into<String>,
    ) -> Self {
        Self {
            main_table: main_table.into(),
            main_column: main_column.into(),
            reference_table: reference_table.into(),
            reference_column: reference_column.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: SeverityBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn main_table(&self) -> &str {
        &self.main_table
    }

    pub fn reference_table(&self) -> &str {
        &self.reference_table
    }

    fn builder(&self) -> CheckResultBuilder {
        CheckResult::builder(CheckKind::ForeignKey)
            .table(&self.main_table)
            .column(&self.main_column)
            .extra("reference_table", self.reference_table.as_str())
            .extra("reference_column", self.reference_column.as_str())
    }

    /// The first missing subject, in the order main table, reference table,
    /// main column, reference column.
    async fn missing_subject(&self, store: &dyn QueryStore) -> Result<Option<String>> {
        if !store.table_exists(&self.main_table).await? {
            return Ok(Some(format!(
                "Main table {} does not exist in the store.",
                self.main_table
            )));
        }
        if !store.table_exists(&self.reference_table).await? {
            return Ok(Some(format!(
                "Reference table {} does not exist in the store.",
                self.reference_table
            )));
        }
        if !store.column_exists(&self.main_table, &self.main_column).await? {
            return Ok(Some(format!(
                "Main column {} does not exist in the main table {}.",
                self.main_column, self.main_table
            )));
        }
        if !store
            .column_exists(&self.reference_table, &self.reference_column)
            .await?
        {
            return Ok(Some(format!(
                "Reference column {} does not exist in the reference table {}.",
                self.reference_column, self.reference_table
            )));
        }
        Ok(None)
    }
}

impl From<&ForeignKeyDef> for ForeignKeyCheck {
    fn from(def: &ForeignKeyDef) -> Self {
        Self::new(
            &def.source_table,
            &def.source_field,
            &def.target_table,
            &def.target_field,
        )
    }
}

#[async_trait]
impl ConstraintCheck for ForeignKeyCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ForeignKey
    }

    #[instrument(skip(self, store, run), fields(
        check = "foreign_key_violation",
        main = %format!("{}.{}", self.main_table, self.main_column),
        reference = %format!("{}.{}", self.reference_table, self.reference_column)
    ))]
    async fn execute(&self, store: &dyn QueryStore, run: &mut RunContext) -> Result<CheckResult> {
        if let Some(message) = self.missing_subject(store).await? {
            return self
                .builder()
                .status(CheckStatus::Skipped)
                .message(message)
                .record(run);
        }

        let main_table = store.quote_identifier(&self.main_table)?;
        let main_column = store.quote_identifier(&self.main_column)?;
        let reference_table = store.quote_identifier(&self.reference_table)?;
        let reference_column = store.quote_identifier(&self.reference_column)?;
        let unmatched = format!(
            "FROM {main_table} AS m LEFT JOIN {reference_table} AS r \
             ON m.{main_column} = r.{reference_column} \
             WHERE r.{reference_column} IS NULL AND m.{main_column} IS NOT NULL"
        );

        let sql = format!("SELECT COUNT(*) {unmatched}");
        debug!(%sql, "counting unmatched foreign keys");
        let violations = store.query_count(&sql).await?;
        if violations == 0 {
            return self.builder().status(CheckStatus::Pass).record(run);
        }

        let sample_sql = format!(
            "SELECT DISTINCT m.{main_column} {unmatched} ORDER BY m.{main_column} LIMIT {MAX_FOREIGN_KEY_SAMPLES}"
        );
        debug!(sql = %sample_sql, "sampling unmatched foreign keys");
        let samples = render_samples(&store.query_rows(&sample_sql).await?);

        let total = store.row_count(&self.main_table).await?;
        let fraction = violation_fraction(violations, total);
        let bounds = resolve_bounds(
            run,
            self.kind(),
            self.bounds.as_ref(),
            &MatchFields::new()
                .table(&self.main_table)
                .column(&self.main_column),
        )?;
        self.builder()
            .violation(fraction, bounds)
            .message(format!(
                "Found {violations} foreign key violations in {}.{} referencing {}.{}. \
                 Total rows in {}: {total} ({:.2}% violating). Sample violating values: {samples}",
                self.main_table,
                self.main_column,
                self.reference_table,
                self.reference_column,
                self.main_table,
                fraction * 100.0
            ))
            .record(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::DataFusionStore;
    use crate::test_helpers::{int_column, register_columns, RecordingStore};

    fn store() -> DataFusionStore {
        let store = DataFusionStore::new();
        register_columns(
            &store,
            "person",
            vec![int_column("person_id", vec![Some(1), Some(2), Some(3)])],
        );
        register_columns(
            &store,
            "visit_occurrence",
            vec![
                int_column("visit_occurrence_id", (1..=10).map(Some).collect()),
                int_column(
                    "person_id",
                    vec![Some(1), Some(2), Some(3), Some(1), None, Some(9), Some(8), Some(9), Some(2), Some(3)],
                ),
            ],
        );
        store
    }

    fn check() -> ForeignKeyCheck {
        ForeignKeyCheck::new("visit_occurrence", "person_id", "person", "person_id")
    }

    #[tokio::test]
    async fn test_unmatched_values() {
        let store = store();
        let mut run = RunContext::default();
        let result = check()
            .with_bounds(SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.3)]).unwrap())
            .execute(&store, &mut run)
            .await
            .unwrap();

        // 9, 8, 9 are unmatched; the NULL is not a violation
        assert_eq!(result.violation_fraction(), Some(0.3));
        assert_eq!(result.status(), CheckStatus::Warn);
        assert_eq!(
            result.extra_value("reference_table"),
            Some(&serde_json::json!("person"))
        );
        let message = result.message().unwrap();
        assert!(message.contains("Found 3 foreign key violations"));
        assert!(message.contains("Sample violating values: 8, 9"), "{message}");
    }

    #[tokio::test]
    async fn test_all_matched_passes() {
        let store = store();
        let mut run = RunContext::default();
        let result = ForeignKeyCheck::new("person", "person_id", "person", "person_id")
            .execute(&store, &mut run)
            .await
            .unwrap();
        assert_eq!(result.status(), CheckStatus::Pass);
        assert_eq!(result.violation_fraction(), None);
    }

    #[tokio::test]
    async fn test_absent_main_table_stops_before_reference() {
        let store = RecordingStore::new(store());
        let mut run = RunContext::default();
        let result = ForeignKeyCheck::new("drug_exposure", "person_id", "person", "person_id")
            .execute(&store, &mut run)
            .await
            .unwrap();

        assert_eq!(result.status(), CheckStatus::Skipped);
        assert!(result.message().unwrap().contains("Main table drug_exposure"));
        assert_eq!(store.probed_tables(), vec!["drug_exposure"]);
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_pre_check_order() {
        let store = store();
        let mut run = RunContext::default();

        let missing_reference = ForeignKeyCheck::new("visit_occurrence", "care_site_id", "care_site", "care_site_id")
            .execute(&store, &mut run)
            .await
            .unwrap();
        assert!(missing_reference
            .message()
            .unwrap()
            .starts_with("Reference table care_site"));

        let missing_main_column = ForeignKeyCheck::new("visit_occurrence", "provider_id", "person", "provider_id")
            .execute(&store, &mut run)
            .await
            .unwrap();
        assert!(missing_main_column
            .message()
            .unwrap()
            .starts_with("Main column provider_id"));

        let missing_reference_column = ForeignKeyCheck::new("visit_occurrence", "person_id", "person", "id")
            .execute(&store, &mut run)
            .await
            .unwrap();
        assert!(missing_reference_column
            .message()
            .unwrap()
            .starts_with("Reference column id"));

        assert_eq!(run.ledger().skips().len(), 3);
    }

    #[test]
    fn test_from_definition() {
        let def = ForeignKeyDef {
            source_table: "visit_occurrence".to_string(),
            source_field: "person_id".to_string(),
            target_table: "person".to_string(),
            target_field: "person_id".to_string(),
        };
        let check = ForeignKeyCheck::from(&def);
        assert_eq!(check.main_table(), "visit_occurrence");
        assert_eq!(check.reference_table(), "person");
    }
}
