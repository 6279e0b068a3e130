//! DataFusion-backed [`QueryStore`].

use super::{QueryStore, NULL_DISPLAY};
use crate::error::{CdmError, Result};
use arrow::array::{Array, Int64Array, UInt64Array};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use async_trait::async_trait;
use datafusion::common::TableReference;
use datafusion::datasource::TableProvider;
use datafusion::execution::context::{SessionConfig, SessionContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Configuration for creating a [`DataFusionStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
        }
    }
}

/// A queryable store over a DataFusion [`SessionContext`].
///
/// Tables are registered under their exact (case-sensitive) names and every
/// identifier in generated statements is quoted.
///
/// # Examples
///
/// ```rust,no_run
/// use cdm_guard::sources::{DataFusionStore, QueryStore};
///
/// # async fn example() -> cdm_guard::error::Result<()> {
/// let store = DataFusionStore::new();
/// store
///     .inner()
///     .register_csv("person", "data/person.csv", Default::default())
///     .await?;
/// let rows = store.row_count("person").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionStore {
    inner: SessionContext,
    config: StoreConfig,
}

impl DataFusionStore {
    /// Creates a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        Self {
            inner: SessionContext::new_with_config(session_config),
            config,
        }
    }

    /// Returns the underlying DataFusion context.
    pub fn inner(&self) -> &SessionContext {
        &self.inner
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Registers an arbitrary table provider under an exact name.
    pub fn register_table(&self, name: &str, provider: Arc<dyn TableProvider>) -> Result<()> {
        self.inner
            .register_table(TableReference::bare(name), provider)?;
        Ok(())
    }

    /// Removes a table; missing tables are ignored.
    pub fn deregister_table(&self, name: &str) -> Result<()> {
        self.inner.deregister_table(TableReference::bare(name))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn collect(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        debug!("Executing query");
        let df = self
            .inner
            .sql(sql)
            .await
            .map_err(|e| CdmError::query_failed("store", format!("{e}; statement: {sql}")))?;
        df.collect()
            .await
            .map_err(|e| CdmError::query_failed("store", format!("{e}; statement: {sql}")))
    }
}

impl Default for DataFusionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataFusionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionStore")
            .field("session_id", &self.inner.session_id())
            .field("config", &self.config)
            .finish()
    }
}

fn integer_cell(column: &dyn Array) -> Result<u64> {
    if column.is_null(0) {
        return Ok(0);
    }
    if let Some(values) = column.as_any().downcast_ref::<Int64Array>() {
        return u64::try_from(values.value(0))
            .map_err(|_| CdmError::query_failed("query_counts", "negative count returned"));
    }
    if let Some(values) = column.as_any().downcast_ref::<UInt64Array>() {
        return Ok(values.value(0));
    }
    Err(CdmError::query_failed(
        "query_counts",
        format!("expected an integer column, found {}", column.data_type()),
    ))
}

#[async_trait]
impl QueryStore for DataFusionStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.inner.table_exist(TableReference::bare(table))?)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        if !self.table_exists(table).await? {
            return Ok(false);
        }
        let provider = self.inner.table_provider(TableReference::bare(table)).await?;
        Ok(provider.schema().column_with_name(column).is_some())
    }

    async fn query_counts(&self, sql: &str) -> Result<Vec<u64>> {
        let batches = self.collect(sql).await?;
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| CdmError::query_failed("query_counts", "query returned no rows"))?;
        batch
            .columns()
            .iter()
            .map(|column| integer_cell(column.as_ref()))
            .collect()
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        let batches = self.collect(sql).await?;
        let mut rows = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let cells = batch
                    .columns()
                    .iter()
                    .map(|column| {
                        if column.is_null(row) {
                            Ok(NULL_DISPLAY.to_string())
                        } else {
                            Ok(array_value_to_string(column.as_ref(), row)?)
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                rows.push(cells);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{int_column, register_columns, str_column};

    fn store_with_person() -> DataFusionStore {
        let store = DataFusionStore::new();
        register_columns(
            &store,
            "person",
            vec![
                int_column("person_id", vec![Some(1), Some(2), Some(3)]),
                str_column("gender_source_value", vec![Some("F"), None, Some("M")]),
            ],
        );
        store
    }

    #[tokio::test]
    async fn test_existence() {
        let store = store_with_person();
        assert!(store.table_exists("person").await.unwrap());
        assert!(!store.table_exists("visit_occurrence").await.unwrap());
        assert!(store.column_exists("person", "person_id").await.unwrap());
        assert!(!store.column_exists("person", "care_site_id").await.unwrap());
        assert!(!store.column_exists("visit_occurrence", "person_id").await.unwrap());
    }

    #[tokio::test]
    async fn test_case_sensitive_names() {
        let store = store_with_person();
        assert!(!store.table_exists("Person").await.unwrap());
        assert!(!store.column_exists("person", "PERSON_ID").await.unwrap());
    }

    #[tokio::test]
    async fn test_counts() {
        let store = store_with_person();
        assert_eq!(store.row_count("person").await.unwrap(), 3);
        let counts = store
            .query_counts(
                "SELECT COUNT(*), COUNT(\"gender_source_value\") FROM \"person\"",
            )
            .await
            .unwrap();
        assert_eq!(counts, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_rows_render_nulls() {
        let store = store_with_person();
        let rows = store
            .query_rows(
                "SELECT \"person_id\", \"gender_source_value\" FROM \"person\" ORDER BY \"person_id\"",
            )
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["1".to_string(), "F".to_string()],
                vec!["2".to_string(), NULL_DISPLAY.to_string()],
                vec!["3".to_string(), "M".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_statement_is_query_failure() {
        let store = store_with_person();
        let err = store
            .query_counts("SELECT COUNT(*) FROM \"no_such_table\"")
            .await
            .unwrap_err();
        assert!(matches!(err, CdmError::QueryFailed { .. }));
    }

    #[tokio::test]
    async fn test_deregister() {
        let store = store_with_person();
        store.deregister_table("person").unwrap();
        assert!(!store.table_exists("person").await.unwrap());
    }
}
