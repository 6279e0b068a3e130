//! In-memory tables for executor and planner tests.

use crate::error::Result;
use crate::sources::{DataFusionStore, QueryStore};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A named, nullable column of test data.
pub struct TestColumn {
    field: Field,
    values: ArrayRef,
}

pub fn int_column(name: &str, values: Vec<Option<i64>>) -> TestColumn {
    TestColumn {
        field: Field::new(name, DataType::Int64, true),
        values: Arc::new(Int64Array::from(values)),
    }
}

pub fn str_column(name: &str, values: Vec<Option<&str>>) -> TestColumn {
    TestColumn {
        field: Field::new(name, DataType::Utf8, true),
        values: Arc::new(StringArray::from(values)),
    }
}

/// `n` integer values `0..n`, with `nulls` of them (from the start) set to NULL.
pub fn sequence_with_nulls(name: &str, n: i64, nulls: i64) -> TestColumn {
    int_column(
        name,
        (0..n).map(|i| if i < nulls { None } else { Some(i) }).collect(),
    )
}

/// Registers the columns as a single-batch in-memory table.
pub fn register_columns(store: &DataFusionStore, table: &str, columns: Vec<TestColumn>) {
    let (fields, arrays): (Vec<_>, Vec<_>) = columns.into_iter().map(|c| (c.field, c.values)).unzip();
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let provider = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    store.register_table(table, Arc::new(provider)).unwrap();
}

/// Wraps a store and records every statement and existence probe it receives.
#[derive(Debug)]
pub struct RecordingStore {
    inner: DataFusionStore,
    statements: Mutex<Vec<String>>,
    probes: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: DataFusionStore) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Statements executed through `query_counts` / `query_rows`.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Tables passed to `table_exists` / `column_exists`, in call order.
    pub fn probed_tables(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryStore for RecordingStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        self.probes.lock().unwrap().push(table.to_string());
        self.inner.table_exists(table).await
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        self.probes.lock().unwrap().push(table.to_string());
        self.inner.column_exists(table, column).await
    }

    async fn query_counts(&self, sql: &str) -> Result<Vec<u64>> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.inner.query_counts(sql).await
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.inner.query_rows(sql).await
    }
}
