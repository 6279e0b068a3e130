//! Data access for the check engine.
//!
//! - [`QueryStore`]: the narrow query interface every constraint executor runs
//!   against (existence tests, row counts and ad hoc aggregate statements)
//! - [`DataFusionStore`]: the DataFusion-backed implementation
//! - [`SubmissionDir`]: the directory of per-table files being validated
//! - [`TableLoader`]: registers submission files as queryable tables

use crate::error::{CdmError, Result};
use crate::security::SqlSecurity;
use async_trait::async_trait;
use std::fmt::Debug;

mod loader;
mod store;
mod submission;

pub use store::{DataFusionStore, StoreConfig};
pub use loader::TableLoader;
pub use submission::{CsvOptions, SubmissionDir};

/// Rendering of a NULL cell in row-set results.
pub const NULL_DISPLAY: &str = "NULL";

/// A queryable store the constraint executors run against.
///
/// Implementations are used as a single shared connection: one statement at a
/// time, no transactions. Any failure is returned as an error and is fatal for
/// the executor that issued the statement.
///
/// # Examples
///
/// ```rust,ignore
/// use cdm_guard::sources::{DataFusionStore, QueryStore};
///
/// # async fn example(store: &DataFusionStore) -> cdm_guard::error::Result<()> {
/// if store.table_exists("person").await? {
///     let rows = store.row_count("person").await?;
///     println!("person has {rows} rows");
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait QueryStore: Debug + Send + Sync {
    /// Whether a table with exactly this name is registered.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Whether the table exists and has a column with exactly this name.
    async fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.quote_identifier(table)?);
        self.query_count(&sql).await
    }

    /// Executes a statement and returns the integer cells of its first row.
    async fn query_counts(&self, sql: &str) -> Result<Vec<u64>>;

    /// Executes a statement returning one integer.
    async fn query_count(&self, sql: &str) -> Result<u64> {
        self.query_counts(sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CdmError::query_failed("query_count", "query returned no columns"))
    }

    /// Executes a statement and renders every cell of every row as a string.
    ///
    /// NULL cells render as [`NULL_DISPLAY`].
    async fn query_rows(&self, sql: &str) -> Result<Vec<Vec<String>>>;

    /// Quotes an identifier for use in statements issued to this store.
    fn quote_identifier(&self, identifier: &str) -> Result<String> {
        SqlSecurity::quote_identifier(identifier)
    }

    /// Quotes identifiers and joins them into a column list.
    fn quote_list(&self, identifiers: &[String]) -> Result<String> {
        SqlSecurity::quote_list(identifiers)
    }
}
