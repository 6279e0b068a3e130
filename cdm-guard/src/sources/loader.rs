use super::{DataFusionStore, QueryStore, SubmissionDir};
use crate::error::{CdmError, Result};
use crate::model::DataModel;
use arrow::datatypes::{DataType, Field, Schema};
use datafusion::common::TableReference;
use datafusion::prelude::CsvReadOptions;
use tracing::{info, instrument};

/// Registers submission files as queryable tables.
///
/// A loaded table's schema follows the file header: columns declared in the
/// data model get their declared type and extra columns load as strings.
#[derive(Debug)]
pub struct TableLoader<'a> {
    store: &'a DataFusionStore,
    submission: &'a SubmissionDir,
    model: &'a DataModel,
}

impl<'a> TableLoader<'a> {
    pub fn new(
        store: &'a DataFusionStore,
        submission: &'a SubmissionDir,
        model: &'a DataModel,
    ) -> Self {
        Self {
            store,
            submission,
            model,
        }
    }

    /// Arrow schema for a table file with the given (lower-cased) header.
    pub fn schema_for(&self, table: &str, header: &[String]) -> Schema {
        let table_def = self.model.table(table);
        let fields = header
            .iter()
            .map(|name| {
                let data_type = table_def
                    .and_then(|t| t.field(name))
                    .map(|f| f.arrow_type())
                    .unwrap_or(DataType::Utf8);
                Field::new(name, data_type, true)
            })
            .collect::<Vec<_>>();
        Schema::new(fields)
    }

    /// Loads one table's file and returns its row count.
    ///
    /// An already registered table of the same name is replaced.
    #[instrument(skip(self))]
    pub async fn load(&self, table: &str) -> Result<u64> {
        if !self.model.has_table(table) {
            return Err(CdmError::Schema(format!(
                "Table '{table}' not found in the data model"
            )));
        }
        let path = self.submission.file_path(table);
        let path_str = path.to_str().ok_or_else(|| {
            CdmError::data_source(
                "submission",
                format!("path is not valid UTF-8: {}", path.display()),
            )
        })?;
        let header = self.submission.read_header(table)?;
        let schema = self.schema_for(table, &header);

        let csv = self.submission.csv_options();
        let options = CsvReadOptions::new()
            .has_header(true)
            .delimiter(csv.delimiter_byte()?)
            .quote(csv.quote_byte()?)
            .schema(&schema)
            .file_extension(self.submission.file_extension());

        self.store.deregister_table(table)?;
        self.store
            .inner()
            .register_csv(TableReference::bare(table), path_str, options)
            .await?;

        let rows = self.store.row_count(table).await?;
        info!(table, rows, "loaded submission table");
        Ok(rows)
    }
}
