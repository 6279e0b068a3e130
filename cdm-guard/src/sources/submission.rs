use crate::error::{CdmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Dialect of the submission files, read from `[submission.csv]`.
///
/// ```toml
/// [submission]
/// file_extension = ".tsv"
///
/// [submission.csv]
/// delimiter = "\t"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    pub delimiter: char,
    /// Quote character (default: '"')
    pub quote: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
        }
    }
}

impl CsvOptions {
    /// Tab-separated files.
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte("delimiter", self.delimiter)
    }

    pub fn quote_byte(&self) -> Result<u8> {
        single_byte("quote", self.quote)
    }

    /// Fails unless both characters are single-byte and distinct.
    pub fn validate(&self) -> Result<()> {
        if self.delimiter_byte()? == self.quote_byte()? {
            return Err(CdmError::Configuration(format!(
                "csv delimiter and quote must differ, both are {:?}",
                self.delimiter
            )));
        }
        Ok(())
    }
}

fn single_byte(name: &str, c: char) -> Result<u8> {
    if c.is_ascii() && c != '\n' && c != '\r' {
        Ok(c as u8)
    } else {
        Err(CdmError::Configuration(format!(
            "csv {name} must be a single ASCII character other than a line break, got {c:?}"
        )))
    }
}

/// A directory of per-table data files submitted for validation.
///
/// Every table maps to the file `<table><file_extension>` directly inside the
/// directory; subdirectories are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDir {
    dir: PathBuf,
    file_extension: String,
    csv: CsvOptions,
}

impl SubmissionDir {
    /// Creates a submission over `dir` with the conventional `.csv` extension.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, ".csv")
    }

    /// Creates a submission with a custom file extension (`csv` and `.csv` are equivalent).
    pub fn with_extension(dir: impl Into<PathBuf>, file_extension: &str) -> Self {
        let file_extension = if file_extension.starts_with('.') {
            file_extension.to_string()
        } else {
            format!(".{file_extension}")
        };
        Self {
            dir: dir.into(),
            file_extension,
            csv: CsvOptions::default(),
        }
    }

    pub fn with_csv_options(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn csv_options(&self) -> &CsvOptions {
        &self.csv
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// Names of the files in the directory carrying the submission extension.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn list_files(&self) -> Result<BTreeSet<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CdmError::data_source(
                "submission",
                format!("cannot read directory {}: {e}", self.dir.display()),
            )
        })?;

        let mut files = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(&self.file_extension) && name.len() > self.file_extension.len() {
                files.insert(name);
            }
        }
        debug!(count = files.len(), "listed submission files");
        Ok(files)
    }

    /// Table names derived from the submitted file names.
    pub fn table_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter_map(|f| f.strip_suffix(&self.file_extension).map(str::to_string))
            .collect())
    }

    /// The conventional file name of a table.
    pub fn file_name(&self, table: &str) -> String {
        format!("{table}{}", self.file_extension)
    }

    pub fn file_path(&self, table: &str) -> PathBuf {
        self.dir.join(self.file_name(table))
    }

    pub fn has_file(&self, table: &str) -> bool {
        self.file_path(table).is_file()
    }

    /// Reads the header row of a table's file, lower-casing every column name.
    ///
    /// Order and duplicates are preserved so header-shape checks can see them.
    pub fn read_header(&self, table: &str) -> Result<Vec<String>> {
        let path = self.file_path(table);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.csv.delimiter_byte()?)
            .quote(self.csv.quote_byte()?)
            .from_path(&path)?;

        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(CdmError::data_source(
                "submission",
                format!("{} is empty", path.display()),
            ));
        }
        Ok(record
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect())
    }
}
