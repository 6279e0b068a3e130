//! Header-shape checks on one submission file.

use crate::core::{CheckKind, CheckResult, CheckStatus, RunContext};
use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

/// Names appearing more than once in a header.
pub fn duplicated_columns(header: &[String]) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in header {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// The three header checks for one table's file. Only the header is read;
/// no check here consults thresholds.
#[derive(Debug, Clone)]
pub struct HeaderChecks<'a> {
    table: &'a str,
    file_name: String,
    header: &'a [String],
}

impl<'a> HeaderChecks<'a> {
    pub fn new(table: &'a str, file_name: impl Into<String>, header: &'a [String]) -> Self {
        Self {
            table,
            file_name: file_name.into(),
            header,
        }
    }

    fn builder(&self, kind: CheckKind) -> crate::core::CheckResultBuilder {
        CheckResult::builder(kind)
            .table(self.table)
            .file(self.file_name.clone())
    }

    /// FAIL when a column name repeats; such a file is never loaded.
    #[instrument(skip(self, run), fields(table = self.table))]
    pub fn check_duplicates(&self, run: &mut RunContext) -> Result<CheckResult> {
        let duplicated = duplicated_columns(self.header);
        let builder = self.builder(CheckKind::HeaderDuplication);
        if duplicated.is_empty() {
            return builder.status(CheckStatus::Pass).record(run);
        }
        builder
            .status(CheckStatus::Fail)
            .columns(duplicated)
            .message(
                "The file will not be loaded. Please remove duplicated column(s) in file.",
            )
            .record(run)
    }

    /// WARN when the header has columns the data model does not declare.
    #[instrument(skip(self, run, schema_columns), fields(table = self.table))]
    pub fn check_extra(&self, run: &mut RunContext, schema_columns: &[&str]) -> Result<CheckResult> {
        let declared = schema_columns.iter().copied().collect::<BTreeSet<_>>();
        let extra = self
            .header
            .iter()
            .filter(|c| !declared.contains(c.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>();
        let builder = self.builder(CheckKind::ExtraHeaderColumn);
        if extra.is_empty() {
            return builder.status(CheckStatus::Pass).record(run);
        }
        builder
            .status(CheckStatus::Warn)
            .columns(extra)
            .message("Extra column(s) are loaded but not validated.")
            .record(run)
    }

    /// FAIL when declared columns are absent from the header.
    #[instrument(skip(self, run, schema_columns), fields(table = self.table))]
    pub fn check_missing(
        &self,
        run: &mut RunContext,
        schema_columns: &[&str],
    ) -> Result<CheckResult> {
        let present = self.header.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let missing = schema_columns
            .iter()
            .filter(|c| !present.contains(*c))
            .map(|c| c.to_string())
            .collect::<BTreeSet<_>>();
        let builder = self.builder(CheckKind::MissingHeaderColumn);
        if missing.is_empty() {
            return builder.status(CheckStatus::Pass).record(run);
        }
        builder
            .status(CheckStatus::Fail)
            .columns(missing)
            .message("Checks on the missing column(s) will be skipped.")
            .record(run)
    }
}
