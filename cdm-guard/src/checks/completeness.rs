//! Submission file completeness.

use crate::core::{CheckKind, CheckResult, CheckStatus, RunContext};
use crate::error::Result;
use crate::sources::SubmissionDir;
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Expected tables with no submitted file, ignoring optional tables.
pub fn missing_tables(
    expected: &BTreeSet<String>,
    present: &BTreeSet<String>,
    optional: &BTreeSet<String>,
) -> BTreeSet<String> {
    expected
        .iter()
        .filter(|t| !present.contains(*t) && !optional.contains(*t))
        .cloned()
        .collect()
}

/// Submitted files that do not correspond to any expected file name.
pub fn extra_files(present: &BTreeSet<String>, expected: &BTreeSet<String>) -> BTreeSet<String> {
    present.difference(expected).cloned().collect()
}

/// Checks a submission directory for missing and surplus files.
///
/// Both checks have fixed severities: a missing file fails, a surplus file
/// only warns because it is never loaded.
#[derive(Debug, Clone, Copy)]
pub struct FileCompleteness<'a> {
    submission: &'a SubmissionDir,
}

impl<'a> FileCompleteness<'a> {
    pub fn new(submission: &'a SubmissionDir) -> Self {
        Self { submission }
    }

    /// Records FAIL naming every expected, non-optional table without a file.
    #[instrument(skip_all, fields(check = "missing_submission_file"))]
    pub fn check_missing(
        &self,
        run: &mut RunContext,
        expected: &BTreeSet<String>,
        optional: &BTreeSet<String>,
    ) -> Result<CheckResult> {
        info!(
            dir = %self.submission.dir().display(),
            expected = expected.len(),
            "checking for missing submission files"
        );
        let present = self.submission.table_names()?;
        let missing = missing_tables(expected, &present, optional);

        let builder = CheckResult::builder(CheckKind::MissingSubmissionFile);
        if missing.is_empty() {
            return builder.status(CheckStatus::Pass).record(run);
        }
        builder
            .status(CheckStatus::Fail)
            .tables(missing)
            .message(format!(
                "Cannot find submission file(s) for above table(s) in dir: {}",
                self.submission.dir().display()
            ))
            .record(run)
    }

    /// Records WARN naming every file that maps to none of the expected tables.
    #[instrument(skip_all, fields(check = "extra_submission_file"))]
    pub fn check_extra(
        &self,
        run: &mut RunContext,
        expected: &BTreeSet<String>,
    ) -> Result<CheckResult> {
        let present = self.submission.list_files()?;
        let expected_files = expected
            .iter()
            .map(|t| self.submission.file_name(t))
            .collect::<BTreeSet<_>>();
        let extra = extra_files(&present, &expected_files);

        let builder = CheckResult::builder(CheckKind::ExtraSubmissionFile);
        if extra.is_empty() {
            return builder.status(CheckStatus::Pass).record(run);
        }
        builder
            .status(CheckStatus::Warn)
            .files(extra)
            .message(
                "Extra file(s) in directory. These files will not be loaded. \
                 Please make sure there is no configuration issue.",
            )
            .record(run)
    }
}
