//! SQL identifier quoting.
//!
//! Table and column names come from the data model and from submission file
//! headers, so they are never spliced into SQL unquoted.

use crate::error::{CdmError, Result};

/// Maximum accepted identifier length.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier (table name, column name).
    ///
    /// The identifier is wrapped in double quotes and any embedded double quote
    /// is doubled, so the result always denotes exactly one identifier with the
    /// original, case-sensitive spelling.
    ///
    /// # Examples
    /// ```rust
    /// use cdm_guard::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("person_id").unwrap(), "\"person_id\"");
    /// assert_eq!(
    ///     SqlSecurity::quote_identifier("id\"; DROP TABLE person--").unwrap(),
    ///     "\"id\"\"; DROP TABLE person--\""
    /// );
    /// assert!(SqlSecurity::quote_identifier("").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates an identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(CdmError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(CdmError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(CdmError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Quotes every identifier and joins them with `", "`.
    pub fn quote_list<S: AsRef<str>>(identifiers: &[S]) -> Result<String> {
        let quoted = identifiers
            .iter()
            .map(|i| Self::quote_identifier(i.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }
}
