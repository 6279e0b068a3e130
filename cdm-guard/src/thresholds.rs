//! Threshold resolution for thresholded checks.
//!
//! Each thresholded [`CheckKind`] owns an ordered list of [`ThresholdRule`]s.
//! Resolution scans the whole list and keeps the *last* matching rule, so a
//! later rule overrides an earlier one entirely (bounds are never merged).
//! By convention the final rule of a list is fully wildcarded and acts as the
//! default for that kind.
//!
//! ```rust
//! use cdm_guard::core::{CheckKind, SeverityBounds};
//! use cdm_guard::thresholds::{MatchFields, ThresholdResolver, ThresholdRule};
//!
//! # fn example() -> cdm_guard::error::Result<()> {
//! let resolver = ThresholdResolver::empty().with_rules(
//!     CheckKind::ForeignKey,
//!     vec![
//!         ThresholdRule::new(SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.05)])?),
//!         ThresholdRule::new(SeverityBounds::from_labels([("PASS", 0.01)])?)
//!             .with_table_pattern("person")?,
//!     ],
//! )?;
//!
//! let bounds = resolver.resolve_or_strict(
//!     CheckKind::ForeignKey,
//!     &MatchFields::new().table("person").column("person_id"),
//! )?;
//! assert_eq!(bounds.bound(cdm_guard::core::CheckStatus::Pass), Some(0.01));
//! # Ok(())
//! # }
//! ```

use crate::core::{CheckKind, SeverityBounds};
use crate::error::{CdmError, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The named dimensions a threshold lookup is matched on.
///
/// A dimension left unset imposes no constraint on any rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFields<'a> {
    table: Option<&'a str>,
    column: Option<&'a str>,
}

impl<'a> MatchFields<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn column(mut self, column: &'a str) -> Self {
        self.column = Some(column);
        self
    }
}

/// One threshold rule: optional table/column glob patterns plus the bounds
/// adopted when the rule matches. An absent pattern behaves as `*`.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    table: Option<Pattern>,
    column: Option<Pattern>,
    bounds: SeverityBounds,
}

impl ThresholdRule {
    /// Creates a fully wildcarded rule.
    pub fn new(bounds: SeverityBounds) -> Self {
        Self {
            table: None,
            column: None,
            bounds,
        }
    }

    pub fn with_table_pattern(mut self, pattern: &str) -> Result<Self> {
        self.table = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn with_column_pattern(mut self, pattern: &str) -> Result<Self> {
        self.column = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn bounds(&self) -> &SeverityBounds {
        &self.bounds
    }

    /// True when neither dimension is constrained.
    pub fn is_wildcard(&self) -> bool {
        let open = |p: &Option<Pattern>| p.as_ref().is_none_or(|p| p.as_str() == "*");
        open(&self.table) && open(&self.column)
    }

    /// Every field supplied in the query must glob-match the rule's pattern
    /// for that field; fields the rule leaves open always match.
    pub fn matches(&self, fields: &MatchFields<'_>) -> bool {
        let dimension = |pattern: &Option<Pattern>, value: Option<&str>| match (pattern, value) {
            (Some(pattern), Some(value)) => pattern.matches(value),
            _ => true,
        };
        dimension(&self.table, fields.table) && dimension(&self.column, fields.column)
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| {
        CdmError::Configuration(format!("invalid threshold pattern '{pattern}': {e}"))
    })
}

/// Serialized form of a [`ThresholdRule`], as written in the run configuration.
///
/// Bounds stay as raw label/fraction pairs until conversion so that label and
/// range errors surface as their own error kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub bounds: BTreeMap<String, f64>,
}

impl TryFrom<&ThresholdRuleConfig> for ThresholdRule {
    type Error = CdmError;

    fn try_from(config: &ThresholdRuleConfig) -> Result<Self> {
        let bounds = SeverityBounds::from_labels(config.bounds.iter().map(|(l, b)| (l, *b)))?;
        let mut rule = ThresholdRule::new(bounds);
        if let Some(table) = &config.table {
            rule = rule.with_table_pattern(table)?;
        }
        if let Some(column) = &config.column {
            rule = rule.with_column_pattern(column)?;
        }
        Ok(rule)
    }
}

/// Resolves severity bounds for a (check kind, table, column) triple.
#[derive(Debug, Clone)]
pub struct ThresholdResolver {
    rules: BTreeMap<CheckKind, Vec<ThresholdRule>>,
}

impl ThresholdResolver {
    /// A resolver with no registered kinds; every lookup fails until rules are added.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Builds a resolver from the `[thresholds]` section of a run configuration.
    ///
    /// Kinds absent from the configuration keep the zero-tolerance default.
    pub fn from_config(config: &BTreeMap<String, Vec<ThresholdRuleConfig>>) -> Result<Self> {
        let mut resolver = Self::default();
        for (name, rules) in config {
            let kind: CheckKind = name.parse()?;
            let rules = rules
                .iter()
                .map(ThresholdRule::try_from)
                .collect::<Result<Vec<_>>>()?;
            resolver = resolver.with_rules(kind, rules)?;
        }
        Ok(resolver)
    }

    /// Replaces the rule list for a kind.
    pub fn with_rules(mut self, kind: CheckKind, rules: Vec<ThresholdRule>) -> Result<Self> {
        if !kind.uses_thresholds() {
            return Err(CdmError::Configuration(format!(
                "check kind '{kind}' has a fixed severity and takes no threshold rules"
            )));
        }
        match rules.last() {
            None => {
                return Err(CdmError::Configuration(format!(
                    "threshold rule list for '{kind}' must not be empty"
                )))
            }
            Some(last) if !last.is_wildcard() => warn!(
                check = %kind,
                "last threshold rule is not fully wildcarded; unmatched lookups use the fallback"
            ),
            Some(_) => {}
        }
        self.rules.insert(kind, rules);
        Ok(self)
    }

    /// Returns the bounds of the last matching rule, or `default` when no rule matches.
    pub fn resolve(
        &self,
        kind: CheckKind,
        fields: &MatchFields<'_>,
        default: &SeverityBounds,
    ) -> Result<SeverityBounds> {
        let rules = self
            .rules
            .get(&kind)
            .ok_or_else(|| CdmError::UnknownCheckKind(kind.as_str().to_string()))?;

        let mut adopted = None;
        for rule in rules {
            if rule.matches(fields) {
                adopted = Some(&rule.bounds);
            }
        }

        let bounds = adopted.unwrap_or(default).clone();
        debug!(check = %kind, table = ?fields.table, column = ?fields.column, bounds = %bounds, "resolved threshold");
        Ok(bounds)
    }

    /// Resolves with the zero-tolerance fallback.
    pub fn resolve_or_strict(
        &self,
        kind: CheckKind,
        fields: &MatchFields<'_>,
    ) -> Result<SeverityBounds> {
        self.resolve(kind, fields, &SeverityBounds::strict())
    }
}

impl Default for ThresholdResolver {
    /// Every thresholded kind gets a single wildcard `{PASS: 0.0}` rule.
    fn default() -> Self {
        let rules = CheckKind::THRESHOLDED
            .into_iter()
            .map(|kind| (kind, vec![ThresholdRule::new(SeverityBounds::strict())]))
            .collect();
        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CheckStatus;

    fn bounds(pass: f64) -> SeverityBounds {
        SeverityBounds::new([(CheckStatus::Pass, pass)]).unwrap()
    }

    fn fk_resolver() -> ThresholdResolver {
        ThresholdResolver::empty()
            .with_rules(
                CheckKind::ForeignKey,
                vec![
                    ThresholdRule::new(bounds(0.05)),
                    ThresholdRule::new(bounds(0.01))
                        .with_table_pattern("person")
                        .unwrap()
                        .with_column_pattern("person_id")
                        .unwrap(),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_specific_rule_after_default_wins() {
        let resolver = fk_resolver();
        let fields = MatchFields::new().table("person").column("person_id");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::ForeignKey, &fields).unwrap(),
            bounds(0.01)
        );

        let other = MatchFields::new()
            .table("visit_occurrence_id")
            .column("some_other_column");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::ForeignKey, &other).unwrap(),
            bounds(0.05)
        );
    }

    #[test]
    fn test_later_general_rule_overrides_earlier_specific_rule() {
        let resolver = ThresholdResolver::empty()
            .with_rules(
                CheckKind::NotNull,
                vec![
                    ThresholdRule::new(bounds(0.2)).with_table_pattern("person").unwrap(),
                    ThresholdRule::new(bounds(0.3)),
                ],
            )
            .unwrap();
        let fields = MatchFields::new().table("person").column("year_of_birth");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::NotNull, &fields).unwrap(),
            bounds(0.3)
        );
    }

    #[test]
    fn test_glob_patterns() {
        let resolver = ThresholdResolver::empty()
            .with_rules(
                CheckKind::Distinct,
                vec![
                    ThresholdRule::new(bounds(0.0)),
                    ThresholdRule::new(bounds(0.1))
                        .with_column_pattern("*_source_value")
                        .unwrap(),
                ],
            )
            .unwrap();

        let source_value = MatchFields::new()
            .table("person")
            .column("gender_source_value");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::Distinct, &source_value).unwrap(),
            bounds(0.1)
        );
        let id = MatchFields::new().table("person").column("person_id");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::Distinct, &id).unwrap(),
            bounds(0.0)
        );
    }

    #[test]
    fn test_unset_field_imposes_no_constraint() {
        let resolver = fk_resolver();
        let table_only = MatchFields::new().table("person");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::ForeignKey, &table_only).unwrap(),
            bounds(0.01)
        );
    }

    #[test]
    fn test_no_match_uses_caller_default() {
        let resolver = ThresholdResolver::empty()
            .with_rules(
                CheckKind::ForeignKey,
                vec![ThresholdRule::new(bounds(0.2)).with_table_pattern("drug_*").unwrap()],
            )
            .unwrap();
        let fields = MatchFields::new().table("person");
        let default = bounds(0.5);
        assert_eq!(
            resolver.resolve(CheckKind::ForeignKey, &fields, &default).unwrap(),
            default
        );
    }

    #[test]
    fn test_unregistered_kind() {
        let resolver = ThresholdResolver::empty();
        let err = resolver
            .resolve_or_strict(CheckKind::NotNull, &MatchFields::new())
            .unwrap_err();
        assert!(matches!(err, CdmError::UnknownCheckKind(name) if name == "not_null_violation"));
    }

    #[test]
    fn test_rejects_empty_and_fixed_kinds() {
        assert!(ThresholdResolver::empty()
            .with_rules(CheckKind::NotNull, vec![])
            .is_err());
        assert!(ThresholdResolver::empty()
            .with_rules(
                CheckKind::MissingSubmissionFile,
                vec![ThresholdRule::new(bounds(0.0))]
            )
            .is_err());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = ThresholdRule::new(bounds(0.0))
            .with_table_pattern("[person")
            .unwrap_err();
        assert!(matches!(err, CdmError::Configuration(_)));
    }

    #[test]
    fn test_from_config() {
        let mut config = BTreeMap::new();
        config.insert(
            "foreign_key_violation".to_string(),
            vec![
                ThresholdRuleConfig {
                    table: None,
                    column: None,
                    bounds: BTreeMap::from([("PASS".to_string(), 0.05)]),
                },
                ThresholdRuleConfig {
                    table: Some("person".to_string()),
                    column: Some("person_id".to_string()),
                    bounds: BTreeMap::from([("PASS".to_string(), 0.01)]),
                },
            ],
        );
        let resolver = ThresholdResolver::from_config(&config).unwrap();
        let fields = MatchFields::new().table("person").column("person_id");
        assert_eq!(
            resolver.resolve_or_strict(CheckKind::ForeignKey, &fields).unwrap(),
            bounds(0.01)
        );
        // kinds missing from the configuration keep their default
        assert!(resolver.resolve_or_strict(CheckKind::NotNull, &fields).is_ok());

        config.insert("row_count".to_string(), vec![]);
        assert!(matches!(
            ThresholdResolver::from_config(&config),
            Err(CdmError::UnknownCheckKind(_))
        ));
    }
}
