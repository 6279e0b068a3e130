//! Property-based tests for threshold resolution and severity grading.
//!
//! ## Test Categories
//!
//! ### 1. Severity bounds
//! - Classification is inclusive at every bound
//! - A fraction above every bound is always FAIL
//! - Bound order in the input never changes the outcome
//!
//! ### 2. Threshold resolution
//! - The last matching rule wins, whatever precedes it
//! - Unmatched lookups use the caller's default
//!
//! ### 3. Run accounting
//! - Summary totals always equal the sum of the per-status counts

use cdm_guard::core::{CheckKind, CheckResult, CheckStatus, RunContext, SeverityBounds};
use cdm_guard::thresholds::{MatchFields, ThresholdResolver, ThresholdRule};
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = CheckStatus> {
    prop_oneof![
        Just(CheckStatus::Pass),
        Just(CheckStatus::Warn),
        Just(CheckStatus::Fail),
        Just(CheckStatus::Skipped),
    ]
}

fn thresholded_kind() -> impl Strategy<Value = CheckKind> {
    prop_oneof![
        Just(CheckKind::NotNull),
        Just(CheckKind::Distinct),
        Just(CheckKind::ForeignKey),
    ]
}

proptest! {
    #[test]
    fn prop_classification_is_inclusive(pass in 0.0f64..0.5, width in 0.0f64..0.5) {
        let warn = pass + width;
        let bounds = SeverityBounds::new([(CheckStatus::Pass, pass), (CheckStatus::Warn, warn)]).unwrap();
        prop_assert_eq!(bounds.classify(pass), CheckStatus::Pass);
        prop_assert_eq!(bounds.classify(warn), if width == 0.0 { CheckStatus::Pass } else { CheckStatus::Warn });
        prop_assert_eq!(bounds.classify(0.0), CheckStatus::Pass);
    }

    #[test]
    fn prop_above_every_bound_fails(pass in 0.0f64..0.4, warn in 0.4f64..0.9, excess in 1e-6f64..0.1) {
        let bounds = SeverityBounds::new([(CheckStatus::Pass, pass), (CheckStatus::Warn, warn)]).unwrap();
        prop_assert_eq!(bounds.classify(warn + excess), CheckStatus::Fail);
    }

    #[test]
    fn prop_input_order_is_irrelevant(pass in 0.0f64..0.5, warn in 0.5f64..1.0, fraction in 0.0f64..=1.0) {
        let ascending = SeverityBounds::new([(CheckStatus::Pass, pass), (CheckStatus::Warn, warn)]).unwrap();
        let descending = SeverityBounds::new([(CheckStatus::Warn, warn), (CheckStatus::Pass, pass)]).unwrap();
        prop_assert_eq!(ascending.classify(fraction), descending.classify(fraction));
    }

    #[test]
    fn prop_last_matching_rule_wins(
        kind in thresholded_kind(),
        leading in proptest::collection::vec(0.0f64..=1.0, 0..5),
        winner in 0.0f64..=1.0,
    ) {
        let mut rules = leading
            .iter()
            .map(|bound| ThresholdRule::new(SeverityBounds::new([(CheckStatus::Pass, *bound)]).unwrap()))
            .collect::<Vec<_>>();
        rules.push(ThresholdRule::new(SeverityBounds::new([(CheckStatus::Warn, winner)]).unwrap()));
        // a later rule for another table never displaces the winner
        rules.push(
            ThresholdRule::new(SeverityBounds::strict())
                .with_table_pattern("death")
                .unwrap(),
        );
        let resolver = ThresholdResolver::empty().with_rules(kind, rules).unwrap();

        let bounds = resolver
            .resolve_or_strict(kind, &MatchFields::new().table("person").column("person_id"))
            .unwrap();
        prop_assert_eq!(bounds.bound(CheckStatus::Warn), Some(winner));
        prop_assert_eq!(bounds.bound(CheckStatus::Pass), None);
    }

    #[test]
    fn prop_unmatched_lookup_uses_default(kind in thresholded_kind(), default in 0.0f64..=1.0) {
        let resolver = ThresholdResolver::empty()
            .with_rules(
                kind,
                vec![ThresholdRule::new(SeverityBounds::strict())
                    .with_table_pattern("visit_*")
                    .unwrap()],
            )
            .unwrap();
        let fallback = SeverityBounds::new([(CheckStatus::Warn, default)]).unwrap();
        let bounds = resolver
            .resolve(kind, &MatchFields::new().table("person"), &fallback)
            .unwrap();
        prop_assert_eq!(bounds, fallback);
    }

    #[test]
    fn prop_summary_totals(statuses in proptest::collection::vec(status_strategy(), 0..40)) {
        let mut run = RunContext::default();
        for status in &statuses {
            CheckResult::builder(CheckKind::ForeignKey)
                .status(*status)
                .table("visit_occurrence")
                .record(&mut run)
                .unwrap();
        }
        let summary = run.summary();
        prop_assert_eq!(summary.total_checks, statuses.len());
        prop_assert_eq!(
            summary.total_checks,
            summary.pass_count + summary.warn_count + summary.fail_count + summary.skipped_count
        );
        let fails = statuses.iter().filter(|s| **s == CheckStatus::Fail).count();
        prop_assert_eq!(summary.fail_count, fails);
        prop_assert_eq!(summary.failures.len(), fails);
    }
}

#[test]
fn test_warn_boundary() {
    let bounds = SeverityBounds::from_labels([("PASS", 0.0), ("WARN", 0.05)]).unwrap();
    assert_eq!(bounds.classify(0.0), CheckStatus::Pass);
    assert_eq!(bounds.classify(0.05), CheckStatus::Warn);
    assert_eq!(bounds.classify(0.050_000_01), CheckStatus::Fail);
}

#[test]
fn test_empty_resolver_rejects_lookups() {
    let resolver = ThresholdResolver::empty();
    assert!(resolver
        .resolve_or_strict(CheckKind::NotNull, &MatchFields::new())
        .is_err());
}
