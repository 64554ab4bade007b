//! # Property-Based Tests
//!
//! Invariants checked with proptest: search construction determinism, literal
//! matching of contains-searches, correlation uniqueness, effectivity bounds
//! and paging.

use metagraph_core::matcher::PropertyMatcher;
use metagraph_core::search::{by_property_contains, by_property_exact};
use metagraph_core::{
    CorrelationLedger, CorrelationRequest, EffectivityWindow, ElementProperties, ErrorKind,
    ExternalIdentifierProperties, ExternalScope, Guid, Paging, Timestamp,
};
use proptest::collection::vec;
use proptest::prelude::*;

fn window() -> impl Strategy<Value = EffectivityWindow> {
    (
        proptest::option::of(0i64..1_000),
        proptest::option::of(0i64..1_000),
    )
        .prop_filter("non-empty window", |(from, to)| match (from, to) {
            (Some(f), Some(t)) => f < t,
            _ => true,
        })
        .prop_map(|(from, to)| EffectivityWindow::new(from.map(Timestamp), to.map(Timestamp)))
}

fn request(scope: Guid, element: Guid, effectivity: EffectivityWindow) -> CorrelationRequest {
    CorrelationRequest {
        scope: ExternalScope::new(scope),
        element_guid: element,
        element_type_name: "Asset".to_string(),
        properties: ExternalIdentifierProperties::new("ext"),
        effectivity,
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Independently built descriptors for the same input are equal.
    #[test]
    fn search_construction_is_deterministic(
        names in vec("[a-zA-Z]{1,12}", 1..5),
        value in ".{0,40}"
    ) {
        let first = by_property_exact(names.iter().cloned(), value.as_str());
        let second = by_property_exact(names.iter().cloned(), value.as_str());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.conditions.len(), names.len());

        let first = by_property_contains(names.iter().cloned(), &value);
        let second = by_property_contains(names.iter().cloned(), &value);
        prop_assert_eq!(first, second);
    }

    /// Contains-search treats the needle literally, metacharacters included.
    #[test]
    fn contains_matches_literal_text(
        prefix in "[a-z]{0,8}",
        needle in "[a-z.*+?()\\[\\]{}|^$\\\\]{1,8}",
        suffix in "[a-z]{0,8}"
    ) {
        let matcher = PropertyMatcher::compile(&by_property_contains(["name"], &needle))
            .expect("escaped pattern compiles");
        let haystack = format!("{prefix}{needle}{suffix}");
        prop_assert!(matcher.matches(&ElementProperties::new().with("name", haystack)));
    }

    /// A contains-search never matches text lacking the needle.
    #[test]
    fn contains_rejects_absent_text(
        text in "[a-z]{0,16}",
        needle in "[.*+?]{1,4}"
    ) {
        let matcher = PropertyMatcher::compile(&by_property_contains(["name"], &needle))
            .expect("escaped pattern compiles");
        prop_assert!(!matcher.matches(&ElementProperties::new().with("name", text)));
    }

    /// A second mapping of the same key onto another element succeeds iff
    /// the two windows do not overlap.
    #[test]
    fn correlation_uniqueness(first in window(), second in window()) {
        let scope = Guid::new_v4();
        let mut ledger = CorrelationLedger::new();
        ledger
            .add(request(scope, Guid::new_v4(), first), "u", Timestamp(0))
            .expect("first mapping");

        let outcome = ledger.add(request(scope, Guid::new_v4(), second), "u", Timestamp(0));
        if first.overlaps(&second) {
            let err = outcome.expect_err("overlap must be rejected");
            prop_assert_eq!(err.kind(), ErrorKind::InvalidParameter);
            prop_assert_eq!(ledger.len(), 1);
        } else {
            prop_assert!(outcome.is_ok());
            prop_assert_eq!(ledger.len(), 2);
        }
    }

    /// Effectivity is `[from, to)`.
    #[test]
    fn effectivity_is_half_open(w in window(), t in -10i64..1_010) {
        let inside_from = w.from.is_none_or(|from| from.0 <= t);
        let inside_to = w.to.is_none_or(|to| t < to.0);
        prop_assert_eq!(w.is_effective_at(Some(Timestamp(t))), inside_from && inside_to);
        prop_assert!(w.is_effective_at(None));
    }

    /// Walking pages in order visits every item exactly once.
    #[test]
    fn pages_partition_results(len in 0usize..60, page_size in 1usize..10) {
        let items: Vec<usize> = (0..len).collect();
        let mut seen = Vec::new();
        let mut start = 0;
        loop {
            let page = Paging::new(start, page_size).apply(items.clone());
            if page.is_empty() {
                break;
            }
            start += page.len();
            seen.extend(page);
        }
        prop_assert_eq!(seen, items);
    }
}
