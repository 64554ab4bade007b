//! # Store Contract Tests
//!
//! End-to-end behaviour of `MetadataClient` over `MemoryStore`.
//!
//! ## Groups
//! - effectivity: right-exclusive windows, as-of reads
//! - correlation: uniqueness, idempotent confirmation, removal independence
//! - scenarios: create-then-find, classification exclusivity, anchored cascade
//! - lifecycle: status, effectivity, declassify, searches, typed views
//! - relationships: lookups, history, delete, restore
//! - duplicates and concurrency: flag threading, shared clients
//! - templates: sub-graph copy with placeholders
//! - failures: the three error kinds

use metagraph_core::search::by_property_exact;
use metagraph_core::{
    ClientConfig, CorrelationRequest, EffectivityWindow, ElementProperties, ElementStatus,
    ErrorKind, ExternalIdentifierProperties, ExternalScope, Guid, HistoryRequest, ManualClock,
    MemoryStore, MetadataClient, NewClassification, NewElement, Paging, QueryOptions,
    RelationshipEnd, Timestamp,
};
use std::sync::Arc;

const USER: &str = "garygeeke";

fn setup() -> (MetadataClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(Timestamp(10_000)));
    let store = MemoryStore::new().with_clock(clock.clone());
    let client =
        MetadataClient::new(Arc::new(store), ClientConfig::default()).with_clock(clock.clone());
    (client, clock)
}

fn named(type_name: &str, qualified_name: &str) -> NewElement {
    NewElement::new(type_name)
        .with_properties(ElementProperties::new().with("qualifiedName", qualified_name))
}

fn create(client: &MetadataClient, element: &NewElement) -> Guid {
    client
        .create_metadata_element_in_store(USER, element)
        .expect("create element")
}

fn get(client: &MetadataClient, guid: Guid, options: &QueryOptions) -> Option<ElementStatus> {
    client
        .get_metadata_element_by_guid(USER, guid, options)
        .expect("get element")
        .map(|e| e.status)
}

fn correlation(
    scope: Guid,
    identifier: &str,
    element: Guid,
    window: EffectivityWindow,
) -> CorrelationRequest {
    CorrelationRequest {
        scope: ExternalScope::new(scope).named("HR system"),
        element_guid: element,
        element_type_name: "Glossary".to_string(),
        properties: ExternalIdentifierProperties::new(identifier),
        effectivity: window,
    }
}

// =============================================================================
// EFFECTIVITY
// =============================================================================

mod effectivity {
    use super::*;

    #[test]
    fn window_end_is_exclusive() {
        let (client, _) = setup();
        let guid = create(
            &client,
            &named("Glossary", "G:1")
                .effective(EffectivityWindow::between(Timestamp(100), Timestamp(200))),
        );

        let at = |t: i64| QueryOptions::new().at(Some(Timestamp(t)));
        assert!(get(&client, guid, &at(99)).is_none());
        assert!(get(&client, guid, &at(100)).is_some());
        assert!(get(&client, guid, &at(199)).is_some());
        assert!(get(&client, guid, &at(200)).is_none());
        assert!(get(&client, guid, &QueryOptions::new()).is_some());
    }

    #[test]
    fn classification_window_is_independent() {
        let (client, _) = setup();
        let guid = create(&client, &named("Glossary", "G:1"));
        let mut classification = NewClassification::new("Confidentiality");
        classification.effectivity = EffectivityWindow::starting(Timestamp(500));
        client
            .classify_metadata_element_in_store(USER, guid, &classification, &QueryOptions::new())
            .expect("classify");

        let early = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new().at(Some(Timestamp(400))))
            .expect("get")
            .expect("element effective");
        assert!(!early.is_classified("Confidentiality"));

        let late = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new().at(Some(Timestamp(600))))
            .expect("get")
            .expect("element effective");
        assert!(late.is_classified("Confidentiality"));
    }

    #[test]
    fn history_and_as_of() {
        let (client, clock) = setup();
        let guid = create(&client, &named("Glossary", "G:1"));
        for description in ["first", "second"] {
            clock.advance(100);
            client
                .update_metadata_element_in_store(
                    USER,
                    guid,
                    false,
                    &ElementProperties::new().with("description", description),
                    &QueryOptions::new(),
                )
                .expect("update");
        }

        let oldest_first = HistoryRequest {
            oldest_first: true,
            ..HistoryRequest::default()
        };
        let history = client
            .get_metadata_element_history(USER, guid, &oldest_first, &QueryOptions::new())
            .expect("history");
        let versions: Vec<u64> = history.iter().map(|e| e.header.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);

        let as_of = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new().as_of(Timestamp(10_150)))
            .expect("get")
            .expect("present");
        assert_eq!(as_of.properties.get_str("description"), Some("first"));
    }
}

// =============================================================================
// CORRELATION
// =============================================================================

mod correlation_ledger {
    use super::*;

    #[test]
    fn snapshot_with_conflicting_mappings_rejected() {
        let store = Arc::new(MemoryStore::new());
        let client = MetadataClient::new(store.clone(), ClientConfig::default());
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("Glossary", "B"));
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("mapping");

        let mut snapshot = store.snapshot();
        assert!(MemoryStore::from_snapshot(snapshot.clone()).is_ok());

        let mut twin = snapshot.correlations[0].clone();
        twin.guid = Guid::new_v4();
        twin.element_guid = b;
        snapshot.correlations.push(twin);

        let err = MemoryStore::from_snapshot(snapshot.clone()).expect_err("conflicting mappings");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);

        // A failed import leaves the existing contents in place.
        let err = store.replace_contents(snapshot).expect_err("conflicting mappings");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
        let elements = client
            .get_elements_for_external_identifier(
                USER,
                scope,
                "ext-1",
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("lookup");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].guid, a);
    }

    #[test]
    fn second_live_mapping_to_other_element_rejected() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("Glossary", "B"));

        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("first mapping");
        let err = client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", b, EffectivityWindow::unbounded()),
            )
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        // Same identifier in another scope is a different key.
        client
            .add_external_identifier(
                USER,
                &correlation(Guid::new_v4(), "ext-1", b, EffectivityWindow::unbounded()),
            )
            .expect("other scope");
    }

    #[test]
    fn closed_mapping_frees_the_identifier() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("Glossary", "B"));

        client
            .add_external_identifier(
                USER,
                &correlation(
                    scope,
                    "ext-1",
                    a,
                    EffectivityWindow::new(None, Some(Timestamp(20_000))),
                ),
            )
            .expect("closed mapping");
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", b, EffectivityWindow::starting(Timestamp(20_000))),
            )
            .expect("successor mapping");

        let valid = |element, t| {
            client
                .validate_external_identifier(
                    USER,
                    scope,
                    "ext-1",
                    element,
                    "Glossary",
                    Some(Timestamp(t)),
                )
                .expect("validate")
        };
        assert!(valid(a, 19_999));
        assert!(!valid(a, 20_000));
        assert!(valid(b, 20_000));
    }

    #[test]
    fn confirmation_is_idempotent() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("map");

        let confirmed = || {
            client
                .confirm_synchronization(USER, scope, a, "Glossary", "ext-1")
                .expect("confirm");
            client
                .get_external_identifiers(USER, scope, a, &QueryOptions::new(), Paging::all())
                .expect("identifiers")
        };
        let once = confirmed();
        let twice = confirmed();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].last_confirmed, Some(Timestamp(10_000)));
    }

    #[test]
    fn removal_leaves_element_untouched() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("map");
        let before = client
            .get_metadata_element_by_guid(USER, a, &QueryOptions::new())
            .expect("get")
            .expect("present");

        client
            .remove_external_identifier(USER, scope, "ext-1", a)
            .expect("remove");

        let after = client
            .get_metadata_element_by_guid(USER, a, &QueryOptions::new())
            .expect("get")
            .expect("still present");
        assert_eq!(before, after);
        assert!(client
            .get_elements_for_external_identifier(
                USER,
                scope,
                "ext-1",
                &QueryOptions::new(),
                Paging::all()
            )
            .expect("lookup")
            .is_empty());
    }

    #[test]
    fn removal_requires_matching_element() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("map");
        let err = client
            .remove_external_identifier(USER, scope, "ext-1", Guid::new_v4())
            .expect_err("wrong element");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn deleted_elements_drop_out_of_lookups() {
        let (client, _) = setup();
        let scope = Guid::new_v4();
        let a = create(&client, &named("Glossary", "A"));
        client
            .add_external_identifier(
                USER,
                &correlation(scope, "ext-1", a, EffectivityWindow::unbounded()),
            )
            .expect("map");
        client
            .delete_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("delete");

        let lookup = |options: &QueryOptions| {
            client
                .get_elements_for_external_identifier(USER, scope, "ext-1", options, Paging::all())
                .expect("lookup")
                .len()
        };
        assert_eq!(lookup(&QueryOptions::new()), 0);
        assert_eq!(lookup(&QueryOptions::lineage()), 1);
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn search_construction_is_deterministic() {
        let first = by_property_exact(["qualifiedName"], "x");
        let second = by_property_exact(["qualifiedName"], "x");
        assert_eq!(first, second);
    }

    #[test]
    fn create_then_find() {
        let (client, _) = setup();
        create(&client, &named("Glossary", "Glossary:HR"));
        let guid = create(&client, &named("Glossary", "Glossary:Finance"));

        let found = client
            .find_metadata_elements_by_property_value(
                USER,
                None,
                &["qualifiedName"],
                "Glossary:Finance",
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].guid, guid);
    }

    #[test]
    fn classification_exclusivity() {
        let (client, _) = setup();
        let x = create(&client, &named("Asset", "Asset:X"));
        let confidentiality = NewClassification::new("Confidentiality")
            .with_properties(ElementProperties::new().with("confidentialityLevel", 1_i64));

        client
            .classify_metadata_element_in_store(USER, x, &confidentiality, &QueryOptions::new())
            .expect("classify");
        let err = client
            .classify_metadata_element_in_store(USER, x, &confidentiality, &QueryOptions::new())
            .expect_err("already classified");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        client
            .reclassify_metadata_element_in_store(
                USER,
                x,
                "Confidentiality",
                false,
                &ElementProperties::new().with("confidentialityLevel", 4_i64),
                &QueryOptions::new(),
            )
            .expect("reclassify");
        let element = client
            .get_metadata_element_by_guid(USER, x, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(element.classifications.len(), 1);
        let level = element
            .classification("Confidentiality")
            .and_then(|c| c.properties.get("confidentialityLevel"))
            .cloned();
        assert_eq!(level, Some(4_i64.into()));

        let by_classification = client
            .find_metadata_elements_by_classification(
                USER,
                None,
                "Confidentiality",
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("find");
        assert_eq!(by_classification.len(), 1);
    }

    #[test]
    fn anchored_cascade() {
        let (client, _) = setup();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("GlossaryTerm", "B").anchored_on(a));

        client
            .delete_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("delete");

        assert!(get(&client, b, &QueryOptions::new()).is_none());
        assert_eq!(
            get(&client, b, &QueryOptions::lineage()),
            Some(ElementStatus::Deleted)
        );
        let anchored = client
            .find_metadata_elements(
                USER,
                &metagraph_core::ElementQuery {
                    anchor_guid: Some(a),
                    ..Default::default()
                },
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("find");
        assert!(anchored.is_empty());
    }

    #[test]
    fn archive_is_lineage_only_until_restored() {
        let (client, _) = setup();
        let a = create(&client, &named("Glossary", "A"));
        client
            .archive_metadata_element_in_store(
                USER,
                a,
                &metagraph_core::ArchiveProperties::default(),
                &QueryOptions::new(),
            )
            .expect("archive");
        assert!(get(&client, a, &QueryOptions::new()).is_none());
        assert_eq!(
            get(&client, a, &QueryOptions::lineage()),
            Some(ElementStatus::Archived)
        );

        client
            .restore_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("restore");
        assert_eq!(
            get(&client, a, &QueryOptions::new()),
            Some(ElementStatus::Active)
        );
    }

    #[test]
    fn paging_is_stable_within_a_session() {
        let (client, _) = setup();
        for i in 0..7 {
            create(&client, &named("Glossary", &format!("G:{i}")));
        }
        let page = |start| {
            client
                .find_metadata_elements_with_string(
                    USER,
                    "G:",
                    Some("Glossary"),
                    &QueryOptions::new(),
                    Paging::new(start, 3),
                )
                .expect("page")
        };
        let mut all: Vec<Guid> = Vec::new();
        for start in [0, 3, 6] {
            all.extend(page(start).iter().map(|e| e.guid));
        }
        assert_eq!(all.len(), 7);
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

mod templates {
    use super::*;
    use metagraph_core::{NewRelationship, RelationshipOptions, TemplateOptions};

    #[test]
    fn copies_anchored_subgraph_with_placeholders() {
        let (client, _) = setup();
        let template = create(
            &client,
            &named("Glossary", "Glossary:~{topic}~")
                .with_classification(NewClassification::new("Template")),
        );
        let term = create(
            &client,
            &named("GlossaryTerm", "Term:~{topic}~:Overview").anchored_on(template),
        );
        client
            .create_related_elements_in_store(
                USER,
                &NewRelationship::new("TermAnchor", template, term),
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("link");

        let copy = client
            .create_metadata_element_from_template(
                USER,
                &TemplateOptions::new(template).placeholder("topic", "Sales"),
                &QueryOptions::new(),
            )
            .expect("copy");

        let root = client
            .get_metadata_element_by_guid(USER, copy, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(root.properties.get_str("qualifiedName"), Some("Glossary:Sales"));
        assert!(!root.is_classified("Template"));

        let copied_term = client
            .get_metadata_element_by_unique_name(
                USER,
                "Term:Sales:Overview",
                None,
                &QueryOptions::new(),
            )
            .expect("lookup")
            .expect("term copied");
        assert_eq!(copied_term.anchor_guid(), Some(copy));

        let related = client
            .get_related_metadata_elements(
                USER,
                copy,
                RelationshipEnd::End1,
                None,
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("related");
        let mut types: Vec<&str> = related
            .iter()
            .map(|r| r.relationship.type_name.as_str())
            .collect();
        types.sort_unstable();
        assert_eq!(types, vec!["SourcedFrom", "TermAnchor"]);
    }

    #[test]
    fn unknown_template_fails_without_side_effects() {
        let (client, _) = setup();
        let err = client
            .create_metadata_element_from_template(
                USER,
                &TemplateOptions::new(Guid::new_v4()),
                &QueryOptions::new(),
            )
            .expect_err("missing template");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(client.statistics().expect("stats").elements, 0);
    }
}

// =============================================================================
// ELEMENT LIFECYCLE
// =============================================================================

mod lifecycle {
    use super::*;
    use metagraph_core::{ElementQuery, PropertyMatch, ReferenceableConverter, SummaryConverter};

    #[test]
    fn status_update_versions_and_rejects_terminal_states() {
        let (client, _) = setup();
        let guid = create(&client, &named("Asset", "Asset:X"));

        client
            .update_metadata_element_status_in_store(
                USER,
                guid,
                ElementStatus::Deprecated,
                &QueryOptions::new(),
            )
            .expect("deprecate");
        assert_eq!(
            get(&client, guid, &QueryOptions::new()),
            Some(ElementStatus::Deprecated)
        );

        for terminal in [ElementStatus::Archived, ElementStatus::Deleted] {
            let err = client
                .update_metadata_element_status_in_store(USER, guid, terminal, &QueryOptions::new())
                .expect_err("terminal status");
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn effectivity_update_moves_the_window() {
        let (client, _) = setup();
        let guid = create(&client, &named("Asset", "Asset:X"));

        client
            .update_metadata_element_effectivity_in_store(
                USER,
                guid,
                EffectivityWindow::between(Timestamp(100), Timestamp(200)),
                &QueryOptions::new(),
            )
            .expect("narrow window");

        let at = |t: i64| QueryOptions::new().at(Some(Timestamp(t)));
        assert!(get(&client, guid, &at(150)).is_some());
        assert!(get(&client, guid, &at(300)).is_none());
        let element = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(element.header.version, 2);
    }

    #[test]
    fn classification_effectivity_and_declassify() {
        let (client, _) = setup();
        let guid = create(&client, &named("Asset", "Asset:X"));
        client
            .classify_metadata_element_in_store(
                USER,
                guid,
                &NewClassification::new("Confidentiality"),
                &QueryOptions::new(),
            )
            .expect("classify");

        client
            .update_classification_effectivity_in_store(
                USER,
                guid,
                "Confidentiality",
                EffectivityWindow::starting(Timestamp(500)),
                &QueryOptions::new(),
            )
            .expect("classification window");
        let early = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new().at(Some(Timestamp(400))))
            .expect("get")
            .expect("element effective");
        assert!(!early.is_classified("Confidentiality"));

        client
            .declassify_metadata_element_in_store(USER, guid, "Confidentiality", &QueryOptions::new())
            .expect("declassify");
        let element = client
            .get_metadata_element_by_guid(USER, guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert!(!element.is_classified("Confidentiality"));

        let err = client
            .declassify_metadata_element_in_store(USER, guid, "Confidentiality", &QueryOptions::new())
            .expect_err("nothing to remove");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn contains_and_classification_property_searches() {
        let (client, _) = setup();
        let finance = create(
            &client,
            &named("Asset", "Asset:Ledger").with_classification(
                NewClassification::new("Ownership")
                    .with_properties(ElementProperties::new().with("owner", "finance-team")),
            ),
        );
        create(
            &client,
            &named("Asset", "Asset:Roster").with_classification(
                NewClassification::new("Ownership")
                    .with_properties(ElementProperties::new().with("owner", "hr-team")),
            ),
        );

        let contains = client
            .find_metadata_elements_by_property_contains(
                USER,
                Some("Asset"),
                &["qualifiedName"],
                "Ledg",
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("contains");
        assert_eq!(contains.len(), 1);
        assert_eq!(contains[0].guid, finance);

        let owned = client
            .find_metadata_elements_by_classification_property(
                USER,
                None,
                "Ownership",
                &["owner"],
                "finance",
                PropertyMatch::Contains,
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("classification property");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].guid, finance);

        let exact = client
            .find_metadata_elements_by_classification_property(
                USER,
                None,
                "Ownership",
                &["owner"],
                "finance",
                PropertyMatch::Exact,
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("classification property");
        assert!(exact.is_empty());
    }

    #[test]
    fn converted_views() {
        let (client, _) = setup();
        let glossary = create(&client, &named("Glossary", "Glossary:HR"));
        create(&client, &NewElement::new("Asset"));

        let summary = client
            .get_converted_element_by_guid(
                USER,
                &SummaryConverter,
                "converted_views",
                glossary,
                &QueryOptions::new(),
            )
            .expect("summary")
            .expect("present");
        assert_eq!(summary.qualified_name.as_deref(), Some("Glossary:HR"));

        let glossaries = client
            .find_converted_elements(
                USER,
                &ReferenceableConverter::for_type("Glossary"),
                "converted_views",
                &ElementQuery {
                    type_name: Some("Glossary".to_string()),
                    ..ElementQuery::default()
                },
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("glossaries");
        assert_eq!(glossaries.len(), 1);
        assert_eq!(glossaries[0].qualified_name, "Glossary:HR");

        let err = client
            .find_converted_elements(
                USER,
                &ReferenceableConverter::new(),
                "converted_views",
                &ElementQuery {
                    type_name: Some("Asset".to_string()),
                    ..ElementQuery::default()
                },
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect_err("asset has no qualifiedName");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
    }
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

mod relationships {
    use super::*;
    use metagraph_core::{NewRelationship, RelationshipOptions};

    fn relate(client: &MetadataClient, relationship: &NewRelationship) -> Guid {
        client
            .create_related_elements_in_store(
                USER,
                relationship,
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("relate")
    }

    #[test]
    fn restore_revives_only_cascaded_relationships() {
        let (client, _) = setup();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("Glossary", "B"));
        let removed = relate(&client, &NewRelationship::new("SeeAlso", a, b));
        let cascaded = relate(&client, &NewRelationship::new("TermAnchor", a, b));

        client
            .delete_related_elements_in_store(USER, removed, &QueryOptions::new())
            .expect("delete relationship");
        client
            .delete_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("delete end");
        client
            .restore_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("restore end");

        assert!(client
            .get_relationship_by_guid(USER, removed, &QueryOptions::new())
            .expect("get")
            .is_none());
        let back = client
            .get_relationship_by_guid(USER, cascaded, &QueryOptions::new())
            .expect("get")
            .expect("cascaded relationship restored");
        assert_eq!(back.status, ElementStatus::Active);
        assert!(!back.cascade_deleted);
    }

    #[test]
    fn restore_after_archive_leaves_deleted_relationships() {
        let (client, _) = setup();
        let a = create(&client, &named("Glossary", "A"));
        let b = create(&client, &named("Glossary", "B"));
        let removed = relate(&client, &NewRelationship::new("SeeAlso", a, b));
        client
            .delete_related_elements_in_store(USER, removed, &QueryOptions::new())
            .expect("delete relationship");
        client
            .archive_metadata_element_in_store(
                USER,
                a,
                &metagraph_core::ArchiveProperties::default(),
                &QueryOptions::new(),
            )
            .expect("archive");
        client
            .restore_metadata_element_in_store(USER, a, &QueryOptions::new())
            .expect("restore");

        assert!(client
            .get_relationship_by_guid(USER, removed, &QueryOptions::new())
            .expect("get")
            .is_none());
    }

    #[test]
    fn lookups_between_two_elements() {
        let (client, _) = setup();
        let glossary = create(&client, &named("Glossary", "Glossary:HR"));
        let term = create(&client, &named("GlossaryTerm", "Term:Salary"));
        let anchor = relate(&client, &NewRelationship::new("TermAnchor", glossary, term));
        let see_also = relate(
            &client,
            &NewRelationship::new("SeeAlso", glossary, term)
                .with_properties(ElementProperties::new().with("description", "related reading")),
        );

        let fetched = client
            .get_relationship_by_guid(USER, anchor, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(fetched.end1_guid, glossary);
        assert_eq!(fetched.end2_guid, term);

        let between = client
            .get_metadata_element_relationships(
                USER,
                glossary,
                term,
                None,
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("between");
        assert_eq!(between.len(), 2);

        let anchors_only = client
            .get_metadata_element_relationships(
                USER,
                glossary,
                term,
                Some("TermAnchor"),
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("between");
        assert_eq!(anchors_only.len(), 1);
        assert_eq!(anchors_only[0].guid, anchor);

        let search = by_property_exact(["description"], "related reading");
        let found = client
            .find_relationships_between_elements(
                USER,
                None,
                Some(&search),
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].guid, see_also);
    }

    #[test]
    fn update_history_and_delete() {
        let (client, clock) = setup();
        let glossary = create(&client, &named("Glossary", "Glossary:HR"));
        let term = create(&client, &named("GlossaryTerm", "Term:Salary"));
        let guid = relate(&client, &NewRelationship::new("SeeAlso", glossary, term));

        clock.advance(100);
        client
            .update_related_elements_in_store(
                USER,
                guid,
                false,
                &ElementProperties::new().with("description", "updated"),
                &QueryOptions::new(),
            )
            .expect("update");
        clock.advance(100);
        client
            .update_related_elements_effectivity_in_store(
                USER,
                guid,
                EffectivityWindow::between(Timestamp(0), Timestamp(50_000)),
                &QueryOptions::new(),
            )
            .expect("window");

        let history = client
            .get_relationship_history(USER, guid, &HistoryRequest::default(), &QueryOptions::new())
            .expect("history");
        let versions: Vec<u64> = history.iter().map(|r| r.header.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);

        let late = QueryOptions::new().at(Some(Timestamp(60_000)));
        assert!(client
            .get_relationship_by_guid(USER, guid, &late)
            .expect("get")
            .is_none());

        client
            .delete_related_elements_in_store(USER, guid, &QueryOptions::new())
            .expect("delete");
        assert!(client
            .get_relationship_by_guid(USER, guid, &QueryOptions::new())
            .expect("get")
            .is_none());
        let err = client
            .delete_related_elements_in_store(USER, guid, &QueryOptions::new())
            .expect_err("already deleted");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}

// =============================================================================
// DUPLICATES
// =============================================================================

mod duplicates {
    use super::*;

    #[test]
    fn known_duplicates_follow_their_own_flag() {
        let (client, _) = setup();
        let guid = create(&client, &named("Asset", "Asset:Copy"));
        client
            .classify_metadata_element_in_store(
                USER,
                guid,
                &NewClassification::new("KnownDuplicate"),
                &QueryOptions::new(),
            )
            .expect("mark duplicate");

        let find = |options: &QueryOptions| {
            client
                .find_metadata_elements_with_string(USER, "Asset:Copy", None, options, Paging::all())
                .expect("find")
                .len()
        };

        let default = QueryOptions::new();
        assert!(get(&client, guid, &default).is_none());
        assert_eq!(find(&default), 0);

        let duplicates = QueryOptions::new().for_duplicate_processing(true);
        assert_eq!(get(&client, guid, &duplicates), Some(ElementStatus::Active));
        assert_eq!(find(&duplicates), 1);

        let lineage = QueryOptions::lineage();
        assert!(get(&client, guid, &lineage).is_none());
        assert_eq!(find(&lineage), 0);
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

mod concurrency {
    use super::*;

    const WRITERS: usize = 8;
    const UPDATES: usize = 25;

    #[test]
    fn shared_client_loses_no_writes() {
        let (client, _) = setup();
        let client = Arc::new(client);
        let shared = create(&client, &named("Asset", "Asset:Shared"));

        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let client = Arc::clone(&client);
                std::thread::spawn(move || {
                    create(&client, &named("Asset", &format!("Asset:Writer{writer}")));
                    for update in 0..UPDATES {
                        client
                            .update_metadata_element_in_store(
                                USER,
                                shared,
                                false,
                                &ElementProperties::new()
                                    .with(format!("writer{writer}"), update as i64),
                                &QueryOptions::new(),
                            )
                            .expect("update");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let element = client
            .get_metadata_element_by_guid(USER, shared, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(element.header.version, (1 + WRITERS * UPDATES) as u64);
        for writer in 0..WRITERS {
            let last = element.properties.get(&format!("writer{writer}")).cloned();
            assert_eq!(last, Some(((UPDATES - 1) as i64).into()));
        }

        let stats = client.statistics().expect("stats");
        assert_eq!(stats.elements, 1 + WRITERS);
        assert_eq!(stats.element_versions, 1 + WRITERS + WRITERS * UPDATES);
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;
    use metagraph_core::{AccessAction, DenyList};

    #[test]
    fn authorization_failure_surfaces_unchanged() {
        let store = MemoryStore::new().with_access_control(Arc::new(
            DenyList::new().deny_action("peterprofile", AccessAction::Delete),
        ));
        let client = MetadataClient::new(Arc::new(store), ClientConfig::default());
        let guid = client
            .create_metadata_element_in_store("peterprofile", &named("Glossary", "G"))
            .expect("create allowed");

        let err = client
            .delete_metadata_element_in_store("peterprofile", guid, &QueryOptions::new())
            .expect_err("delete denied");
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        assert!(client
            .get_metadata_element_by_guid("peterprofile", guid, &QueryOptions::new())
            .expect("get")
            .is_some());
    }

    #[test]
    fn malformed_input_is_invalid_parameter() {
        let (client, _) = setup();
        let err = client
            .create_metadata_element_in_store(
                USER,
                &NewElement::new("Glossary")
                    .effective(EffectivityWindow::between(Timestamp(5), Timestamp(5))),
            )
            .expect_err("empty window");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(client.statistics().expect("stats").elements, 0);
    }

    #[test]
    fn missing_guid_is_none_not_error() {
        let (client, _) = setup();
        let found = client
            .get_metadata_element_by_guid(USER, Guid::new_v4(), &QueryOptions::new())
            .expect("lookup");
        assert!(found.is_none());
    }
}
