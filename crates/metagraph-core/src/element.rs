//! # Temporal Element Model
//!
//! Versioned, effectivity-windowed graph units: elements, relationships and
//! classifications, plus the query options that decide which of them a
//! caller may see.
//!
//! ## Effectivity
//!
//! Every record carries an [`EffectivityWindow`] `[from, to)`. A missing bound
//! is open-ended on that side. A query time of `None` ignores effectivity
//! entirely.
//!
//! ## Visibility
//!
//! - `Deleted` records are only visible in lineage mode.
//! - `Archived` records (and elements carrying a `Memento` classification)
//!   are only visible in lineage mode.
//! - Elements classified `KnownDuplicate` are hidden unless the caller asks
//!   for duplicate processing.
//!
//! The `for_lineage` and `for_duplicate_processing` flags are independent and
//! travel unchanged in [`QueryOptions`] from the facade to the store.

use crate::primitives::{KNOWN_DUPLICATE_CLASSIFICATION, MEMENTO_CLASSIFICATION};
use crate::{ElementProperties, ElementStatus, Guid, MetadataError, MetadataResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// EFFECTIVITY
// =============================================================================

/// The `[from, to)` interval during which a record is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectivityWindow {
    /// Inclusive lower bound; `None` means "since forever".
    pub from: Option<Timestamp>,
    /// Exclusive upper bound; `None` means "until forever".
    pub to: Option<Timestamp>,
}

impl EffectivityWindow {
    /// A window with no bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { from: None, to: None }
    }

    /// A window with the given optional bounds.
    #[must_use]
    pub const fn new(from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        Self { from, to }
    }

    /// A window open from `from` onwards.
    #[must_use]
    pub const fn starting(from: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    /// A window closed on both sides.
    #[must_use]
    pub const fn between(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Reject windows whose upper bound does not lie after the lower bound.
    pub fn validate(&self, parameter: &str) -> MetadataResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if to <= from => Err(MetadataError::invalid(
                parameter,
                format!("effectiveTo {} must be later than effectiveFrom {}", to, from),
            )),
            _ => Ok(()),
        }
    }

    /// `from <= time < to`, treating missing bounds as open.
    ///
    /// `time = None` means "ignore effectivity" and is always true.
    #[must_use]
    pub fn is_effective_at(&self, time: Option<Timestamp>) -> bool {
        let Some(time) = time else {
            return true;
        };
        let after_start = self.from.is_none_or(|from| from <= time);
        let before_end = self.to.is_none_or(|to| time < to);
        after_start && before_end
    }

    /// Check whether two windows share at least one instant.
    #[must_use]
    pub fn overlaps(&self, other: &EffectivityWindow) -> bool {
        let starts_before_other_ends = match (self.from, other.to) {
            (Some(from), Some(to)) => from < to,
            _ => true,
        };
        let other_starts_before_self_ends = match (other.from, self.to) {
            (Some(from), Some(to)) => from < to,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_self_ends
    }
}

/// Anything carrying an effectivity window.
pub trait Temporal {
    /// The record's effectivity window.
    fn effectivity(&self) -> &EffectivityWindow;

    /// Shorthand for `self.effectivity().is_effective_at(time)`.
    fn is_effective_at(&self, time: Option<Timestamp>) -> bool {
        self.effectivity().is_effective_at(time)
    }
}

// =============================================================================
// VERSIONING
// =============================================================================

/// Version number plus creation/update audit stamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHeader {
    /// Starts at 1 and grows by one for every stored change.
    pub version: u64,
    pub created_by: String,
    pub create_time: Timestamp,
    pub updated_by: Option<String>,
    pub update_time: Option<Timestamp>,
    /// Users allowed to maintain the record besides its creator.
    pub maintained_by: Vec<String>,
}

impl ElementHeader {
    /// Stamps for a freshly created record.
    #[must_use]
    pub fn initial(user_id: &str, now: Timestamp) -> Self {
        Self {
            version: 1,
            created_by: user_id.to_string(),
            create_time: now,
            updated_by: None,
            update_time: None,
            maintained_by: Vec::new(),
        }
    }

    /// Stamps for the next version of this record.
    #[must_use]
    pub fn next(&self, user_id: &str, now: Timestamp) -> Self {
        Self {
            version: self.version.saturating_add(1),
            created_by: self.created_by.clone(),
            create_time: self.create_time,
            updated_by: Some(user_id.to_string()),
            update_time: Some(now),
            maintained_by: self.maintained_by.clone(),
        }
    }

    /// The instant this version became current.
    #[must_use]
    pub fn version_time(&self) -> Timestamp {
        self.update_time.unwrap_or(self.create_time)
    }
}

/// Anything with a version history.
pub trait Versioned {
    fn header(&self) -> &ElementHeader;
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// A named property attachment on an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    pub properties: ElementProperties,
    pub effectivity: EffectivityWindow,
    pub header: ElementHeader,
}

impl Temporal for Classification {
    fn effectivity(&self) -> &EffectivityWindow {
        &self.effectivity
    }
}

impl Versioned for Classification {
    fn header(&self) -> &ElementHeader {
        &self.header
    }
}

// =============================================================================
// ANCHOR
// =============================================================================

/// Weak back-reference: deleting or archiving the anchor cascades here.
///
/// Never resolved into an in-memory pointer; the store looks the anchor up
/// by GUID when it needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRef {
    pub anchor_guid: Guid,
    pub anchor_type_name: Option<String>,
    pub anchor_scope_guid: Option<Guid>,
}

impl AnchorRef {
    #[must_use]
    pub fn new(anchor_guid: Guid) -> Self {
        Self {
            anchor_guid,
            anchor_type_name: None,
            anchor_scope_guid: None,
        }
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

/// A versioned node in the metadata graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMetadataElement {
    pub guid: Guid,
    pub type_name: String,
    pub status: ElementStatus,
    pub properties: ElementProperties,
    /// Keyed by classification name: at most one instance per name.
    pub classifications: BTreeMap<String, Classification>,
    pub anchor: Option<AnchorRef>,
    pub effectivity: EffectivityWindow,
    pub header: ElementHeader,
}

impl OpenMetadataElement {
    /// Look up a classification by name.
    #[must_use]
    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.get(name)
    }

    /// Check whether the element carries a classification.
    #[must_use]
    pub fn is_classified(&self, name: &str) -> bool {
        self.classifications.contains_key(name)
    }

    /// The anchor GUID, if the element is anchored.
    #[must_use]
    pub fn anchor_guid(&self) -> Option<Guid> {
        self.anchor.as_ref().map(|a| a.anchor_guid)
    }

    /// Visibility of the element itself under `options`.
    ///
    /// Anchor-inherited visibility needs the rest of the graph and is
    /// applied by the store.
    #[must_use]
    pub fn is_visible(&self, options: &QueryOptions) -> bool {
        if !options.status_visible(self.status) {
            return false;
        }
        if !options.for_lineage && self.is_classified(MEMENTO_CLASSIFICATION) {
            return false;
        }
        if !options.for_duplicate_processing && self.is_classified(KNOWN_DUPLICATE_CLASSIFICATION)
        {
            return false;
        }
        self.is_effective_at(options.effective_time)
    }

    /// Drop classifications that are not effective at `time`.
    #[must_use]
    pub fn with_effective_classifications(mut self, time: Option<Timestamp>) -> Self {
        self.classifications.retain(|_, c| c.is_effective_at(time));
        self
    }
}

impl Temporal for OpenMetadataElement {
    fn effectivity(&self) -> &EffectivityWindow {
        &self.effectivity
    }
}

impl Versioned for OpenMetadataElement {
    fn header(&self) -> &ElementHeader {
        &self.header
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// A versioned, typed edge between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub guid: Guid,
    pub type_name: String,
    pub end1_guid: Guid,
    pub end2_guid: Guid,
    /// Undirected relationships match either end in end-based queries.
    pub directed: bool,
    pub status: ElementStatus,
    pub properties: ElementProperties,
    pub effectivity: EffectivityWindow,
    pub header: ElementHeader,
    /// Set on the `Deleted` version written when an end's delete cascaded
    /// here. Only such versions come back when that end is restored.
    #[serde(default)]
    pub cascade_deleted: bool,
}

impl Relationship {
    /// Check whether `guid` is one of the two ends.
    #[must_use]
    pub fn touches(&self, guid: Guid) -> bool {
        self.end1_guid == guid || self.end2_guid == guid
    }

    /// The end opposite `guid`, if `guid` is an end.
    #[must_use]
    pub fn other_end(&self, guid: Guid) -> Option<Guid> {
        if self.end1_guid == guid {
            Some(self.end2_guid)
        } else if self.end2_guid == guid {
            Some(self.end1_guid)
        } else {
            None
        }
    }

    /// Visibility of the relationship itself under `options`.
    #[must_use]
    pub fn is_visible(&self, options: &QueryOptions) -> bool {
        options.status_visible(self.status) && self.is_effective_at(options.effective_time)
    }
}

impl Temporal for Relationship {
    fn effectivity(&self) -> &EffectivityWindow {
        &self.effectivity
    }
}

impl Versioned for Relationship {
    fn header(&self) -> &ElementHeader {
        &self.header
    }
}

// =============================================================================
// QUERY OPTIONS
// =============================================================================

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencingOrder {
    /// Store's choice; the reference store uses GUID order.
    #[default]
    Any,
    GuidAscending,
    CreationDateRecent,
    CreationDateOldest,
    LastUpdateRecent,
    LastUpdateOldest,
    PropertyAscending,
    PropertyDescending,
}

/// Options threaded unchanged through every call that reaches a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Simulate the graph at this instant; `None` ignores effectivity.
    pub effective_time: Option<Timestamp>,
    /// Read the version that was current at this instant.
    pub as_of_time: Option<Timestamp>,
    /// Include archived and deleted records.
    pub for_lineage: bool,
    /// Return known duplicates unmerged.
    pub for_duplicate_processing: bool,
    /// When non-empty, only these statuses are returned.
    pub limit_results_by_status: Vec<ElementStatus>,
    pub sequencing_property: Option<String>,
    pub sequencing_order: SequencingOrder,
}

impl QueryOptions {
    /// Default query mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lineage mode.
    #[must_use]
    pub fn lineage() -> Self {
        Self {
            for_lineage: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, effective_time: Option<Timestamp>) -> Self {
        self.effective_time = effective_time;
        self
    }

    #[must_use]
    pub fn as_of(mut self, as_of_time: Timestamp) -> Self {
        self.as_of_time = Some(as_of_time);
        self
    }

    #[must_use]
    pub fn for_lineage(mut self, value: bool) -> Self {
        self.for_lineage = value;
        self
    }

    #[must_use]
    pub fn for_duplicate_processing(mut self, value: bool) -> Self {
        self.for_duplicate_processing = value;
        self
    }

    #[must_use]
    pub fn limit_by_status(mut self, statuses: Vec<ElementStatus>) -> Self {
        self.limit_results_by_status = statuses;
        self
    }

    #[must_use]
    pub fn sequenced_by(mut self, order: SequencingOrder, property: Option<String>) -> Self {
        self.sequencing_order = order;
        self.sequencing_property = property;
        self
    }

    /// Status filter: terminal states are lineage-only, then the explicit
    /// status limit applies.
    #[must_use]
    pub fn status_visible(&self, status: ElementStatus) -> bool {
        if status.is_terminal() && !self.for_lineage {
            return false;
        }
        self.limit_results_by_status.is_empty() || self.limit_results_by_status.contains(&status)
    }
}

/// Sort elements in place per the requested sequencing.
///
/// Every ordering falls back to GUID order, so results are stable within a
/// paging session.
pub fn sequence_elements(
    elements: &mut [OpenMetadataElement],
    order: SequencingOrder,
    property: Option<&str>,
) {
    let by_guid = |a: &OpenMetadataElement, b: &OpenMetadataElement| a.guid.cmp(&b.guid);
    let by_property = |a: &OpenMetadataElement, b: &OpenMetadataElement| -> Ordering {
        let key = property.unwrap_or(crate::primitives::QUALIFIED_NAME);
        a.properties.get(key).cmp(&b.properties.get(key))
    };
    match order {
        SequencingOrder::Any | SequencingOrder::GuidAscending => elements.sort_by(by_guid),
        SequencingOrder::CreationDateRecent => elements.sort_by(|a, b| {
            b.header
                .create_time
                .cmp(&a.header.create_time)
                .then_with(|| by_guid(a, b))
        }),
        SequencingOrder::CreationDateOldest => elements.sort_by(|a, b| {
            a.header
                .create_time
                .cmp(&b.header.create_time)
                .then_with(|| by_guid(a, b))
        }),
        SequencingOrder::LastUpdateRecent => elements.sort_by(|a, b| {
            b.header
                .version_time()
                .cmp(&a.header.version_time())
                .then_with(|| by_guid(a, b))
        }),
        SequencingOrder::LastUpdateOldest => elements.sort_by(|a, b| {
            a.header
                .version_time()
                .cmp(&b.header.version_time())
                .then_with(|| by_guid(a, b))
        }),
        SequencingOrder::PropertyAscending => {
            elements.sort_by(|a, b| by_property(a, b).then_with(|| by_guid(a, b)));
        }
        SequencingOrder::PropertyDescending => {
            elements.sort_by(|a, b| by_property(b, a).then_with(|| by_guid(a, b)));
        }
    }
}

// =============================================================================
// PAGING & HISTORY
// =============================================================================

/// One bounded page: `start_from` is 0-based, `page_size` 0 means unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub start_from: usize,
    pub page_size: usize,
}

impl Paging {
    #[must_use]
    pub const fn new(start_from: usize, page_size: usize) -> Self {
        Self {
            start_from,
            page_size,
        }
    }

    /// Everything, from the start.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start_from: 0,
            page_size: 0,
        }
    }

    /// Cut one page out of an ordered result list.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.start_from);
        if self.page_size == 0 {
            iter.collect()
        } else {
            iter.take(self.page_size).collect()
        }
    }
}

/// History query: `[from_time, to_time)` window plus ordering and paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRequest {
    /// Inclusive.
    pub from_time: Option<Timestamp>,
    /// Exclusive.
    pub to_time: Option<Timestamp>,
    pub oldest_first: bool,
    pub paging: Paging,
}

/// Select the snapshots of a versioned record that fall in the request window.
///
/// `versions` must be in the order they were stored.
#[must_use]
pub fn select_history<T: Versioned + Clone>(versions: &[T], request: &HistoryRequest) -> Vec<T> {
    let mut selected: Vec<T> = versions
        .iter()
        .filter(|v| {
            let t = v.header().version_time();
            request.from_time.is_none_or(|from| from <= t)
                && request.to_time.is_none_or(|to| t < to)
        })
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        let (a, b) = (a.header(), b.header());
        a.version_time()
            .cmp(&b.version_time())
            .then(a.version.cmp(&b.version))
    });
    if !request.oldest_first {
        selected.reverse();
    }
    request.paging.apply(selected)
}

/// The version that was current at `as_of`, if the record existed then.
#[must_use]
pub fn version_as_of<T: Versioned>(versions: &[T], as_of: Timestamp) -> Option<&T> {
    versions
        .iter()
        .filter(|v| v.header().version_time() <= as_of)
        .max_by(|a, b| {
            let (a, b) = (a.header(), b.header());
            a.version_time()
                .cmp(&b.version_time())
                .then(a.version.cmp(&b.version))
        })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn element(status: ElementStatus) -> OpenMetadataElement {
        OpenMetadataElement {
            guid: Guid::new_v4(),
            type_name: "Glossary".to_string(),
            status,
            properties: ElementProperties::new(),
            classifications: BTreeMap::new(),
            anchor: None,
            effectivity: EffectivityWindow::unbounded(),
            header: ElementHeader::initial("tester", Timestamp(0)),
        }
    }

    #[test]
    fn window_is_right_exclusive() {
        let w = EffectivityWindow::between(Timestamp(10), Timestamp(20));
        assert!(!w.is_effective_at(Some(Timestamp(9))));
        assert!(w.is_effective_at(Some(Timestamp(10))));
        assert!(w.is_effective_at(Some(Timestamp(19))));
        assert!(!w.is_effective_at(Some(Timestamp(20))));
    }

    #[test]
    fn none_time_ignores_effectivity() {
        let w = EffectivityWindow::between(Timestamp(10), Timestamp(20));
        assert!(w.is_effective_at(None));
    }

    #[test]
    fn open_bounds() {
        let w = EffectivityWindow::starting(Timestamp(5));
        assert!(w.is_effective_at(Some(Timestamp(i64::MAX))));
        assert!(!w.is_effective_at(Some(Timestamp(4))));
        assert!(EffectivityWindow::unbounded().is_effective_at(Some(Timestamp(i64::MIN))));
    }

    #[test]
    fn overlap_detection() {
        let a = EffectivityWindow::between(Timestamp(0), Timestamp(10));
        let b = EffectivityWindow::between(Timestamp(10), Timestamp(20));
        let c = EffectivityWindow::starting(Timestamp(5));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(EffectivityWindow::unbounded().overlaps(&a));
    }

    #[test]
    fn inverted_window_rejected() {
        let w = EffectivityWindow::between(Timestamp(20), Timestamp(10));
        assert!(w.validate("effectiveTo").is_err());
        assert!(EffectivityWindow::between(Timestamp(1), Timestamp(2))
            .validate("effectiveTo")
            .is_ok());
    }

    #[test]
    fn deleted_hidden_unless_lineage() {
        let e = element(ElementStatus::Deleted);
        assert!(!e.is_visible(&QueryOptions::new()));
        assert!(e.is_visible(&QueryOptions::lineage()));
    }

    #[test]
    fn known_duplicates_need_duplicate_processing() {
        let mut e = element(ElementStatus::Active);
        e.classifications.insert(
            KNOWN_DUPLICATE_CLASSIFICATION.to_string(),
            Classification {
                name: KNOWN_DUPLICATE_CLASSIFICATION.to_string(),
                properties: ElementProperties::new(),
                effectivity: EffectivityWindow::unbounded(),
                header: ElementHeader::initial("tester", Timestamp(0)),
            },
        );
        assert!(!e.is_visible(&QueryOptions::new()));
        assert!(e.is_visible(&QueryOptions::new().for_duplicate_processing(true)));
        // Lineage alone does not reveal duplicates.
        assert!(!e.is_visible(&QueryOptions::lineage()));
    }

    #[test]
    fn status_limit_applies() {
        let opts = QueryOptions::new().limit_by_status(vec![ElementStatus::Draft]);
        assert!(opts.status_visible(ElementStatus::Draft));
        assert!(!opts.status_visible(ElementStatus::Active));
    }

    #[test]
    fn paging_slices() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(Paging::new(2, 3).apply(items.clone()), vec![2, 3, 4]);
        assert_eq!(Paging::new(8, 0).apply(items.clone()), vec![8, 9]);
        assert!(Paging::new(20, 5).apply(items).is_empty());
    }

    #[test]
    fn history_window_and_order() {
        let mut versions = Vec::new();
        let mut e = element(ElementStatus::Active);
        versions.push(e.clone());
        for t in [10, 20, 30] {
            e.header = e.header.next("tester", Timestamp(t));
            versions.push(e.clone());
        }

        let req = HistoryRequest {
            from_time: Some(Timestamp(10)),
            to_time: Some(Timestamp(30)),
            oldest_first: true,
            paging: Paging::all(),
        };
        let selected: Vec<u64> = select_history(&versions, &req)
            .iter()
            .map(|v| v.header.version)
            .collect();
        assert_eq!(selected, vec![2, 3]);

        let newest_first = HistoryRequest {
            oldest_first: false,
            ..HistoryRequest::default()
        };
        let selected: Vec<u64> = select_history(&versions, &newest_first)
            .iter()
            .map(|v| v.header.version)
            .collect();
        assert_eq!(selected, vec![4, 3, 2, 1]);
    }

    #[test]
    fn as_of_picks_latest_version_before_instant() {
        let mut versions = Vec::new();
        let mut e = element(ElementStatus::Active);
        versions.push(e.clone());
        e.header = e.header.next("tester", Timestamp(50));
        versions.push(e);

        assert_eq!(
            version_as_of(&versions, Timestamp(49)).map(|v| v.header.version),
            Some(1)
        );
        assert_eq!(
            version_as_of(&versions, Timestamp(50)).map(|v| v.header.version),
            Some(2)
        );
        assert!(version_as_of(&versions, Timestamp(-1)).is_none());
    }

    #[test]
    fn sequencing_falls_back_to_guid() {
        let mut items = vec![element(ElementStatus::Active), element(ElementStatus::Active)];
        let mut expected: Vec<Guid> = items.iter().map(|e| e.guid).collect();
        expected.sort();
        sequence_elements(&mut items, SequencingOrder::CreationDateRecent, None);
        let got: Vec<Guid> = items.iter().map(|e| e.guid).collect();
        assert_eq!(got, expected);
    }
}
