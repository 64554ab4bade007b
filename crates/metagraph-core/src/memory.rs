//! # In-Process Store
//!
//! `MemoryStore` is the reference implementation of [`MetadataStore`].
//! It keeps every version of every element and relationship, plus the
//! correlation ledger, behind one `parking_lot::RwLock`.
//!
//! All collections are `BTreeMap`s, so iteration order (and therefore the
//! default result order) is stable GUID order.
//!
//! ## Cascade
//!
//! - Delete marks the element, every element anchored on it (transitively)
//!   and every relationship touching one of them as `Deleted`.
//! - Archive marks the element `Archived`, attaches a `Memento` and archives
//!   its anchored elements.
//! - Restore reverses either, putting back the status each record had before.

use crate::correlation::{CorrelationHeader, CorrelationLedger, CorrelationRequest};
use crate::element::{
    AnchorRef, Classification, EffectivityWindow, ElementHeader, HistoryRequest,
    OpenMetadataElement, Paging, QueryOptions, Relationship, Temporal, select_history,
    sequence_elements, version_as_of,
};
use crate::matcher::ElementFilter;
use crate::primitives::{MAX_ANCHOR_DEPTH, MEMENTO_CLASSIFICATION};
use crate::store::{
    AccessAction, AccessControl, AllowAll, AnchorDirection, ArchiveProperties, Clock,
    ElementQuery, MetadataStore, NewClassification, NewElement, NewRelationship, ParentLink,
    RelatedElement, RelationshipEnd, RelationshipOptions, RelationshipQuery, StoreStatistics,
    SystemClock,
};
use crate::template::{PlaceholderSyntax, Placeholders, TemplateOptions, TemplateSource, plan_template};
use crate::{
    ElementProperties, ElementStatus, Guid, MetadataError, MetadataResult, PropertyValue,
    Timestamp,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Full contents of a [`MemoryStore`], every version included.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// One history per element, oldest version first.
    pub elements: Vec<Vec<OpenMetadataElement>>,
    /// One history per relationship, oldest version first.
    pub relationships: Vec<Vec<Relationship>>,
    /// Correlation headers in creation order.
    pub correlations: Vec<CorrelationHeader>,
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    elements: BTreeMap<Guid, Vec<OpenMetadataElement>>,
    relationships: BTreeMap<Guid, Vec<Relationship>>,
    ledger: CorrelationLedger,
}

impl StoreState {
    // --- elements -----------------------------------------------------------

    fn current(&self, guid: Guid) -> Option<&OpenMetadataElement> {
        self.elements.get(&guid).and_then(|h| h.last())
    }

    /// The version selected by `as_of_time`, or the current one.
    fn resolved(&self, guid: Guid, options: &QueryOptions) -> Option<&OpenMetadataElement> {
        let history = self.elements.get(&guid)?;
        match options.as_of_time {
            Some(t) => version_as_of(history, t),
            None => history.last(),
        }
    }

    /// Archived or deleted anchors hide their anchored elements outside lineage.
    fn anchors_visible(&self, element: &OpenMetadataElement, options: &QueryOptions) -> bool {
        if options.for_lineage {
            return true;
        }
        let mut next = element.anchor_guid();
        let mut depth = 0;
        while let Some(anchor_guid) = next {
            if depth >= MAX_ANCHOR_DEPTH || anchor_guid == element.guid {
                break;
            }
            let Some(anchor) = self.resolved(anchor_guid, options) else {
                break;
            };
            if anchor.status.is_terminal() || anchor.is_classified(MEMENTO_CLASSIFICATION) {
                return false;
            }
            next = anchor.anchor_guid();
            depth += 1;
        }
        true
    }

    fn visible_element(&self, guid: Guid, options: &QueryOptions) -> Option<OpenMetadataElement> {
        let element = self.resolved(guid, options)?;
        if element.is_visible(options) && self.anchors_visible(element, options) {
            Some(
                element
                    .clone()
                    .with_effective_classifications(options.effective_time),
            )
        } else {
            None
        }
    }

    /// The current version of an element a mutation may touch.
    fn mutable(
        &self,
        guid: Guid,
        options: &QueryOptions,
        allow_archived: bool,
    ) -> MetadataResult<&OpenMetadataElement> {
        let element = self
            .current(guid)
            .ok_or(MetadataError::ElementNotFound(guid))?;
        let hidden = match element.status {
            ElementStatus::Deleted => true,
            ElementStatus::Archived => !(allow_archived || options.for_lineage),
            _ => false,
        };
        if hidden || !element.is_effective_at(options.effective_time) {
            return Err(MetadataError::ElementNotFound(guid));
        }
        Ok(element)
    }

    /// An element that may serve as an anchor, parent or relationship end.
    fn live(&self, guid: Guid) -> MetadataResult<&OpenMetadataElement> {
        self.current(guid)
            .filter(|e| !e.status.is_terminal())
            .ok_or(MetadataError::ElementNotFound(guid))
    }

    fn push_element(&mut self, element: OpenMetadataElement) {
        self.elements.entry(element.guid).or_default().push(element);
    }

    /// Store `change` applied to `current` as the next version.
    fn revise_element<F>(
        &mut self,
        current: OpenMetadataElement,
        user_id: &str,
        now: Timestamp,
        change: F,
    ) -> MetadataResult<()>
    where
        F: FnOnce(&mut OpenMetadataElement) -> MetadataResult<()>,
    {
        let mut next = current;
        change(&mut next)?;
        next.header = next.header.next(user_id, now);
        self.push_element(next);
        Ok(())
    }

    /// The status an element or relationship had before it went terminal.
    fn last_live_status<'a, I>(history: I) -> ElementStatus
    where
        I: DoubleEndedIterator<Item = &'a ElementStatus>,
    {
        history
            .rev()
            .find(|s| !s.is_terminal())
            .copied()
            .unwrap_or(ElementStatus::Active)
    }

    /// Elements anchored on `root`, directly or transitively, breadth first.
    fn anchored_closure(&self, root: Guid) -> Vec<Guid> {
        let mut children: BTreeMap<Guid, Vec<Guid>> = BTreeMap::new();
        for (guid, history) in &self.elements {
            if let Some(anchor) = history.last().and_then(OpenMetadataElement::anchor_guid) {
                children.entry(anchor).or_default().push(*guid);
            }
        }

        let mut seen = BTreeSet::from([root]);
        let mut frontier = vec![root];
        let mut closure = Vec::new();
        for _ in 0..MAX_ANCHOR_DEPTH {
            let mut next = Vec::new();
            for guid in frontier {
                for child in children.get(&guid).into_iter().flatten() {
                    if seen.insert(*child) {
                        closure.push(*child);
                        next.push(*child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        closure
    }

    /// Would anchoring `child` on `anchor` make `child` its own anchor?
    fn anchor_cycle(&self, child: Guid, anchor: Guid) -> bool {
        let mut next = Some(anchor);
        for _ in 0..MAX_ANCHOR_DEPTH {
            match next {
                Some(guid) if guid == child => return true,
                Some(guid) => next = self.current(guid).and_then(OpenMetadataElement::anchor_guid),
                None => return false,
            }
        }
        true
    }

    // --- relationships ------------------------------------------------------

    fn current_relationship(&self, guid: Guid) -> Option<&Relationship> {
        self.relationships.get(&guid).and_then(|h| h.last())
    }

    fn resolved_relationship(&self, guid: Guid, options: &QueryOptions) -> Option<&Relationship> {
        let history = self.relationships.get(&guid)?;
        match options.as_of_time {
            Some(t) => version_as_of(history, t),
            None => history.last(),
        }
    }

    /// Outside lineage both ends must be visible too.
    fn relationship_visible(&self, relationship: &Relationship, options: &QueryOptions) -> bool {
        relationship.is_visible(options)
            && (options.for_lineage
                || (self.visible_element(relationship.end1_guid, options).is_some()
                    && self.visible_element(relationship.end2_guid, options).is_some()))
    }

    fn visible_relationship(&self, guid: Guid, options: &QueryOptions) -> Option<Relationship> {
        self.resolved_relationship(guid, options)
            .filter(|r| self.relationship_visible(r, options))
            .cloned()
    }

    fn mutable_relationship(
        &self,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<&Relationship> {
        self.current_relationship(guid)
            .filter(|r| !r.status.is_terminal() && r.is_effective_at(options.effective_time))
            .ok_or(MetadataError::RelationshipNotFound(guid))
    }

    fn push_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .entry(relationship.guid)
            .or_default()
            .push(relationship);
    }

    fn revise_relationship<F>(
        &mut self,
        current: Relationship,
        user_id: &str,
        now: Timestamp,
        change: F,
    ) where
        F: FnOnce(&mut Relationship),
    {
        let mut next = current;
        change(&mut next);
        next.header = next.header.next(user_id, now);
        self.push_relationship(next);
    }

    fn new_relationship(
        relationship: &NewRelationship,
        user_id: &str,
        now: Timestamp,
    ) -> Relationship {
        Relationship {
            guid: Guid::new_v4(),
            type_name: relationship.type_name.clone(),
            end1_guid: relationship.end1_guid,
            end2_guid: relationship.end2_guid,
            directed: relationship.directed,
            status: relationship.status,
            properties: relationship.properties.clone(),
            effectivity: relationship.effectivity,
            header: ElementHeader::initial(user_id, now),
            cascade_deleted: false,
        }
    }

    fn parent_relationship(
        &self,
        child: Guid,
        parent: &ParentLink,
        user_id: &str,
        now: Timestamp,
    ) -> MetadataResult<Relationship> {
        self.live(parent.parent_guid)?;
        let (end1, end2) = if parent.parent_at_end1 {
            (parent.parent_guid, child)
        } else {
            (child, parent.parent_guid)
        };
        let link = NewRelationship::new(parent.relationship_type.clone(), end1, end2)
            .with_properties(parent.properties.clone());
        Ok(Self::new_relationship(&link, user_id, now))
    }

    /// Mark relationships touching any of `ends` as `Deleted`.
    fn delete_touching(
        &mut self,
        ends: &BTreeSet<Guid>,
        user_id: &str,
        now: Timestamp,
    ) -> usize {
        let doomed: Vec<Relationship> = self
            .relationships
            .values()
            .filter_map(|h| h.last())
            .filter(|r| {
                r.status != ElementStatus::Deleted
                    && (ends.contains(&r.end1_guid) || ends.contains(&r.end2_guid))
            })
            .cloned()
            .collect();
        let count = doomed.len();
        for relationship in doomed {
            self.revise_relationship(relationship, user_id, now, |r| {
                r.status = ElementStatus::Deleted;
                r.cascade_deleted = true;
            });
        }
        count
    }
}

// =============================================================================
// STORE
// =============================================================================

/// In-process reference store.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    access: Arc<dyn AccessControl>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store that allows everything and uses wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            access: Arc::new(AllowAll),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_access_control(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Copy out every stored version and correlation.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            elements: state.elements.values().cloned().collect(),
            relationships: state.relationships.values().cloned().collect(),
            correlations: state.ledger.headers().cloned().collect(),
        }
    }

    /// Build a store from a snapshot, checking every history is well formed.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> MetadataResult<Self> {
        let store = Self::new();
        store.replace_contents(snapshot)?;
        Ok(store)
    }

    /// Swap in the contents of a snapshot. On error the store is unchanged.
    pub fn replace_contents(&self, snapshot: StoreSnapshot) -> MetadataResult<()> {
        fn keyed<T>(
            histories: Vec<Vec<T>>,
            guid_of: impl Fn(&T) -> Guid,
            what: &str,
        ) -> MetadataResult<BTreeMap<Guid, Vec<T>>> {
            let mut map = BTreeMap::new();
            for history in histories {
                let guid = history.first().map(&guid_of).ok_or_else(|| {
                    MetadataError::Serialization(format!("empty {} history", what))
                })?;
                if history.iter().any(|v| guid_of(v) != guid) {
                    return Err(MetadataError::Serialization(format!(
                        "{} history for {} mixes guids",
                        what, guid
                    )));
                }
                if map.insert(guid, history).is_some() {
                    return Err(MetadataError::Serialization(format!(
                        "duplicate {} {}",
                        what, guid
                    )));
                }
            }
            Ok(map)
        }

        let elements = keyed(snapshot.elements, |e: &OpenMetadataElement| e.guid, "element")?;
        let relationships = keyed(snapshot.relationships, |r: &Relationship| r.guid, "relationship")?;
        let ledger = CorrelationLedger::from_headers(snapshot.correlations)?;

        let mut state = self.state.write();
        *state = StoreState {
            elements,
            relationships,
            ledger,
        };
        Ok(())
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn check(&self, user_id: &str, action: AccessAction, type_name: &str) -> MetadataResult<()> {
        self.access.check(user_id, action, type_name)
    }
}

impl MetadataStore for MemoryStore {
    fn create_element(&self, user_id: &str, element: &NewElement) -> MetadataResult<Guid> {
        self.check(user_id, AccessAction::Create, &element.type_name)?;
        let now = self.now();
        let mut state = self.state.write();

        let anchor = match &element.anchor {
            Some(anchor) => {
                let target = state.live(anchor.anchor_guid)?;
                Some(AnchorRef {
                    anchor_guid: anchor.anchor_guid,
                    anchor_type_name: anchor
                        .anchor_type_name
                        .clone()
                        .or_else(|| Some(target.type_name.clone())),
                    anchor_scope_guid: anchor.anchor_scope_guid,
                })
            }
            None => None,
        };

        let mut classifications = BTreeMap::new();
        for c in &element.classifications {
            let previous = classifications.insert(
                c.name.clone(),
                Classification {
                    name: c.name.clone(),
                    properties: c.properties.clone(),
                    effectivity: c.effectivity,
                    header: ElementHeader::initial(user_id, now),
                },
            );
            if previous.is_some() {
                return Err(MetadataError::invalid(
                    "classifications",
                    format!("classification {} listed twice", c.name),
                ));
            }
        }

        let guid = Guid::new_v4();
        let parent = element
            .parent
            .as_ref()
            .map(|p| state.parent_relationship(guid, p, user_id, now))
            .transpose()?;

        state.push_element(OpenMetadataElement {
            guid,
            type_name: element.type_name.clone(),
            status: element.status,
            properties: element.properties.clone(),
            classifications,
            anchor,
            effectivity: element.effectivity,
            header: ElementHeader::initial(user_id, now),
        });
        if let Some(parent) = parent {
            state.push_relationship(parent);
        }
        Ok(guid)
    }

    fn create_element_from_template(
        &self,
        user_id: &str,
        template: &TemplateOptions,
        syntax: &PlaceholderSyntax,
        options: &QueryOptions,
    ) -> MetadataResult<Guid> {
        let now = self.now();
        let mut state = self.state.write();

        let root = state
            .resolved(template.template_guid, options)
            .filter(|e| e.is_visible(options))
            .ok_or(MetadataError::ElementNotFound(template.template_guid))?;
        self.check(user_id, AccessAction::Create, &root.type_name)?;
        if let Some(anchor) = template.anchor_guid {
            state.live(anchor)?;
        }
        if let Some(parent) = &template.parent {
            state.live(parent.parent_guid)?;
        }

        let member_guids = state.anchored_closure(template.template_guid);
        let members: Vec<&OpenMetadataElement> = member_guids
            .iter()
            .filter_map(|g| state.current(*g))
            .filter(|e| e.status != ElementStatus::Deleted)
            .collect();
        let inside: BTreeSet<Guid> = std::iter::once(root.guid)
            .chain(members.iter().map(|e| e.guid))
            .collect();
        let relationships: Vec<&Relationship> = state
            .relationships
            .values()
            .filter_map(|h| h.last())
            .filter(|r| {
                r.status != ElementStatus::Deleted
                    && inside.contains(&r.end1_guid)
                    && inside.contains(&r.end2_guid)
            })
            .collect();

        let source = TemplateSource {
            root,
            members,
            relationships,
        };
        let placeholders = Placeholders::with_syntax(&template.placeholder_properties, syntax);
        let plan = plan_template(&source, template, &placeholders, user_id, now)?;

        debug!(
            template = %template.template_guid,
            elements = plan.elements.len(),
            relationships = plan.relationships.len(),
            "applying template plan"
        );
        let root_guid = plan.root_guid;
        for element in plan.elements {
            state.push_element(element);
        }
        for relationship in plan.relationships {
            state.push_relationship(relationship);
        }
        Ok(root_guid)
    }

    fn get_element(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<OpenMetadataElement>> {
        let state = self.state.read();
        let Some(element) = state.visible_element(guid, options) else {
            return Ok(None);
        };
        self.check(user_id, AccessAction::Read, &element.type_name)?;
        Ok(Some(element))
    }

    fn find_elements(
        &self,
        user_id: &str,
        query: &ElementQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        self.check(
            user_id,
            AccessAction::Read,
            query.type_name.as_deref().unwrap_or("OpenMetadataRoot"),
        )?;
        let filter = ElementFilter::compile(
            query.type_name.as_deref(),
            query.search_properties.as_ref(),
            query.search_classifications.as_ref(),
        )?;

        let state = self.state.read();
        let mut results: Vec<OpenMetadataElement> = state
            .elements
            .keys()
            .filter_map(|guid| state.visible_element(*guid, options))
            .filter(|e| query.anchor_guid.is_none_or(|a| e.anchor_guid() == Some(a)))
            .filter(|e| filter.matches(e, options.effective_time))
            .collect();
        sequence_elements(
            &mut results,
            options.sequencing_order,
            options.sequencing_property.as_deref(),
        );
        Ok(paging.apply(results))
    }

    fn element_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        let state = self.state.read();
        let current = state
            .current(guid)
            .ok_or(MetadataError::ElementNotFound(guid))?;
        if current.status.is_terminal() && !options.for_lineage {
            return Err(MetadataError::ElementNotFound(guid));
        }
        self.check(user_id, AccessAction::Read, &current.type_name)?;
        let history = state.elements.get(&guid).map(Vec::as_slice).unwrap_or_default();
        Ok(select_history(history, request))
    }

    fn update_element(
        &self,
        user_id: &str,
        guid: Guid,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Update, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            if replace_all {
                e.properties = properties.clone();
            } else {
                e.properties.merge(properties);
            }
            Ok(())
        })
    }

    fn update_element_status(
        &self,
        user_id: &str,
        guid: Guid,
        status: ElementStatus,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        if status.is_terminal() {
            return Err(MetadataError::invalid(
                "newElementStatus",
                format!("use the archive or delete operation to set {}", status),
            ));
        }
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Update, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            e.status = status;
            Ok(())
        })
    }

    fn update_element_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        effectivity.validate("effectiveTo")?;
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Update, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            e.effectivity = effectivity;
            Ok(())
        })
    }

    fn delete_element(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let root = state.mutable(guid, options, true)?.clone();
        self.check(user_id, AccessAction::Delete, &root.type_name)?;

        let cascade: Vec<OpenMetadataElement> = state
            .anchored_closure(guid)
            .into_iter()
            .filter_map(|g| state.current(g))
            .filter(|e| e.status != ElementStatus::Deleted)
            .cloned()
            .collect();
        let mut deleted = BTreeSet::from([guid]);
        deleted.extend(cascade.iter().map(|e| e.guid));

        for element in std::iter::once(root).chain(cascade) {
            state.revise_element(element, user_id, now, |e| {
                e.status = ElementStatus::Deleted;
                Ok(())
            })?;
        }
        let relationships = state.delete_touching(&deleted, user_id, now);
        debug!(
            guid = %guid,
            elements = deleted.len(),
            relationships,
            "delete cascaded"
        );
        Ok(())
    }

    fn archive_element(
        &self,
        user_id: &str,
        guid: Guid,
        archive: &ArchiveProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let root = state.mutable(guid, options, true)?.clone();
        if root.status == ElementStatus::Archived {
            return Err(MetadataError::invalid(
                "elementGUID",
                format!("element {} is already archived", guid),
            ));
        }
        self.check(user_id, AccessAction::Delete, &root.type_name)?;

        let mut memento = archive.archive_properties.clone();
        memento.insert(
            "archiveDate",
            PropertyValue::Date(archive.archive_date.unwrap_or(now)),
        );
        memento.insert("archiveUser", user_id);
        if let Some(process) = &archive.archive_process {
            memento.insert("archiveProcess", process.as_str());
        }

        let cascade: Vec<OpenMetadataElement> = state
            .anchored_closure(guid)
            .into_iter()
            .filter_map(|g| state.current(g))
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect();
        let count = cascade.len();

        state.revise_element(root, user_id, now, |e| {
            e.status = ElementStatus::Archived;
            e.classifications.insert(
                MEMENTO_CLASSIFICATION.to_string(),
                Classification {
                    name: MEMENTO_CLASSIFICATION.to_string(),
                    properties: memento,
                    effectivity: EffectivityWindow::unbounded(),
                    header: ElementHeader::initial(user_id, now),
                },
            );
            Ok(())
        })?;
        for element in cascade {
            state.revise_element(element, user_id, now, |e| {
                e.status = ElementStatus::Archived;
                Ok(())
            })?;
        }
        debug!(guid = %guid, anchored = count, "archive cascaded");
        Ok(())
    }

    fn restore_element(
        &self,
        user_id: &str,
        guid: Guid,
        _options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let root = state
            .current(guid)
            .cloned()
            .ok_or(MetadataError::ElementNotFound(guid))?;
        if !root.status.is_terminal() {
            return Err(MetadataError::invalid(
                "elementGUID",
                format!("element {} is {}, not archived or deleted", guid, root.status),
            ));
        }
        self.check(user_id, AccessAction::Update, &root.type_name)?;

        let terminal = root.status;
        let cascade: Vec<OpenMetadataElement> = state
            .anchored_closure(guid)
            .into_iter()
            .filter_map(|g| state.current(g))
            .filter(|e| e.status == terminal)
            .cloned()
            .collect();

        let mut restored = BTreeSet::new();
        for element in std::iter::once(root).chain(cascade) {
            let status = state
                .elements
                .get(&element.guid)
                .map(|h| StoreState::last_live_status(h.iter().map(|v| &v.status)))
                .unwrap_or(ElementStatus::Active);
            restored.insert(element.guid);
            state.revise_element(element, user_id, now, |e| {
                e.status = status;
                e.classifications.remove(MEMENTO_CLASSIFICATION);
                Ok(())
            })?;
        }

        // Relationships removed by a delete cascade come back once both ends
        // are live. Relationships deleted on their own stay deleted.
        let revived: Vec<(Relationship, ElementStatus)> = state
            .relationships
            .values()
            .filter_map(|h| {
                let current = h.last()?;
                let touches = restored.contains(&current.end1_guid)
                    || restored.contains(&current.end2_guid);
                let ends_live =
                    state.live(current.end1_guid).is_ok() && state.live(current.end2_guid).is_ok();
                let revivable =
                    current.status == ElementStatus::Deleted && current.cascade_deleted;
                (revivable && touches && ends_live).then(|| {
                    (
                        current.clone(),
                        StoreState::last_live_status(h.iter().map(|v| &v.status)),
                    )
                })
            })
            .collect();
        for (relationship, status) in revived {
            state.revise_relationship(relationship, user_id, now, |r| {
                r.status = status;
                r.cascade_deleted = false;
            });
        }
        debug!(guid = %guid, elements = restored.len(), "restore cascaded");
        Ok(())
    }

    fn classify_element(
        &self,
        user_id: &str,
        guid: Guid,
        classification: &NewClassification,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Classify, &current.type_name)?;
        if current.is_classified(&classification.name) {
            return Err(MetadataError::AlreadyClassified {
                guid,
                classification: classification.name.clone(),
            });
        }
        state.revise_element(current, user_id, now, |e| {
            e.classifications.insert(
                classification.name.clone(),
                Classification {
                    name: classification.name.clone(),
                    properties: classification.properties.clone(),
                    effectivity: classification.effectivity,
                    header: ElementHeader::initial(user_id, now),
                },
            );
            Ok(())
        })
    }

    fn reclassify_element(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Classify, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            let c = e
                .classifications
                .get_mut(name)
                .ok_or_else(|| MetadataError::NotClassified {
                    guid,
                    classification: name.to_string(),
                })?;
            if replace_all {
                c.properties = properties.clone();
            } else {
                c.properties.merge(properties);
            }
            c.header = c.header.next(user_id, now);
            Ok(())
        })
    }

    fn update_classification_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        effectivity.validate("effectiveTo")?;
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Classify, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            let c = e
                .classifications
                .get_mut(name)
                .ok_or_else(|| MetadataError::NotClassified {
                    guid,
                    classification: name.to_string(),
                })?;
            c.effectivity = effectivity;
            c.header = c.header.next(user_id, now);
            Ok(())
        })
    }

    fn declassify_element(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable(guid, options, false)?.clone();
        self.check(user_id, AccessAction::Classify, &current.type_name)?;
        state.revise_element(current, user_id, now, |e| {
            e.classifications
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| MetadataError::NotClassified {
                    guid,
                    classification: name.to_string(),
                })
        })
    }

    fn create_relationship(
        &self,
        user_id: &str,
        relationship: &NewRelationship,
        relationship_options: &RelationshipOptions,
        _options: &QueryOptions,
    ) -> MetadataResult<Guid> {
        relationship_options.validate()?;
        self.check(user_id, AccessAction::Relate, &relationship.type_name)?;
        let now = self.now();
        let mut state = self.state.write();
        let end1 = state.live(relationship.end1_guid)?.clone();
        let end2 = state.live(relationship.end2_guid)?.clone();

        let reanchor = match relationship_options.make_anchor {
            AnchorDirection::None => None,
            AnchorDirection::End1AnchorsEnd2 => Some((end2, end1)),
            AnchorDirection::End2AnchorsEnd1 => Some((end1, end2)),
        };
        if let Some((child, anchor)) = &reanchor {
            if state.anchor_cycle(child.guid, anchor.guid) {
                return Err(MetadataError::invalid(
                    "makeAnchor",
                    format!("anchoring {} on {} creates a cycle", child.guid, anchor.guid),
                ));
            }
        }

        let created = StoreState::new_relationship(relationship, user_id, now);
        let guid = created.guid;
        state.push_relationship(created);

        if let Some((child, anchor)) = reanchor {
            let anchor_ref = AnchorRef {
                anchor_guid: anchor.guid,
                anchor_type_name: Some(anchor.type_name.clone()),
                anchor_scope_guid: relationship_options.anchor_scope_guid,
            };
            debug!(child = %child.guid, anchor = %anchor.guid, "re-anchoring element");
            state.revise_element(child, user_id, now, |e| {
                e.anchor = Some(anchor_ref);
                Ok(())
            })?;
        }
        Ok(guid)
    }

    fn get_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<Relationship>> {
        let state = self.state.read();
        let Some(relationship) = state.visible_relationship(guid, options) else {
            return Ok(None);
        };
        self.check(user_id, AccessAction::Read, &relationship.type_name)?;
        Ok(Some(relationship))
    }

    fn find_relationships(
        &self,
        user_id: &str,
        query: &RelationshipQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<Relationship>> {
        self.check(
            user_id,
            AccessAction::Read,
            query.type_name.as_deref().unwrap_or("Relationship"),
        )?;
        let filter =
            ElementFilter::compile(query.type_name.as_deref(), query.search_properties.as_ref(), None)?;
        let state = self.state.read();
        let results: Vec<Relationship> = state
            .relationships
            .keys()
            .filter_map(|guid| state.visible_relationship(*guid, options))
            .filter(|r| query.end1_guid.is_none_or(|g| r.end1_guid == g))
            .filter(|r| query.end2_guid.is_none_or(|g| r.end2_guid == g))
            .filter(|r| filter.matches_relationship(r))
            .collect();
        Ok(paging.apply(results))
    }

    fn relationship_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<Relationship>> {
        let state = self.state.read();
        let current = state
            .current_relationship(guid)
            .ok_or(MetadataError::RelationshipNotFound(guid))?;
        if current.status.is_terminal() && !options.for_lineage {
            return Err(MetadataError::RelationshipNotFound(guid));
        }
        self.check(user_id, AccessAction::Read, &current.type_name)?;
        let history = state
            .relationships
            .get(&guid)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(select_history(history, request))
    }

    fn related_elements(
        &self,
        user_id: &str,
        guid: Guid,
        starting_end: RelationshipEnd,
        relationship_type: Option<&str>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<RelatedElement>> {
        let state = self.state.read();
        let start = state
            .visible_element(guid, options)
            .ok_or(MetadataError::ElementNotFound(guid))?;
        self.check(user_id, AccessAction::Read, &start.type_name)?;

        let results: Vec<RelatedElement> = state
            .relationships
            .keys()
            .filter_map(|g| state.visible_relationship(*g, options))
            .filter(|r| relationship_type.is_none_or(|t| r.type_name == t))
            .filter(|r| match starting_end {
                RelationshipEnd::Either => r.touches(guid),
                RelationshipEnd::End1 => r.end1_guid == guid || (!r.directed && r.end2_guid == guid),
                RelationshipEnd::End2 => r.end2_guid == guid || (!r.directed && r.end1_guid == guid),
            })
            .filter_map(|r| {
                let other = r.other_end(guid)?;
                let element = state.visible_element(other, options)?;
                Some(RelatedElement {
                    relationship: r,
                    element,
                })
            })
            .collect();
        Ok(paging.apply(results))
    }

    fn update_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable_relationship(guid, options)?.clone();
        self.check(user_id, AccessAction::Relate, &current.type_name)?;
        state.revise_relationship(current, user_id, now, |r| {
            if replace_all {
                r.properties = properties.clone();
            } else {
                r.properties.merge(properties);
            }
        });
        Ok(())
    }

    fn update_relationship_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        effectivity.validate("effectiveTo")?;
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable_relationship(guid, options)?.clone();
        self.check(user_id, AccessAction::Relate, &current.type_name)?;
        state.revise_relationship(current, user_id, now, |r| r.effectivity = effectivity);
        Ok(())
    }

    fn delete_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = state.mutable_relationship(guid, options)?.clone();
        self.check(user_id, AccessAction::Delete, &current.type_name)?;
        state.revise_relationship(current, user_id, now, |r| {
            r.status = ElementStatus::Deleted;
        });
        Ok(())
    }

    fn add_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid> {
        self.check(user_id, AccessAction::Correlate, &request.element_type_name)?;
        let now = self.now();
        let mut state = self.state.write();
        let element = state.live(request.element_guid)?;
        if element.type_name != request.element_type_name {
            return Err(MetadataError::invalid(
                "elementTypeName",
                format!(
                    "element {} is a {}, not a {}",
                    request.element_guid, element.type_name, request.element_type_name
                ),
            ));
        }
        state.ledger.add(request.clone(), user_id, now)
    }

    fn update_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid> {
        self.check(user_id, AccessAction::Correlate, &request.element_type_name)?;
        let now = self.now();
        let mut state = self.state.write();
        state.ledger.update(request.clone(), user_id, now)
    }

    fn remove_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
    ) -> MetadataResult<()> {
        let mut state = self.state.write();
        let type_name = state
            .current(element_guid)
            .map(|e| e.type_name.clone())
            .unwrap_or_default();
        self.check(user_id, AccessAction::Correlate, &type_name)?;
        let removed = state.ledger.remove(scope_guid, identifier, element_guid)?;
        debug!(scope = %scope_guid, identifier, removed = removed.len(), "removed correlation");
        Ok(())
    }

    fn confirm_synchronization(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
    ) -> MetadataResult<()> {
        self.check(user_id, AccessAction::Correlate, element_type_name)?;
        let now = self.now();
        let mut state = self.state.write();
        state
            .ledger
            .confirm(scope_guid, identifier, element_guid, element_type_name, now)
            .map(|_| ())
    }

    fn validate_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
        effective_time: Option<Timestamp>,
    ) -> MetadataResult<bool> {
        self.check(user_id, AccessAction::Read, element_type_name)?;
        let state = self.state.read();
        Ok(state.ledger.validate(
            scope_guid,
            identifier,
            element_guid,
            element_type_name,
            effective_time,
        ))
    }

    fn elements_for_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        let state = self.state.read();
        let mut seen = BTreeSet::new();
        let mut elements = Vec::new();
        for header in state
            .ledger
            .elements_for(scope_guid, identifier, options.effective_time)?
        {
            if !seen.insert(header.element_guid) {
                continue;
            }
            if let Some(element) = state.visible_element(header.element_guid, options) {
                self.check(user_id, AccessAction::Read, &element.type_name)?;
                elements.push(element);
            }
        }
        Ok(paging.apply(elements))
    }

    fn external_identifiers(
        &self,
        user_id: &str,
        scope_guid: Guid,
        element_guid: Guid,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<CorrelationHeader>> {
        let state = self.state.read();
        let element = state
            .visible_element(element_guid, options)
            .ok_or(MetadataError::ElementNotFound(element_guid))?;
        self.check(user_id, AccessAction::Read, &element.type_name)?;
        let headers: Vec<CorrelationHeader> = state
            .ledger
            .identifiers_for(scope_guid, element_guid, options.effective_time)
            .into_iter()
            .cloned()
            .collect();
        Ok(paging.apply(headers))
    }

    fn statistics(&self) -> MetadataResult<StoreStatistics> {
        let state = self.state.read();
        Ok(StoreStatistics {
            elements: state.elements.len(),
            relationships: state.relationships.len(),
            correlations: state.ledger.len(),
            element_versions: state.elements.values().map(Vec::len).sum(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DenyList, ManualClock};
    use crate::ErrorKind;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(Timestamp(1_000)));
        (MemoryStore::new().with_clock(clock.clone()), clock)
    }

    fn glossary(name: &str) -> NewElement {
        NewElement::new("Glossary")
            .with_properties(ElementProperties::new().with("qualifiedName", name))
    }

    #[test]
    fn create_and_get() {
        let (store, _) = store();
        let guid = store
            .create_element("u", &glossary("G:1"))
            .expect("create");
        let element = store
            .get_element("u", guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(element.header.version, 1);
        assert_eq!(element.header.created_by, "u");
        assert_eq!(element.properties.get_str("qualifiedName"), Some("G:1"));
    }

    #[test]
    fn unknown_guid_is_none_not_error() {
        let (store, _) = store();
        let found = store
            .get_element("u", Guid::new_v4(), &QueryOptions::new())
            .expect("lookup");
        assert!(found.is_none());
    }

    #[test]
    fn updates_create_versions() {
        let (store, clock) = store();
        let guid = store.create_element("u", &glossary("G:1")).expect("create");
        clock.advance(10);
        store
            .update_element(
                "v",
                guid,
                &ElementProperties::new().with("description", "d"),
                false,
                &QueryOptions::new(),
            )
            .expect("update");

        let element = store
            .get_element("u", guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(element.header.version, 2);
        assert_eq!(element.header.updated_by.as_deref(), Some("v"));
        assert_eq!(element.properties.len(), 2);

        let history = store
            .element_history("u", guid, &HistoryRequest::default(), &QueryOptions::new())
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].header.version, 2);

        let as_of = store
            .get_element("u", guid, &QueryOptions::new().as_of(Timestamp(1_005)))
            .expect("get")
            .expect("present");
        assert_eq!(as_of.header.version, 1);
    }

    #[test]
    fn replace_all_drops_old_properties() {
        let (store, _) = store();
        let guid = store.create_element("u", &glossary("G:1")).expect("create");
        store
            .update_element(
                "u",
                guid,
                &ElementProperties::new().with("name", "n"),
                true,
                &QueryOptions::new(),
            )
            .expect("update");
        let element = store
            .get_element("u", guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert!(element.properties.get("qualifiedName").is_none());
    }

    #[test]
    fn mutating_deleted_element_is_not_found() {
        let (store, _) = store();
        let guid = store.create_element("u", &glossary("G:1")).expect("create");
        store
            .delete_element("u", guid, &QueryOptions::new())
            .expect("delete");
        let err = store
            .update_element(
                "u",
                guid,
                &ElementProperties::new(),
                false,
                &QueryOptions::new(),
            )
            .expect_err("deleted");
        assert_eq!(err, MetadataError::ElementNotFound(guid));
    }

    #[test]
    fn delete_cascades_to_anchored_and_relationships() {
        let (store, _) = store();
        let a = store.create_element("u", &glossary("A")).expect("a");
        let b = store
            .create_element("u", &NewElement::new("GlossaryTerm").anchored_on(a))
            .expect("b");
        let c = store
            .create_element("u", &NewElement::new("GlossaryTerm").anchored_on(b))
            .expect("c");
        let other = store.create_element("u", &glossary("Other")).expect("other");
        let rel = store
            .create_relationship(
                "u",
                &NewRelationship::new("RelatedTerm", c, other),
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("rel");

        store
            .delete_element("u", a, &QueryOptions::new())
            .expect("delete");

        for guid in [a, b, c] {
            assert!(store
                .get_element("u", guid, &QueryOptions::new())
                .expect("get")
                .is_none());
            assert!(store
                .get_element("u", guid, &QueryOptions::lineage())
                .expect("get")
                .is_some());
        }
        assert!(store
            .get_relationship("u", rel, &QueryOptions::new())
            .expect("get")
            .is_none());
        assert!(store
            .get_element("u", other, &QueryOptions::new())
            .expect("get")
            .is_some());
    }

    #[test]
    fn archive_and_restore() {
        let (store, _) = store();
        let a = store.create_element("u", &glossary("A")).expect("a");
        let b = store
            .create_element("u", &NewElement::new("GlossaryTerm").anchored_on(a))
            .expect("b");

        store
            .archive_element(
                "archivist",
                a,
                &ArchiveProperties {
                    archive_process: Some("cleanup".to_string()),
                    ..ArchiveProperties::default()
                },
                &QueryOptions::new(),
            )
            .expect("archive");

        assert!(store
            .get_element("u", a, &QueryOptions::new())
            .expect("get")
            .is_none());
        assert!(store
            .get_element("u", b, &QueryOptions::new())
            .expect("get")
            .is_none());
        let archived = store
            .get_element("u", a, &QueryOptions::lineage())
            .expect("get")
            .expect("lineage");
        let memento = archived
            .classification(MEMENTO_CLASSIFICATION)
            .expect("memento");
        assert_eq!(memento.properties.get_str("archiveUser"), Some("archivist"));
        assert_eq!(memento.properties.get_str("archiveProcess"), Some("cleanup"));

        store
            .restore_element("u", a, &QueryOptions::new())
            .expect("restore");
        let back = store
            .get_element("u", a, &QueryOptions::new())
            .expect("get")
            .expect("restored");
        assert_eq!(back.status, ElementStatus::Active);
        assert!(!back.is_classified(MEMENTO_CLASSIFICATION));
        assert!(store
            .get_element("u", b, &QueryOptions::new())
            .expect("get")
            .is_some());
    }

    #[test]
    fn restore_brings_back_prior_status_and_relationships() {
        let (store, _) = store();
        let a = store
            .create_element("u", &glossary("A").with_status(ElementStatus::Draft))
            .expect("a");
        let b = store.create_element("u", &glossary("B")).expect("b");
        let rel = store
            .create_relationship(
                "u",
                &NewRelationship::new("Link", a, b),
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("rel");
        store
            .delete_element("u", a, &QueryOptions::new())
            .expect("delete");
        store
            .restore_element("u", a, &QueryOptions::new())
            .expect("restore");

        let back = store
            .get_element("u", a, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(back.status, ElementStatus::Draft);
        assert!(store
            .get_relationship("u", rel, &QueryOptions::new())
            .expect("get")
            .is_some());
    }

    #[test]
    fn classification_exclusivity() {
        let (store, _) = store();
        let guid = store.create_element("u", &glossary("G")).expect("create");
        let confidentiality = NewClassification::new("Confidentiality")
            .with_properties(ElementProperties::new().with("level", 1_i64));

        store
            .classify_element("u", guid, &confidentiality, &QueryOptions::new())
            .expect("classify");
        let err = store
            .classify_element("u", guid, &confidentiality, &QueryOptions::new())
            .expect_err("duplicate");
        assert!(matches!(err, MetadataError::AlreadyClassified { .. }));

        store
            .reclassify_element(
                "u",
                guid,
                "Confidentiality",
                &ElementProperties::new().with("level", 3_i64),
                false,
                &QueryOptions::new(),
            )
            .expect("reclassify");
        let element = store
            .get_element("u", guid, &QueryOptions::new())
            .expect("get")
            .expect("present");
        let c = element.classification("Confidentiality").expect("classified");
        assert_eq!(c.properties.get("level"), Some(&PropertyValue::Int(3)));
        assert_eq!(c.header.version, 2);

        store
            .declassify_element("u", guid, "Confidentiality", &QueryOptions::new())
            .expect("declassify");
        let err = store
            .declassify_element("u", guid, "Confidentiality", &QueryOptions::new())
            .expect_err("gone");
        assert!(matches!(err, MetadataError::NotClassified { .. }));
    }

    #[test]
    fn make_anchor_reanchors_and_rejects_cycles() {
        let (store, _) = store();
        let a = store.create_element("u", &glossary("A")).expect("a");
        let b = store.create_element("u", &glossary("B")).expect("b");

        let anchor_b_on_a = RelationshipOptions {
            make_anchor: AnchorDirection::End1AnchorsEnd2,
            ..RelationshipOptions::default()
        };
        store
            .create_relationship(
                "u",
                &NewRelationship::new("Owns", a, b),
                &anchor_b_on_a,
                &QueryOptions::new(),
            )
            .expect("anchor");
        let b_now = store
            .get_element("u", b, &QueryOptions::new())
            .expect("get")
            .expect("present");
        assert_eq!(b_now.anchor_guid(), Some(a));

        let err = store
            .create_relationship(
                "u",
                &NewRelationship::new("Owns", b, a),
                &anchor_b_on_a,
                &QueryOptions::new(),
            )
            .expect_err("cycle");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn related_elements_respect_direction() {
        let (store, _) = store();
        let a = store.create_element("u", &glossary("A")).expect("a");
        let b = store.create_element("u", &glossary("B")).expect("b");
        let c = store.create_element("u", &glossary("C")).expect("c");
        store
            .create_relationship(
                "u",
                &NewRelationship::new("Directed", a, b),
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("ab");
        store
            .create_relationship(
                "u",
                &NewRelationship::new("Peer", c, a).undirected(),
                &RelationshipOptions::default(),
                &QueryOptions::new(),
            )
            .expect("ca");

        let from_end1 = store
            .related_elements(
                "u",
                a,
                RelationshipEnd::End1,
                None,
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("related");
        let mut guids: Vec<Guid> = from_end1.iter().map(|r| r.element.guid).collect();
        guids.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(guids, expected);

        let from_end2 = store
            .related_elements(
                "u",
                a,
                RelationshipEnd::End2,
                Some("Directed"),
                &QueryOptions::new(),
                Paging::all(),
            )
            .expect("related");
        assert!(from_end2.is_empty());
    }

    #[test]
    fn access_denial_surfaces_unchanged() {
        let (store, _) = store();
        let store = store.with_access_control(Arc::new(DenyList::new().deny_user("mallory")));
        let err = store
            .create_element("mallory", &glossary("G"))
            .expect_err("denied");
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn snapshot_roundtrip_preserves_history() {
        let (store, _) = store();
        let guid = store.create_element("u", &glossary("G")).expect("create");
        store
            .update_element(
                "u",
                guid,
                &ElementProperties::new().with("x", 1_i64),
                false,
                &QueryOptions::new(),
            )
            .expect("update");

        let restored = MemoryStore::from_snapshot(store.snapshot()).expect("restore");
        let stats = restored.statistics().expect("stats");
        assert_eq!(stats.elements, 1);
        assert_eq!(stats.element_versions, 2);
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn malformed_snapshot_rejected() {
        let snapshot = StoreSnapshot {
            elements: vec![Vec::new()],
            ..StoreSnapshot::default()
        };
        assert!(MemoryStore::from_snapshot(snapshot).is_err());
    }
}
