//! # Store Contract
//!
//! The outbound contract of the metadata core: every logical operation the
//! facade needs from a backing store, plus the request shapes it sends.
//!
//! A store owns elements, relationships, classifications, history and the
//! correlation ledger. It is the single source of truth for serializing
//! conflicting writes, so every method takes `&self` and implementations
//! do their own locking.
//!
//! `user_id` is opaque here: it is forwarded to [`AccessControl`] and stamped
//! on audit headers, never interpreted.

use crate::correlation::{CorrelationHeader, CorrelationRequest};
use crate::element::{
    AnchorRef, EffectivityWindow, HistoryRequest, OpenMetadataElement, Paging, QueryOptions,
    Relationship,
};
use crate::search::{SearchClassifications, SearchProperties};
use crate::template::{PlaceholderSyntax, TemplateOptions};
use crate::{ElementProperties, ElementStatus, Guid, MetadataError, MetadataResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

// =============================================================================
// REQUEST SHAPES
// =============================================================================

/// A classification to attach to an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClassification {
    pub name: String,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub effectivity: EffectivityWindow,
}

impl NewClassification {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: ElementProperties::new(),
            effectivity: EffectivityWindow::unbounded(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ElementProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Link a new element to an existing parent with a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_guid: Guid,
    pub relationship_type: String,
    /// `true` puts the parent at end 1 of the new relationship.
    #[serde(default = "default_true")]
    pub parent_at_end1: bool,
    #[serde(default)]
    pub properties: ElementProperties,
}

fn default_true() -> bool {
    true
}

/// An element to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewElement {
    pub type_name: String,
    #[serde(default)]
    pub status: ElementStatus,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub classifications: Vec<NewClassification>,
    #[serde(default)]
    pub anchor: Option<AnchorRef>,
    #[serde(default)]
    pub parent: Option<ParentLink>,
    #[serde(default)]
    pub effectivity: EffectivityWindow,
}

impl NewElement {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            status: ElementStatus::Active,
            properties: ElementProperties::new(),
            classifications: Vec::new(),
            anchor: None,
            parent: None,
            effectivity: EffectivityWindow::unbounded(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ElementStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ElementProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_classification(mut self, classification: NewClassification) -> Self {
        self.classifications.push(classification);
        self
    }

    #[must_use]
    pub fn anchored_on(mut self, anchor_guid: Guid) -> Self {
        self.anchor = Some(AnchorRef::new(anchor_guid));
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn effective(mut self, effectivity: EffectivityWindow) -> Self {
        self.effectivity = effectivity;
        self
    }
}

/// A relationship to create. Direction is declared by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelationship {
    pub type_name: String,
    pub end1_guid: Guid,
    pub end2_guid: Guid,
    #[serde(default = "default_true")]
    pub directed: bool,
    #[serde(default)]
    pub status: ElementStatus,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub effectivity: EffectivityWindow,
}

impl NewRelationship {
    #[must_use]
    pub fn new(type_name: impl Into<String>, end1_guid: Guid, end2_guid: Guid) -> Self {
        Self {
            type_name: type_name.into(),
            end1_guid,
            end2_guid,
            directed: true,
            status: ElementStatus::Active,
            properties: ElementProperties::new(),
            effectivity: EffectivityWindow::unbounded(),
        }
    }

    #[must_use]
    pub fn undirected(mut self) -> Self {
        self.directed = false;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ElementProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Which end of a new relationship, if any, becomes the other end's anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorDirection {
    #[default]
    None,
    /// End 2 is re-anchored onto end 1.
    End1AnchorsEnd2,
    /// End 1 is re-anchored onto end 2.
    End2AnchorsEnd1,
}

/// Side effects of relationship creation. Re-anchoring only ever comes from here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipOptions {
    pub make_anchor: AnchorDirection,
    pub anchor_scope_guid: Option<Guid>,
    /// When set, must agree with `make_anchor`.
    pub is_parent_at_end1: Option<bool>,
}

impl RelationshipOptions {
    /// Reject option combinations that contradict each other.
    pub fn validate(&self) -> MetadataResult<()> {
        match (self.make_anchor, self.is_parent_at_end1) {
            (AnchorDirection::End1AnchorsEnd2, Some(false))
            | (AnchorDirection::End2AnchorsEnd1, Some(true)) => Err(MetadataError::invalid(
                "isParentAtEnd1",
                format!(
                    "makeAnchor {:?} contradicts isParentAtEnd1 = {}",
                    self.make_anchor,
                    self.is_parent_at_end1.unwrap_or_default()
                ),
            )),
            (AnchorDirection::None, _) if self.anchor_scope_guid.is_some() => {
                Err(MetadataError::invalid(
                    "anchorScopeGUID",
                    "anchor scope given without makeAnchor",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Which end the starting element occupies in a related-elements query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipEnd {
    #[default]
    Either,
    End1,
    End2,
}

impl RelationshipEnd {
    /// 0 = either end, 1 = end 1, 2 = end 2.
    pub fn from_index(index: u8) -> MetadataResult<Self> {
        match index {
            0 => Ok(Self::Either),
            1 => Ok(Self::End1),
            2 => Ok(Self::End2),
            other => Err(MetadataError::invalid(
                "startingAtEnd",
                format!("must be 0, 1 or 2, got {}", other),
            )),
        }
    }
}

/// Element search request: type filter plus both search axes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementQuery {
    pub type_name: Option<String>,
    pub search_properties: Option<SearchProperties>,
    pub search_classifications: Option<SearchClassifications>,
    /// Restrict results to elements anchored on this GUID.
    pub anchor_guid: Option<Guid>,
}

/// Relationship search request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipQuery {
    pub type_name: Option<String>,
    pub end1_guid: Option<Guid>,
    pub end2_guid: Option<Guid>,
    pub search_properties: Option<SearchProperties>,
}

/// Properties recorded on the `Memento` of an archived element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveProperties {
    pub archive_date: Option<Timestamp>,
    pub archive_process: Option<String>,
    pub archive_properties: ElementProperties,
}

/// One hop from a starting element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedElement {
    pub relationship: Relationship,
    pub element: OpenMetadataElement,
}

/// Record counts for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub elements: usize,
    pub relationships: usize,
    pub correlations: usize,
    pub element_versions: usize,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Backing store operations.
///
/// Reads take the caller's [`QueryOptions`] unchanged. Mutations take them
/// too, to locate their target under the same visibility rules.
pub trait MetadataStore: Send + Sync {
    // --- elements -----------------------------------------------------------

    fn create_element(&self, user_id: &str, element: &NewElement) -> MetadataResult<Guid>;

    /// Deep-copy a template's anchored sub-graph as one atomic creation.
    fn create_element_from_template(
        &self,
        user_id: &str,
        template: &TemplateOptions,
        syntax: &PlaceholderSyntax,
        options: &QueryOptions,
    ) -> MetadataResult<Guid>;

    /// `Ok(None)` when no visible element has this GUID.
    fn get_element(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<OpenMetadataElement>>;

    fn find_elements(
        &self,
        user_id: &str,
        query: &ElementQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>>;

    fn element_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<OpenMetadataElement>>;

    fn update_element(
        &self,
        user_id: &str,
        guid: Guid,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn update_element_status(
        &self,
        user_id: &str,
        guid: Guid,
        status: ElementStatus,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn update_element_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    /// Delete the element, everything anchored on it, and touching relationships.
    fn delete_element(&self, user_id: &str, guid: Guid, options: &QueryOptions)
    -> MetadataResult<()>;

    fn archive_element(
        &self,
        user_id: &str,
        guid: Guid,
        archive: &ArchiveProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn restore_element(&self, user_id: &str, guid: Guid, options: &QueryOptions)
    -> MetadataResult<()>;

    // --- classifications ----------------------------------------------------

    fn classify_element(
        &self,
        user_id: &str,
        guid: Guid,
        classification: &NewClassification,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn reclassify_element(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn update_classification_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn declassify_element(
        &self,
        user_id: &str,
        guid: Guid,
        name: &str,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    // --- relationships ------------------------------------------------------

    fn create_relationship(
        &self,
        user_id: &str,
        relationship: &NewRelationship,
        relationship_options: &RelationshipOptions,
        options: &QueryOptions,
    ) -> MetadataResult<Guid>;

    fn get_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<Relationship>>;

    fn find_relationships(
        &self,
        user_id: &str,
        query: &RelationshipQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<Relationship>>;

    fn relationship_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<Relationship>>;

    fn related_elements(
        &self,
        user_id: &str,
        guid: Guid,
        starting_end: RelationshipEnd,
        relationship_type: Option<&str>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<RelatedElement>>;

    fn update_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        properties: &ElementProperties,
        replace_all: bool,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn update_relationship_effectivity(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    fn delete_relationship(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()>;

    // --- correlation --------------------------------------------------------

    fn add_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid>;

    fn update_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid>;

    /// Remove the mapping only; the element is never touched.
    fn remove_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
    ) -> MetadataResult<()>;

    fn confirm_synchronization(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
    ) -> MetadataResult<()>;

    fn validate_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
        effective_time: Option<Timestamp>,
    ) -> MetadataResult<bool>;

    fn elements_for_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>>;

    fn external_identifiers(
        &self,
        user_id: &str,
        scope_guid: Guid,
        element_guid: Guid,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<CorrelationHeader>>;

    // --- housekeeping -------------------------------------------------------

    fn statistics(&self) -> MetadataResult<StoreStatistics>;
}

// =============================================================================
// ACCESS CONTROL
// =============================================================================

/// What a caller is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Read,
    Create,
    Update,
    Delete,
    Classify,
    Relate,
    Correlate,
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Classify => "classify",
            Self::Relate => "relate",
            Self::Correlate => "correlate",
        };
        f.write_str(s)
    }
}

/// Authorization hook consulted by a store before every operation.
pub trait AccessControl: Send + Sync + fmt::Debug {
    fn check(&self, user_id: &str, action: AccessAction, type_name: &str) -> MetadataResult<()>;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn check(&self, _user_id: &str, _action: AccessAction, _type_name: &str) -> MetadataResult<()> {
        Ok(())
    }
}

/// Denies listed users, either entirely or for selected actions.
#[derive(Debug, Clone, Default)]
pub struct DenyList {
    /// `None` denies every action.
    users: BTreeMap<String, Option<BTreeSet<AccessAction>>>,
}

impl DenyList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every action to `user_id`.
    #[must_use]
    pub fn deny_user(mut self, user_id: impl Into<String>) -> Self {
        self.users.insert(user_id.into(), None);
        self
    }

    /// Deny one action to `user_id`.
    #[must_use]
    pub fn deny_action(mut self, user_id: impl Into<String>, action: AccessAction) -> Self {
        let entry = self
            .users
            .entry(user_id.into())
            .or_insert_with(|| Some(BTreeSet::new()));
        if let Some(actions) = entry {
            actions.insert(action);
        }
        self
    }
}

impl AccessControl for DenyList {
    fn check(&self, user_id: &str, action: AccessAction, type_name: &str) -> MetadataResult<()> {
        let denied = match self.users.get(user_id) {
            Some(None) => true,
            Some(Some(actions)) => actions.contains(&action),
            None => false,
        };
        if denied {
            return Err(MetadataError::NotAuthorized {
                user_id: user_id.to_string(),
                action: format!("{} {}", action, type_name),
            });
        }
        Ok(())
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of "now" for audit stamps and default effective times.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn at(time: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(time.0),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.millis.store(time.0, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }
}

// =============================================================================
// TESTS
// =============================================================================
