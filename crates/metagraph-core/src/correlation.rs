//! # Correlation Ledger
//!
//! Maps identifiers owned by external systems onto open metadata elements,
//! one ledger per store.
//!
//! ## Invariant
//!
//! Within one external scope an identifier maps to at most one element at
//! any instant: headers for the same `(scope, identifier)` key that point at
//! different elements must have disjoint effectivity windows. Finding two
//! live mappings anyway is a data-integrity failure, never silently resolved.
//!
//! ## Ordering
//!
//! Headers are kept in creation order, which is the order every list
//! operation returns them in.
//!
//! The ledger never touches the elements it refers to.

use crate::element::{EffectivityWindow, ElementHeader, Temporal, Versioned};
use crate::{ElementProperties, Guid, MetadataError, MetadataResult, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TYPES
// =============================================================================

/// The external system (asset manager) that owns a set of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalScope {
    pub scope_guid: Guid,
    #[serde(default)]
    pub scope_name: Option<String>,
    #[serde(default)]
    pub scope_type_name: Option<String>,
}

impl ExternalScope {
    #[must_use]
    pub fn new(scope_guid: Guid) -> Self {
        Self {
            scope_guid,
            scope_name: None,
            scope_type_name: None,
        }
    }

    #[must_use]
    pub fn named(mut self, scope_name: impl Into<String>) -> Self {
        self.scope_name = Some(scope_name.into());
        self
    }

    #[must_use]
    pub fn typed(mut self, scope_type_name: impl Into<String>) -> Self {
        self.scope_type_name = Some(scope_type_name.into());
        self
    }
}

/// How the external system allocates its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyPattern {
    #[default]
    LocalKey,
    RecycledKey,
    NaturalKey,
    Mirror,
    AggregateKey,
    CallersKey,
    StableKey,
    Other,
}

/// Which way changes flow between the external system and the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynchDirection {
    #[default]
    BothDirections,
    ToThirdParty,
    FromThirdParty,
    Other,
}

/// What the caller knows about one external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalIdentifierProperties {
    pub identifier: String,
    pub identifier_name: Option<String>,
    pub identifier_usage: Option<String>,
    pub identifier_source: Option<String>,
    pub key_pattern: KeyPattern,
    pub external_instance_created_by: Option<String>,
    pub external_instance_creation_time: Option<Timestamp>,
    pub external_instance_last_updated_by: Option<String>,
    pub external_instance_last_update_time: Option<Timestamp>,
    pub external_instance_version: Option<i64>,
    pub synch_direction: SynchDirection,
    pub synch_description: Option<String>,
    pub mapping_properties: ElementProperties,
}

impl ExternalIdentifierProperties {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

/// One `(scope, identifier) -> element` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationHeader {
    pub guid: Guid,
    pub scope: ExternalScope,
    pub identifier: String,
    pub element_guid: Guid,
    pub element_type_name: String,
    pub properties: ExternalIdentifierProperties,
    pub last_confirmed: Option<Timestamp>,
    pub effectivity: EffectivityWindow,
    pub header: ElementHeader,
}

impl CorrelationHeader {
    fn same_key(&self, scope_guid: Guid, identifier: &str) -> bool {
        self.scope.scope_guid == scope_guid && self.identifier == identifier
    }
}

impl Temporal for CorrelationHeader {
    fn effectivity(&self) -> &EffectivityWindow {
        &self.effectivity
    }
}

impl Versioned for CorrelationHeader {
    fn header(&self) -> &ElementHeader {
        &self.header
    }
}

/// Everything needed to add or update one mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRequest {
    pub scope: ExternalScope,
    pub element_guid: Guid,
    pub element_type_name: String,
    pub properties: ExternalIdentifierProperties,
    #[serde(default)]
    pub effectivity: EffectivityWindow,
}

// =============================================================================
// LEDGER
// =============================================================================

/// The set of correlation headers of one store, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationLedger {
    headers: BTreeMap<u64, CorrelationHeader>,
    next_sequence: u64,
}

impl CorrelationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from headers listed in creation order.
    ///
    /// Two overlapping headers mapping one key onto different elements are
    /// an integrity failure and reject the whole list.
    pub fn from_headers(headers: Vec<CorrelationHeader>) -> MetadataResult<Self> {
        let mut ledger = Self::new();
        for header in headers {
            if let Some(existing) = ledger.conflict(
                header.scope.scope_guid,
                &header.identifier,
                header.element_guid,
                &header.effectivity,
            ) {
                return Err(Self::integrity_error(existing, &header));
            }
            ledger.push(header);
        }
        Ok(ledger)
    }

    /// All headers in creation order.
    pub fn headers(&self) -> impl Iterator<Item = &CorrelationHeader> {
        self.headers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn push(&mut self, header: CorrelationHeader) {
        self.headers.insert(self.next_sequence, header);
        self.next_sequence = self.next_sequence.saturating_add(1);
    }

    /// First header pointing another element at `key` during `window`.
    fn conflict(
        &self,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        window: &EffectivityWindow,
    ) -> Option<&CorrelationHeader> {
        self.headers.values().find(|h| {
            h.same_key(scope_guid, identifier)
                && h.element_guid != element_guid
                && h.effectivity.overlaps(window)
        })
    }

    fn check_request(request: &CorrelationRequest) -> MetadataResult<()> {
        if request.properties.identifier.trim().is_empty() {
            return Err(MetadataError::invalid(
                "identifier",
                "external identifier must not be empty",
            ));
        }
        if request.scope.scope_guid.is_nil() {
            return Err(MetadataError::invalid(
                "externalScopeGUID",
                "external scope guid must not be nil",
            ));
        }
        request.effectivity.validate("effectiveTo")
    }

    /// Add a mapping.
    ///
    /// Fails with `DuplicateCorrelation` when an overlapping mapping for the
    /// same key points at a different element. Re-adding an overlapping
    /// mapping for the same element refreshes that header instead of adding
    /// a second one.
    pub fn add(
        &mut self,
        request: CorrelationRequest,
        user_id: &str,
        now: Timestamp,
    ) -> MetadataResult<Guid> {
        Self::check_request(&request)?;
        let scope_guid = request.scope.scope_guid;
        let identifier = request.properties.identifier.clone();

        if let Some(existing) = self.conflict(
            scope_guid,
            &identifier,
            request.element_guid,
            &request.effectivity,
        ) {
            return Err(MetadataError::DuplicateCorrelation {
                scope_guid,
                identifier,
                existing_element: existing.element_guid,
            });
        }

        if let Some(existing) = self.headers.values_mut().find(|h| {
            h.same_key(scope_guid, &identifier)
                && h.element_guid == request.element_guid
                && h.effectivity.overlaps(&request.effectivity)
        }) {
            existing.scope = request.scope;
            existing.element_type_name = request.element_type_name;
            existing.properties = request.properties;
            existing.effectivity = request.effectivity;
            existing.header = existing.header.next(user_id, now);
            return Ok(existing.guid);
        }

        let guid = Guid::new_v4();
        self.push(CorrelationHeader {
            guid,
            scope: request.scope,
            identifier,
            element_guid: request.element_guid,
            element_type_name: request.element_type_name,
            properties: request.properties,
            last_confirmed: None,
            effectivity: request.effectivity,
            header: ElementHeader::initial(user_id, now),
        });
        Ok(guid)
    }

    /// Update the properties and window of an existing mapping.
    ///
    /// The endpoint element never changes; the mapping is found by
    /// `(scope, identifier, element)`.
    pub fn update(
        &mut self,
        request: CorrelationRequest,
        user_id: &str,
        now: Timestamp,
    ) -> MetadataResult<Guid> {
        Self::check_request(&request)?;
        let scope_guid = request.scope.scope_guid;
        let identifier = request.properties.identifier.clone();

        if let Some(existing) = self.conflict(
            scope_guid,
            &identifier,
            request.element_guid,
            &request.effectivity,
        ) {
            return Err(MetadataError::DuplicateCorrelation {
                scope_guid,
                identifier,
                existing_element: existing.element_guid,
            });
        }

        let header = self
            .headers
            .values_mut()
            .filter(|h| {
                h.same_key(scope_guid, &identifier) && h.element_guid == request.element_guid
            })
            .next_back()
            .ok_or_else(|| MetadataError::CorrelationNotFound {
                scope_guid,
                identifier: identifier.clone(),
            })?;

        if request.scope.scope_name.is_some() {
            header.scope.scope_name = request.scope.scope_name;
        }
        if request.scope.scope_type_name.is_some() {
            header.scope.scope_type_name = request.scope.scope_type_name;
        }
        header.element_type_name = request.element_type_name;
        header.properties = request.properties;
        header.effectivity = request.effectivity;
        header.header = header.header.next(user_id, now);
        Ok(header.guid)
    }

    /// Drop every mapping of `identifier` onto `element_guid` in the scope.
    ///
    /// Returns the removed headers. The element itself is never touched.
    pub fn remove(
        &mut self,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
    ) -> MetadataResult<Vec<CorrelationHeader>> {
        let doomed: Vec<u64> = self
            .headers
            .iter()
            .filter(|(_, h)| h.same_key(scope_guid, identifier) && h.element_guid == element_guid)
            .map(|(seq, _)| *seq)
            .collect();
        if doomed.is_empty() {
            return Err(MetadataError::CorrelationNotFound {
                scope_guid,
                identifier: identifier.to_string(),
            });
        }
        Ok(doomed
            .into_iter()
            .filter_map(|seq| self.headers.remove(&seq))
            .collect())
    }

    /// Stamp `last_confirmed` on the mapping live at `now`.
    ///
    /// Only `last_confirmed` changes, so repeating the call with the same
    /// arguments leaves the same observable state.
    pub fn confirm(
        &mut self,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
        now: Timestamp,
    ) -> MetadataResult<Guid> {
        let header = self
            .headers
            .values_mut()
            .find(|h| {
                h.same_key(scope_guid, identifier)
                    && h.element_guid == element_guid
                    && h.element_type_name == element_type_name
                    && h.is_effective_at(Some(now))
            })
            .ok_or_else(|| MetadataError::CorrelationNotFound {
                scope_guid,
                identifier: identifier.to_string(),
            })?;
        header.last_confirmed = Some(now);
        Ok(header.guid)
    }

    /// Read-only: is `identifier` mapped onto `element_guid` at `effective_time`?
    #[must_use]
    pub fn validate(
        &self,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
        effective_time: Option<Timestamp>,
    ) -> bool {
        self.headers.values().any(|h| {
            h.same_key(scope_guid, identifier)
                && h.element_guid == element_guid
                && h.element_type_name == element_type_name
                && h.is_effective_at(effective_time)
        })
    }

    /// Headers mapping `identifier` in the scope, in creation order.
    ///
    /// Two of them live at the same time for different elements is an
    /// integrity failure, never resolved by picking one.
    pub fn elements_for(
        &self,
        scope_guid: Guid,
        identifier: &str,
        effective_time: Option<Timestamp>,
    ) -> MetadataResult<Vec<&CorrelationHeader>> {
        let live: Vec<&CorrelationHeader> = self
            .headers
            .values()
            .filter(|h| h.same_key(scope_guid, identifier) && h.is_effective_at(effective_time))
            .collect();
        for (i, a) in live.iter().enumerate() {
            if let Some(b) = live[i + 1..].iter().find(|b| {
                b.element_guid != a.element_guid && b.effectivity.overlaps(&a.effectivity)
            }) {
                return Err(Self::integrity_error(a, b));
            }
        }
        Ok(live)
    }

    fn integrity_error(a: &CorrelationHeader, b: &CorrelationHeader) -> MetadataError {
        MetadataError::PropertyServer(format!(
            "identifier '{}' in scope {} maps to both {} and {}",
            a.identifier, a.scope.scope_guid, a.element_guid, b.element_guid
        ))
    }

    /// Headers mapping onto `element_guid` in the scope, in creation order.
    pub fn identifiers_for(
        &self,
        scope_guid: Guid,
        element_guid: Guid,
        effective_time: Option<Timestamp>,
    ) -> Vec<&CorrelationHeader> {
        self.headers
            .values()
            .filter(|h| {
                h.scope.scope_guid == scope_guid
                    && h.element_guid == element_guid
                    && h.is_effective_at(effective_time)
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn request(scope: Guid, element: Guid, identifier: &str) -> CorrelationRequest {
        CorrelationRequest {
            scope: ExternalScope::new(scope).named("crm"),
            element_guid: element,
            element_type_name: "Asset".to_string(),
            properties: ExternalIdentifierProperties::new(identifier),
            effectivity: EffectivityWindow::unbounded(),
        }
    }

    #[test]
    fn add_then_validate() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(1))
            .expect("add");

        assert!(ledger.validate(scope, "ext-1", element, "Asset", None));
        assert!(!ledger.validate(scope, "ext-1", element, "Glossary", None));
        assert!(!ledger.validate(Guid::new_v4(), "ext-1", element, "Asset", None));
    }

    #[test]
    fn second_live_mapping_to_other_element_rejected() {
        let mut ledger = CorrelationLedger::new();
        let scope = Guid::new_v4();
        let first = Guid::new_v4();
        ledger
            .add(request(scope, first, "ext-1"), "u", Timestamp(1))
            .expect("add");

        let err = ledger
            .add(request(scope, Guid::new_v4(), "ext-1"), "u", Timestamp(2))
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(matches!(
            err,
            MetadataError::DuplicateCorrelation { existing_element, .. } if existing_element == first
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn disjoint_windows_may_point_elsewhere() {
        let mut ledger = CorrelationLedger::new();
        let scope = Guid::new_v4();
        let (a, b) = (Guid::new_v4(), Guid::new_v4());

        let mut early = request(scope, a, "ext-1");
        early.effectivity = EffectivityWindow::between(Timestamp(0), Timestamp(100));
        let mut late = request(scope, b, "ext-1");
        late.effectivity = EffectivityWindow::starting(Timestamp(100));

        ledger.add(early, "u", Timestamp(1)).expect("early");
        ledger.add(late, "u", Timestamp(1)).expect("late");

        let elements_at = |t: i64| -> Vec<Guid> {
            ledger
                .elements_for(scope, "ext-1", Some(Timestamp(t)))
                .expect("consistent")
                .iter()
                .map(|h| h.element_guid)
                .collect()
        };
        assert_eq!(elements_at(50), vec![a]);
        assert_eq!(elements_at(100), vec![b]);
        assert_eq!(
            ledger.elements_for(scope, "ext-1", None).expect("consistent").len(),
            2
        );
    }

    #[test]
    fn overlapping_headers_rejected_on_rebuild() {
        let mut ledger = CorrelationLedger::new();
        let scope = Guid::new_v4();
        ledger
            .add(request(scope, Guid::new_v4(), "ext-1"), "u", Timestamp(1))
            .expect("add");
        let mut headers: Vec<CorrelationHeader> = ledger.headers().cloned().collect();
        let mut twin = headers[0].clone();
        twin.guid = Guid::new_v4();
        twin.element_guid = Guid::new_v4();
        headers.push(twin);

        let err = CorrelationLedger::from_headers(headers).expect_err("overlap");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
    }

    #[test]
    fn rebuild_keeps_disjoint_headers() {
        let mut ledger = CorrelationLedger::new();
        let scope = Guid::new_v4();
        let mut early = request(scope, Guid::new_v4(), "ext-1");
        early.effectivity = EffectivityWindow::between(Timestamp(0), Timestamp(100));
        let mut late = request(scope, Guid::new_v4(), "ext-1");
        late.effectivity = EffectivityWindow::starting(Timestamp(100));
        ledger.add(early, "u", Timestamp(1)).expect("early");
        ledger.add(late, "u", Timestamp(1)).expect("late");

        let rebuilt =
            CorrelationLedger::from_headers(ledger.headers().cloned().collect()).expect("rebuild");
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn re_add_same_element_refreshes() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        let first = ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(1))
            .expect("add");
        let second = ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(2))
            .expect("re-add");
        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn update_keeps_endpoint() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(1))
            .expect("add");

        let mut changed = request(scope, element, "ext-1");
        changed.properties.synch_description = Some("nightly".to_string());
        ledger.update(changed, "v", Timestamp(2)).expect("update");

        let header = ledger.headers().next().expect("header");
        assert_eq!(header.element_guid, element);
        assert_eq!(header.properties.synch_description.as_deref(), Some("nightly"));
        assert_eq!(header.header.version, 2);

        let missing = ledger
            .update(request(scope, Guid::new_v4(), "ext-1"), "v", Timestamp(3))
            .expect_err("other element conflicts");
        assert!(matches!(missing, MetadataError::DuplicateCorrelation { .. }));
    }

    #[test]
    fn remove_requires_matching_element() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(1))
            .expect("add");

        let err = ledger
            .remove(scope, "ext-1", Guid::new_v4())
            .expect_err("wrong element");
        assert!(matches!(err, MetadataError::CorrelationNotFound { .. }));

        let removed = ledger.remove(scope, "ext-1", element).expect("remove");
        assert_eq!(removed.len(), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn confirm_is_idempotent() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        ledger
            .add(request(scope, element, "ext-1"), "u", Timestamp(1))
            .expect("add");

        ledger
            .confirm(scope, "ext-1", element, "Asset", Timestamp(5))
            .expect("confirm");
        let once = ledger.clone();
        ledger
            .confirm(scope, "ext-1", element, "Asset", Timestamp(5))
            .expect("confirm again");
        assert_eq!(once, ledger);
        assert_eq!(
            ledger.headers().next().and_then(|h| h.last_confirmed),
            Some(Timestamp(5))
        );
    }

    #[test]
    fn lists_keep_creation_order() {
        let mut ledger = CorrelationLedger::new();
        let (scope, element) = (Guid::new_v4(), Guid::new_v4());
        for id in ["z", "a", "m"] {
            ledger
                .add(request(scope, element, id), "u", Timestamp(1))
                .expect("add");
        }
        let ids: Vec<&str> = ledger
            .identifiers_for(scope, element, None)
            .iter()
            .map(|h| h.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn empty_identifier_rejected() {
        let mut ledger = CorrelationLedger::new();
        let err = ledger
            .add(request(Guid::new_v4(), Guid::new_v4(), "  "), "u", Timestamp(1))
            .expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
