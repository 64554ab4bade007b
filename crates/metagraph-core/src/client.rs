//! # Metadata Client
//!
//! `MetadataClient` is the operation set collaborators call. Every operation:
//!
//! 1. validates its input (nothing reaches the store when this fails),
//! 2. applies the client configuration (default effective time, paging),
//! 3. forwards one request to the [`MetadataStore`].
//!
//! The client holds no per-call state. Its configuration is fixed at
//! construction, so a client can be shared behind an `Arc` freely.
//!
//! Lookups by GUID return `Ok(None)` for an absent element. Every other
//! failure is an error of one of the three [`crate::ErrorKind`]s.

use crate::config::ClientConfig;
use crate::converter::{ElementConverter, convert_element, convert_elements};
use crate::correlation::{CorrelationHeader, CorrelationRequest};
use crate::element::{
    EffectivityWindow, HistoryRequest, OpenMetadataElement, Paging, QueryOptions, Relationship,
};
use crate::primitives::{QUALIFIED_NAME, SEARCHABLE_NAME_PROPERTIES};
use crate::search::{
    PropertyMatch, SearchProperties, by_classification, by_classification_property,
    by_property_contains, by_property_exact,
};
use crate::store::{
    ArchiveProperties, Clock, ElementQuery, MetadataStore, NewClassification, NewElement,
    NewRelationship, RelatedElement, RelationshipEnd, RelationshipOptions, RelationshipQuery,
    StoreStatistics, SystemClock,
};
use crate::template::{PlaceholderSyntax, TemplateOptions};
use crate::validator::{
    resolve_paging, validate_correlation_request, validate_guid, validate_name,
    validate_new_classification, validate_new_element, validate_new_relationship,
    validate_properties, validate_search_classifications, validate_search_properties,
    validate_user_id,
};
use crate::{
    ElementProperties, ElementStatus, Guid, MetadataError, MetadataResult, PropertyValue,
    Timestamp,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Façade over a [`MetadataStore`].
#[derive(Clone)]
pub struct MetadataClient {
    store: Arc<dyn MetadataStore>,
    config: ClientConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MetadataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetadataClient {
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>, config: ClientConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for the `Now` effective-time policy.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn options(&self, options: &QueryOptions) -> QueryOptions {
        let mut resolved = options.clone();
        resolved.effective_time = self
            .config
            .default_effective_time
            .resolve(options.effective_time, self.clock.now());
        resolved
    }

    fn paging(&self, paging: Paging) -> MetadataResult<Paging> {
        resolve_paging(
            paging,
            self.config.default_page_size,
            self.config.max_page_size,
        )
    }

    fn syntax(&self) -> PlaceholderSyntax {
        PlaceholderSyntax {
            prefix: self.config.template_placeholder_prefix.clone(),
            suffix: self.config.template_placeholder_suffix.clone(),
        }
    }

    fn check_target(user_id: &str, guid: Guid, parameter: &str) -> MetadataResult<()> {
        validate_user_id(user_id)?;
        validate_guid(guid, parameter)
    }

    // =========================================================================
    // ELEMENTS: CREATE
    // =========================================================================

    pub fn create_metadata_element_in_store(
        &self,
        user_id: &str,
        element: &NewElement,
    ) -> MetadataResult<Guid> {
        validate_user_id(user_id)?;
        validate_new_element(element)?;
        debug!(user_id, type_name = %element.type_name, "create_metadata_element_in_store");
        self.store.create_element(user_id, element)
    }

    /// Deep-copy a template. Placeholders use the configured delimiters.
    pub fn create_metadata_element_from_template(
        &self,
        user_id: &str,
        template: &TemplateOptions,
        options: &QueryOptions,
    ) -> MetadataResult<Guid> {
        Self::check_target(user_id, template.template_guid, "templateGUID")?;
        template.validate()?;
        validate_properties(&template.replacement_properties, "replacementProperties")?;
        if let Some(anchor) = template.anchor_guid {
            validate_guid(anchor, "anchorGUID")?;
        }
        if let Some(parent) = &template.parent {
            validate_guid(parent.parent_guid, "parentGUID")?;
            validate_name(&parent.relationship_type, "parentRelationshipTypeName")?;
        }
        debug!(user_id, template = %template.template_guid, "create_metadata_element_from_template");
        self.store.create_element_from_template(
            user_id,
            template,
            &self.syntax(),
            &self.options(options),
        )
    }

    // =========================================================================
    // ELEMENTS: READ
    // =========================================================================

    /// `Ok(None)` when no visible element has this GUID.
    pub fn get_metadata_element_by_guid(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<OpenMetadataElement>> {
        Self::check_target(user_id, guid, "elementGUID")?;
        debug!(user_id, guid = %guid, "get_metadata_element_by_guid");
        self.store.get_element(user_id, guid, &self.options(options))
    }

    /// The one element whose `property_name` (default `qualifiedName`)
    /// equals `unique_name`.
    ///
    /// Two visible matches mean the name is not unique in the store, which
    /// is reported as a store-side failure rather than picking one.
    pub fn get_metadata_element_by_unique_name(
        &self,
        user_id: &str,
        unique_name: &str,
        property_name: Option<&str>,
        options: &QueryOptions,
    ) -> MetadataResult<Option<OpenMetadataElement>> {
        validate_user_id(user_id)?;
        validate_name(unique_name, "name")?;
        let property_name = property_name.unwrap_or(QUALIFIED_NAME);
        validate_name(property_name, "namePropertyName")?;
        debug!(user_id, property_name, "get_metadata_element_by_unique_name");

        let query = ElementQuery {
            search_properties: Some(by_property_exact([property_name], unique_name)),
            ..ElementQuery::default()
        };
        let mut found =
            self.store
                .find_elements(user_id, &query, &self.options(options), Paging::new(0, 2))?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            _ => Err(MetadataError::PropertyServer(format!(
                "{} {} is shared by more than one element",
                property_name, unique_name
            ))),
        }
    }

    pub fn get_metadata_element_guid_by_unique_name(
        &self,
        user_id: &str,
        unique_name: &str,
        property_name: Option<&str>,
        options: &QueryOptions,
    ) -> MetadataResult<Option<Guid>> {
        Ok(self
            .get_metadata_element_by_unique_name(user_id, unique_name, property_name, options)?
            .map(|e| e.guid))
    }

    pub fn find_metadata_elements(
        &self,
        user_id: &str,
        query: &ElementQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        validate_user_id(user_id)?;
        if let Some(type_name) = &query.type_name {
            validate_name(type_name, "metadataElementTypeName")?;
        }
        if let Some(search) = &query.search_properties {
            validate_search_properties(search)?;
        }
        if let Some(search) = &query.search_classifications {
            validate_search_classifications(search)?;
        }
        if let Some(anchor) = query.anchor_guid {
            validate_guid(anchor, "anchorGUID")?;
        }
        let paging = self.paging(paging)?;
        debug!(
            user_id,
            type_name = query.type_name.as_deref().unwrap_or("*"),
            start_from = paging.start_from,
            page_size = paging.page_size,
            "find_metadata_elements"
        );
        self.store
            .find_elements(user_id, query, &self.options(options), paging)
    }

    /// Contains-match over the common name properties.
    pub fn find_metadata_elements_with_string(
        &self,
        user_id: &str,
        search_string: &str,
        type_name: Option<&str>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        validate_name(search_string, "searchString")?;
        let query = ElementQuery {
            type_name: type_name.map(str::to_string),
            search_properties: Some(by_property_contains(
                SEARCHABLE_NAME_PROPERTIES,
                search_string,
            )),
            ..ElementQuery::default()
        };
        self.find_metadata_elements(user_id, &query, options, paging)
    }

    /// Elements where any of `property_names` equals `value`.
    pub fn find_metadata_elements_by_property_value(
        &self,
        user_id: &str,
        type_name: Option<&str>,
        property_names: &[&str],
        value: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        Self::check_property_names(property_names)?;
        let query = ElementQuery {
            type_name: type_name.map(str::to_string),
            search_properties: Some(by_property_exact(
                property_names.iter().copied(),
                PropertyValue::string(value),
            )),
            ..ElementQuery::default()
        };
        self.find_metadata_elements(user_id, &query, options, paging)
    }

    /// Elements where any of `property_names` contains `value` literally.
    pub fn find_metadata_elements_by_property_contains(
        &self,
        user_id: &str,
        type_name: Option<&str>,
        property_names: &[&str],
        value: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        Self::check_property_names(property_names)?;
        let query = ElementQuery {
            type_name: type_name.map(str::to_string),
            search_properties: Some(by_property_contains(property_names.iter().copied(), value)),
            ..ElementQuery::default()
        };
        self.find_metadata_elements(user_id, &query, options, paging)
    }

    pub fn find_metadata_elements_by_classification(
        &self,
        user_id: &str,
        type_name: Option<&str>,
        classification_name: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        validate_name(classification_name, "classificationName")?;
        let query = ElementQuery {
            type_name: type_name.map(str::to_string),
            search_classifications: Some(by_classification(classification_name)),
            ..ElementQuery::default()
        };
        self.find_metadata_elements(user_id, &query, options, paging)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn find_metadata_elements_by_classification_property(
        &self,
        user_id: &str,
        type_name: Option<&str>,
        classification_name: &str,
        property_names: &[&str],
        value: &str,
        mode: PropertyMatch,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        validate_name(classification_name, "classificationName")?;
        Self::check_property_names(property_names)?;
        let query = ElementQuery {
            type_name: type_name.map(str::to_string),
            search_classifications: Some(by_classification_property(
                classification_name,
                property_names.iter().copied(),
                value,
                mode,
            )),
            ..ElementQuery::default()
        };
        self.find_metadata_elements(user_id, &query, options, paging)
    }

    fn check_property_names(property_names: &[&str]) -> MetadataResult<()> {
        if property_names.is_empty() {
            return Err(MetadataError::invalid(
                "propertyNames",
                "at least one property name is required",
            ));
        }
        property_names
            .iter()
            .try_for_each(|name| validate_name(name, "propertyNames"))
    }

    pub fn get_metadata_element_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        Self::check_target(user_id, guid, "elementGUID")?;
        Self::check_history(request)?;
        let request = HistoryRequest {
            paging: self.paging(request.paging)?,
            ..*request
        };
        debug!(user_id, guid = %guid, "get_metadata_element_history");
        self.store
            .element_history(user_id, guid, &request, &self.options(options))
    }

    fn check_history(request: &HistoryRequest) -> MetadataResult<()> {
        match (request.from_time, request.to_time) {
            (Some(from), Some(to)) if to < from => Err(MetadataError::invalid(
                "toTime",
                format!("{} is before fromTime {}", to, from),
            )),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // ELEMENTS: UPDATE
    // =========================================================================

    pub fn update_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        replace_all_properties: bool,
        properties: &ElementProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_properties(properties, "properties")?;
        debug!(user_id, guid = %guid, replace_all_properties, "update_metadata_element_in_store");
        self.store.update_element(
            user_id,
            guid,
            properties,
            replace_all_properties,
            &self.options(options),
        )
    }

    pub fn update_metadata_element_status_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        status: ElementStatus,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        debug!(user_id, guid = %guid, status = %status, "update_metadata_element_status_in_store");
        self.store
            .update_element_status(user_id, guid, status, &self.options(options))
    }

    pub fn update_metadata_element_effectivity_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        effectivity.validate("effectiveTo")?;
        debug!(user_id, guid = %guid, "update_metadata_element_effectivity_in_store");
        self.store
            .update_element_effectivity(user_id, guid, effectivity, &self.options(options))
    }

    pub fn delete_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        debug!(user_id, guid = %guid, "delete_metadata_element_in_store");
        self.store
            .delete_element(user_id, guid, &self.options(options))
    }

    pub fn archive_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        archive: &ArchiveProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_properties(&archive.archive_properties, "archiveProperties")?;
        debug!(user_id, guid = %guid, "archive_metadata_element_in_store");
        self.store
            .archive_element(user_id, guid, archive, &self.options(options))
    }

    pub fn restore_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        debug!(user_id, guid = %guid, "restore_metadata_element_in_store");
        self.store
            .restore_element(user_id, guid, &self.options(options))
    }

    // =========================================================================
    // CLASSIFICATIONS
    // =========================================================================

    pub fn classify_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        classification: &NewClassification,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_new_classification(classification)?;
        debug!(
            user_id,
            guid = %guid,
            classification = %classification.name,
            "classify_metadata_element_in_store"
        );
        self.store
            .classify_element(user_id, guid, classification, &self.options(options))
    }

    pub fn reclassify_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        classification_name: &str,
        replace_all_properties: bool,
        properties: &ElementProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_name(classification_name, "classificationName")?;
        validate_properties(properties, "properties")?;
        debug!(
            user_id,
            guid = %guid,
            classification = classification_name,
            "reclassify_metadata_element_in_store"
        );
        self.store.reclassify_element(
            user_id,
            guid,
            classification_name,
            properties,
            replace_all_properties,
            &self.options(options),
        )
    }

    pub fn update_classification_effectivity_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        classification_name: &str,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_name(classification_name, "classificationName")?;
        effectivity.validate("effectiveTo")?;
        debug!(
            user_id,
            guid = %guid,
            classification = classification_name,
            "update_classification_effectivity_in_store"
        );
        self.store.update_classification_effectivity(
            user_id,
            guid,
            classification_name,
            effectivity,
            &self.options(options),
        )
    }

    pub fn declassify_metadata_element_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        classification_name: &str,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "elementGUID")?;
        validate_name(classification_name, "classificationName")?;
        debug!(
            user_id,
            guid = %guid,
            classification = classification_name,
            "declassify_metadata_element_in_store"
        );
        self.store
            .declassify_element(user_id, guid, classification_name, &self.options(options))
    }

    // =========================================================================
    // RELATIONSHIPS
    // =========================================================================

    /// Link two elements. Re-anchoring happens only when `relationship_options`
    /// asks for it.
    pub fn create_related_elements_in_store(
        &self,
        user_id: &str,
        relationship: &NewRelationship,
        relationship_options: &RelationshipOptions,
        options: &QueryOptions,
    ) -> MetadataResult<Guid> {
        validate_user_id(user_id)?;
        validate_new_relationship(relationship)?;
        relationship_options.validate()?;
        if let Some(scope) = relationship_options.anchor_scope_guid {
            validate_guid(scope, "anchorScopeGUID")?;
        }
        debug!(
            user_id,
            type_name = %relationship.type_name,
            end1 = %relationship.end1_guid,
            end2 = %relationship.end2_guid,
            "create_related_elements_in_store"
        );
        self.store.create_relationship(
            user_id,
            relationship,
            relationship_options,
            &self.options(options),
        )
    }

    /// `Ok(None)` when no visible relationship has this GUID.
    pub fn get_relationship_by_guid(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<Relationship>> {
        Self::check_target(user_id, guid, "relationshipGUID")?;
        debug!(user_id, guid = %guid, "get_relationship_by_guid");
        self.store
            .get_relationship(user_id, guid, &self.options(options))
    }

    pub fn get_related_metadata_elements(
        &self,
        user_id: &str,
        guid: Guid,
        starting_end: RelationshipEnd,
        relationship_type: Option<&str>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<RelatedElement>> {
        Self::check_target(user_id, guid, "elementGUID")?;
        if let Some(type_name) = relationship_type {
            validate_name(type_name, "relationshipTypeName")?;
        }
        let paging = self.paging(paging)?;
        debug!(user_id, guid = %guid, ?starting_end, "get_related_metadata_elements");
        self.store.related_elements(
            user_id,
            guid,
            starting_end,
            relationship_type,
            &self.options(options),
            paging,
        )
    }

    /// Relationships from `end1_guid` to `end2_guid`.
    pub fn get_metadata_element_relationships(
        &self,
        user_id: &str,
        end1_guid: Guid,
        end2_guid: Guid,
        relationship_type: Option<&str>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<Relationship>> {
        Self::check_target(user_id, end1_guid, "metadataElementAtEnd1GUID")?;
        validate_guid(end2_guid, "metadataElementAtEnd2GUID")?;
        if let Some(type_name) = relationship_type {
            validate_name(type_name, "relationshipTypeName")?;
        }
        let query = RelationshipQuery {
            type_name: relationship_type.map(str::to_string),
            end1_guid: Some(end1_guid),
            end2_guid: Some(end2_guid),
            search_properties: None,
        };
        let paging = self.paging(paging)?;
        debug!(user_id, end1 = %end1_guid, end2 = %end2_guid, "get_metadata_element_relationships");
        self.store
            .find_relationships(user_id, &query, &self.options(options), paging)
    }

    pub fn find_relationships_between_elements(
        &self,
        user_id: &str,
        relationship_type: Option<&str>,
        search_properties: Option<&SearchProperties>,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<Relationship>> {
        validate_user_id(user_id)?;
        if let Some(type_name) = relationship_type {
            validate_name(type_name, "relationshipTypeName")?;
        }
        if let Some(search) = search_properties {
            validate_search_properties(search)?;
        }
        let query = RelationshipQuery {
            type_name: relationship_type.map(str::to_string),
            search_properties: search_properties.cloned(),
            ..RelationshipQuery::default()
        };
        let paging = self.paging(paging)?;
        debug!(user_id, "find_relationships_between_elements");
        self.store
            .find_relationships(user_id, &query, &self.options(options), paging)
    }

    pub fn get_relationship_history(
        &self,
        user_id: &str,
        guid: Guid,
        request: &HistoryRequest,
        options: &QueryOptions,
    ) -> MetadataResult<Vec<Relationship>> {
        Self::check_target(user_id, guid, "relationshipGUID")?;
        Self::check_history(request)?;
        let request = HistoryRequest {
            paging: self.paging(request.paging)?,
            ..*request
        };
        debug!(user_id, guid = %guid, "get_relationship_history");
        self.store
            .relationship_history(user_id, guid, &request, &self.options(options))
    }

    pub fn update_related_elements_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        replace_all_properties: bool,
        properties: &ElementProperties,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "relationshipGUID")?;
        validate_properties(properties, "properties")?;
        debug!(user_id, guid = %guid, "update_related_elements_in_store");
        self.store.update_relationship(
            user_id,
            guid,
            properties,
            replace_all_properties,
            &self.options(options),
        )
    }

    pub fn update_related_elements_effectivity_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        effectivity: EffectivityWindow,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "relationshipGUID")?;
        effectivity.validate("effectiveTo")?;
        debug!(user_id, guid = %guid, "update_related_elements_effectivity_in_store");
        self.store
            .update_relationship_effectivity(user_id, guid, effectivity, &self.options(options))
    }

    pub fn delete_related_elements_in_store(
        &self,
        user_id: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, guid, "relationshipGUID")?;
        debug!(user_id, guid = %guid, "delete_related_elements_in_store");
        self.store
            .delete_relationship(user_id, guid, &self.options(options))
    }

    // =========================================================================
    // CORRELATION
    // =========================================================================

    pub fn add_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid> {
        validate_user_id(user_id)?;
        validate_correlation_request(request)?;
        debug!(
            user_id,
            scope = %request.scope.scope_guid,
            element = %request.element_guid,
            "add_external_identifier"
        );
        self.store.add_external_identifier(user_id, request)
    }

    pub fn update_external_identifier(
        &self,
        user_id: &str,
        request: &CorrelationRequest,
    ) -> MetadataResult<Guid> {
        validate_user_id(user_id)?;
        validate_correlation_request(request)?;
        debug!(
            user_id,
            scope = %request.scope.scope_guid,
            element = %request.element_guid,
            "update_external_identifier"
        );
        self.store.update_external_identifier(user_id, request)
    }

    /// Drop the mapping. The element itself is never touched.
    pub fn remove_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, scope_guid, "externalScopeGUID")?;
        validate_guid(element_guid, "openMetadataElementGUID")?;
        validate_name(identifier, "identifier")?;
        debug!(user_id, scope = %scope_guid, element = %element_guid, "remove_external_identifier");
        self.store
            .remove_external_identifier(user_id, scope_guid, identifier, element_guid)
    }

    pub fn confirm_synchronization(
        &self,
        user_id: &str,
        scope_guid: Guid,
        element_guid: Guid,
        element_type_name: &str,
        identifier: &str,
    ) -> MetadataResult<()> {
        Self::check_target(user_id, scope_guid, "externalScopeGUID")?;
        validate_guid(element_guid, "openMetadataElementGUID")?;
        validate_name(element_type_name, "openMetadataElementTypeName")?;
        validate_name(identifier, "identifier")?;
        debug!(user_id, scope = %scope_guid, element = %element_guid, "confirm_synchronization");
        self.store.confirm_synchronization(
            user_id,
            scope_guid,
            identifier,
            element_guid,
            element_type_name,
        )
    }

    /// Read-only: is this identifier mapped to this element at `effective_time`?
    pub fn validate_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        element_guid: Guid,
        element_type_name: &str,
        effective_time: Option<Timestamp>,
    ) -> MetadataResult<bool> {
        Self::check_target(user_id, scope_guid, "externalScopeGUID")?;
        validate_guid(element_guid, "openMetadataElementGUID")?;
        validate_name(element_type_name, "openMetadataElementTypeName")?;
        validate_name(identifier, "identifier")?;
        let effective_time = self
            .config
            .default_effective_time
            .resolve(effective_time, self.clock.now());
        self.store.validate_external_identifier(
            user_id,
            scope_guid,
            identifier,
            element_guid,
            element_type_name,
            effective_time,
        )
    }

    pub fn get_elements_for_external_identifier(
        &self,
        user_id: &str,
        scope_guid: Guid,
        identifier: &str,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<OpenMetadataElement>> {
        Self::check_target(user_id, scope_guid, "externalScopeGUID")?;
        validate_name(identifier, "identifier")?;
        let paging = self.paging(paging)?;
        debug!(user_id, scope = %scope_guid, "get_elements_for_external_identifier");
        self.store.elements_for_external_identifier(
            user_id,
            scope_guid,
            identifier,
            &self.options(options),
            paging,
        )
    }

    pub fn get_external_identifiers(
        &self,
        user_id: &str,
        scope_guid: Guid,
        element_guid: Guid,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<CorrelationHeader>> {
        Self::check_target(user_id, scope_guid, "externalScopeGUID")?;
        validate_guid(element_guid, "openMetadataElementGUID")?;
        let paging = self.paging(paging)?;
        debug!(user_id, scope = %scope_guid, element = %element_guid, "get_external_identifiers");
        self.store.external_identifiers(
            user_id,
            scope_guid,
            element_guid,
            &self.options(options),
            paging,
        )
    }

    // =========================================================================
    // TYPED VIEWS
    // =========================================================================

    /// [`Self::get_metadata_element_by_guid`] followed by `converter`.
    pub fn get_converted_element_by_guid<C: ElementConverter>(
        &self,
        user_id: &str,
        converter: &C,
        method: &str,
        guid: Guid,
        options: &QueryOptions,
    ) -> MetadataResult<Option<C::Output>> {
        self.get_metadata_element_by_guid(user_id, guid, options)?
            .map(|element| convert_element(converter, method, &element))
            .transpose()
    }

    /// [`Self::find_metadata_elements`] followed by `converter`.
    pub fn find_converted_elements<C: ElementConverter>(
        &self,
        user_id: &str,
        converter: &C,
        method: &str,
        query: &ElementQuery,
        options: &QueryOptions,
        paging: Paging,
    ) -> MetadataResult<Vec<C::Output>> {
        let elements = self.find_metadata_elements(user_id, query, options, paging)?;
        convert_elements(converter, method, &elements)
    }

    pub fn statistics(&self) -> MetadataResult<StoreStatistics> {
        self.store.statistics()
    }
}

// =============================================================================
// TESTS
// =============================================================================
