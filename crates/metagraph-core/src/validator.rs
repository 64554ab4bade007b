//! # Input Validation
//!
//! Stateless checks run by the facade before any store interaction.
//! Every failure is an `InvalidParameter` naming the offending argument, and
//! nothing has been applied when one is returned.

use crate::element::Paging;
use crate::primitives::{MAX_CONDITIONS, MAX_NAME_LENGTH, MAX_VALUE_DEPTH, MAX_VALUE_LENGTH};
use crate::search::{PropertyComparisonOperator, SearchClassifications, SearchProperties};
use crate::correlation::CorrelationRequest;
use crate::store::{NewClassification, NewElement, NewRelationship};
use crate::{ElementProperties, Guid, MetadataError, MetadataResult, PropertyValue};

/// The caller identity must be present; its content is opaque.
pub fn validate_user_id(user_id: &str) -> MetadataResult<()> {
    if user_id.trim().is_empty() {
        return Err(MetadataError::invalid("userId", "must not be empty"));
    }
    Ok(())
}

pub fn validate_guid(guid: Guid, parameter: &str) -> MetadataResult<()> {
    if guid.is_nil() {
        return Err(MetadataError::invalid(parameter, "must not be the nil guid"));
    }
    Ok(())
}

/// Type, classification and property names.
pub fn validate_name(name: &str, parameter: &str) -> MetadataResult<()> {
    if name.trim().is_empty() {
        return Err(MetadataError::invalid(parameter, "must not be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(MetadataError::invalid(
            parameter,
            format!("longer than {} bytes", MAX_NAME_LENGTH),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(MetadataError::invalid(
            parameter,
            "contains control characters",
        ));
    }
    Ok(())
}

fn validate_value_at(value: &PropertyValue, parameter: &str, depth: usize) -> MetadataResult<()> {
    if depth > MAX_VALUE_DEPTH {
        return Err(MetadataError::invalid(
            parameter,
            format!("nested deeper than {} levels", MAX_VALUE_DEPTH),
        ));
    }
    match value {
        PropertyValue::String(s) if s.len() > MAX_VALUE_LENGTH => Err(MetadataError::invalid(
            parameter,
            format!("string longer than {} bytes", MAX_VALUE_LENGTH),
        )),
        PropertyValue::Array(items) => items
            .iter()
            .try_for_each(|v| validate_value_at(v, parameter, depth.saturating_add(1))),
        PropertyValue::Map(entries) => entries.iter().try_for_each(|(k, v)| {
            validate_name(k, parameter)?;
            validate_value_at(v, parameter, depth.saturating_add(1))
        }),
        _ => Ok(()),
    }
}

/// Size and nesting limits of one literal.
pub fn validate_value(value: &PropertyValue, parameter: &str) -> MetadataResult<()> {
    validate_value_at(value, parameter, 0)
}

pub fn validate_properties(properties: &ElementProperties, parameter: &str) -> MetadataResult<()> {
    properties.iter().try_for_each(|(name, value)| {
        validate_name(name, parameter)?;
        validate_value(value, parameter)
    })
}

pub fn validate_search_properties(search: &SearchProperties) -> MetadataResult<()> {
    const PARAM: &str = "searchProperties";
    if search.conditions.len() > MAX_CONDITIONS {
        return Err(MetadataError::invalid(
            PARAM,
            format!("more than {} conditions", MAX_CONDITIONS),
        ));
    }
    for condition in &search.conditions {
        validate_name(&condition.property, PARAM)?;
        match (&condition.value, condition.operator) {
            (None, op) if !op.is_unary() => {
                return Err(MetadataError::invalid(
                    PARAM,
                    format!("{:?} on '{}' needs a value", op, condition.property),
                ));
            }
            (Some(value), PropertyComparisonOperator::Like) if value.as_str().is_none() => {
                return Err(MetadataError::invalid(
                    PARAM,
                    format!("LIKE on '{}' needs a string pattern", condition.property),
                ));
            }
            (Some(value), PropertyComparisonOperator::In)
                if !matches!(value, PropertyValue::Array(_)) =>
            {
                return Err(MetadataError::invalid(
                    PARAM,
                    format!("IN on '{}' needs an array", condition.property),
                ));
            }
            (Some(value), _) => validate_value(value, PARAM)?,
            (None, _) => {}
        }
    }
    Ok(())
}

pub fn validate_search_classifications(search: &SearchClassifications) -> MetadataResult<()> {
    if search.conditions.len() > MAX_CONDITIONS {
        return Err(MetadataError::invalid(
            "searchClassifications",
            format!("more than {} conditions", MAX_CONDITIONS),
        ));
    }
    for condition in &search.conditions {
        validate_name(&condition.name, "searchClassifications")?;
        if let Some(inner) = &condition.search_properties {
            validate_search_properties(inner)?;
        }
    }
    Ok(())
}

pub fn validate_new_classification(classification: &NewClassification) -> MetadataResult<()> {
    validate_name(&classification.name, "classificationName")?;
    validate_properties(&classification.properties, "classificationProperties")?;
    classification.effectivity.validate("effectiveTo")
}

pub fn validate_new_element(element: &NewElement) -> MetadataResult<()> {
    validate_name(&element.type_name, "typeName")?;
    validate_properties(&element.properties, "properties")?;
    element.effectivity.validate("effectiveTo")?;
    if element.status.is_terminal() {
        return Err(MetadataError::invalid(
            "initialStatus",
            format!("cannot create an element in status {}", element.status),
        ));
    }
    for classification in &element.classifications {
        validate_new_classification(classification)?;
    }
    if let Some(anchor) = &element.anchor {
        validate_guid(anchor.anchor_guid, "anchorGUID")?;
    }
    if let Some(parent) = &element.parent {
        validate_guid(parent.parent_guid, "parentGUID")?;
        validate_name(&parent.relationship_type, "parentRelationshipTypeName")?;
        validate_properties(&parent.properties, "parentRelationshipProperties")?;
    }
    Ok(())
}

pub fn validate_new_relationship(relationship: &NewRelationship) -> MetadataResult<()> {
    validate_name(&relationship.type_name, "relationshipTypeName")?;
    validate_guid(relationship.end1_guid, "end1GUID")?;
    validate_guid(relationship.end2_guid, "end2GUID")?;
    validate_properties(&relationship.properties, "properties")?;
    relationship.effectivity.validate("effectiveTo")?;
    if relationship.status.is_terminal() {
        return Err(MetadataError::invalid(
            "initialStatus",
            format!("cannot create a relationship in status {}", relationship.status),
        ));
    }
    Ok(())
}

pub fn validate_correlation_request(request: &CorrelationRequest) -> MetadataResult<()> {
    validate_guid(request.scope.scope_guid, "externalScopeGUID")?;
    validate_guid(request.element_guid, "openMetadataElementGUID")?;
    validate_name(&request.element_type_name, "openMetadataElementTypeName")?;
    validate_name(&request.properties.identifier, "identifier")?;
    validate_properties(&request.properties.mapping_properties, "mappingProperties")?;
    request.effectivity.validate("effectiveTo")
}

/// Resolve a requested page against the configured limits.
///
/// A page size of 0 takes `default_page_size`, or `max_page_size` when there
/// is no default. Anything above a non-zero `max_page_size` is rejected.
pub fn resolve_paging(
    paging: Paging,
    default_page_size: usize,
    max_page_size: usize,
) -> MetadataResult<Paging> {
    let page_size = match (paging.page_size, default_page_size) {
        (0, 0) => max_page_size,
        (0, default) => default,
        (requested, _) => requested,
    };
    if max_page_size != 0 && page_size > max_page_size {
        return Err(MetadataError::invalid(
            "pageSize",
            format!("{} exceeds the maximum of {}", page_size, max_page_size),
        ));
    }
    Ok(Paging::new(paging.start_from, page_size))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{by_property_exact, MatchCriteria, PropertyCondition};
    use crate::{ElementStatus, ErrorKind};
    use std::collections::BTreeMap;

    #[test]
    fn empty_user_rejected() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("  ").is_err());
        assert!(validate_user_id("erinoverview").is_ok());
    }

    #[test]
    fn names_are_bounded() {
        assert!(validate_name("qualifiedName", "p").is_ok());
        assert!(validate_name("", "p").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1), "p").is_err());
        assert!(validate_name("bad\nname", "p").is_err());
    }

    #[test]
    fn deep_values_rejected() {
        let mut value = PropertyValue::Int(1);
        for _ in 0..=MAX_VALUE_DEPTH {
            value = PropertyValue::Array(vec![value]);
        }
        let err = validate_value(&value, "properties").expect_err("too deep");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let mut shallow = BTreeMap::new();
        shallow.insert("k".to_string(), PropertyValue::Int(1));
        assert!(validate_value(&PropertyValue::Map(shallow), "properties").is_ok());
    }

    #[test]
    fn search_literal_shapes_checked() {
        assert!(validate_search_properties(&by_property_exact(["name"], "x")).is_ok());

        let like_int = SearchProperties::new(MatchCriteria::All).with(PropertyCondition::new(
            "name",
            PropertyComparisonOperator::Like,
            3_i64,
        ));
        assert!(validate_search_properties(&like_int).is_err());

        let missing = SearchProperties::new(MatchCriteria::All).with(PropertyCondition::unary(
            "name",
            PropertyComparisonOperator::Eq,
        ));
        assert!(validate_search_properties(&missing).is_err());

        let in_scalar = SearchProperties::new(MatchCriteria::All).with(PropertyCondition::new(
            "name",
            PropertyComparisonOperator::In,
            "x",
        ));
        assert!(validate_search_properties(&in_scalar).is_err());
    }

    #[test]
    fn terminal_initial_status_rejected() {
        let element = NewElement::new("Glossary").with_status(ElementStatus::Deleted);
        assert!(validate_new_element(&element).is_err());
        assert!(validate_new_element(&NewElement::new("Glossary")).is_ok());
    }

    #[test]
    fn paging_limits() {
        assert_eq!(
            resolve_paging(Paging::new(0, 0), 50, 100).ok(),
            Some(Paging::new(0, 50))
        );
        assert!(resolve_paging(Paging::new(0, 500), 50, 100).is_err());
        assert_eq!(
            resolve_paging(Paging::new(5, 500), 0, 0).ok(),
            Some(Paging::new(5, 500))
        );
        assert_eq!(
            resolve_paging(Paging::new(0, 0), 0, 100).ok(),
            Some(Paging::new(0, 100))
        );
    }

    #[test]
    fn correlation_request_needs_identifier_and_guids() {
        use crate::correlation::{ExternalIdentifierProperties, ExternalScope};
        use crate::element::EffectivityWindow;

        let good = CorrelationRequest {
            scope: ExternalScope::new(Guid::new_v4()),
            element_guid: Guid::new_v4(),
            element_type_name: "Glossary".to_string(),
            properties: ExternalIdentifierProperties::new("ext-1"),
            effectivity: EffectivityWindow::unbounded(),
        };
        assert!(validate_correlation_request(&good).is_ok());

        let mut blank = good.clone();
        blank.properties.identifier = " ".to_string();
        assert!(validate_correlation_request(&blank).is_err());

        let mut nil_scope = good;
        nil_scope.scope = ExternalScope::new(Guid::nil());
        assert!(validate_correlation_request(&nil_scope).is_err());
    }
}
