//! # Typed Views
//!
//! Converters turn raw [`OpenMetadataElement`]s into the typed values a
//! collaborator asked for. A stored element that does not fit the view is a
//! store-side failure: it is logged with the calling method and the
//! element's type name (never its property values) and returned as
//! [`MetadataError::Conversion`].

use crate::element::OpenMetadataElement;
use crate::primitives::QUALIFIED_NAME;
use crate::{ElementStatus, Guid, MetadataError, MetadataResult, PropertyValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Turns a raw element into a typed view.
pub trait ElementConverter {
    type Output;

    /// Build the view, or describe why the element does not fit.
    fn convert(&self, element: &OpenMetadataElement) -> Result<Self::Output, String>;
}

/// Run `converter`, logging and wrapping any failure.
pub fn convert_element<C: ElementConverter>(
    converter: &C,
    method: &str,
    element: &OpenMetadataElement,
) -> MetadataResult<C::Output> {
    converter.convert(element).map_err(|reason| {
        warn!(
            method = method,
            type_name = %element.type_name,
            guid = %element.guid,
            "stored element does not fit the requested view"
        );
        MetadataError::Conversion {
            method: method.to_string(),
            type_name: element.type_name.clone(),
            reason,
        }
    })
}

/// Convert a page of elements; the first failure aborts the page.
pub fn convert_elements<C: ElementConverter>(
    converter: &C,
    method: &str,
    elements: &[OpenMetadataElement],
) -> MetadataResult<Vec<C::Output>> {
    elements
        .iter()
        .map(|e| convert_element(converter, method, e))
        .collect()
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Compact listing view of any element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub guid: Guid,
    pub type_name: String,
    pub status: ElementStatus,
    pub qualified_name: Option<String>,
    pub display_name: Option<String>,
    pub classifications: Vec<String>,
    pub version: u64,
}

/// Builds [`ElementSummary`]; accepts every element.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryConverter;

impl ElementConverter for SummaryConverter {
    type Output = ElementSummary;

    fn convert(&self, element: &OpenMetadataElement) -> Result<ElementSummary, String> {
        Ok(ElementSummary {
            guid: element.guid,
            type_name: element.type_name.clone(),
            status: element.status,
            qualified_name: element
                .properties
                .get_str(QUALIFIED_NAME)
                .map(str::to_string),
            display_name: element
                .properties
                .get_str("displayName")
                .or_else(|| element.properties.get_str("name"))
                .map(str::to_string),
            classifications: element.classifications.keys().cloned().collect(),
            version: element.header.version,
        })
    }
}

// =============================================================================
// REFERENCEABLE
// =============================================================================

/// View of an element that must carry a unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceableView {
    pub guid: Guid,
    pub type_name: String,
    pub qualified_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

/// Builds [`ReferenceableView`], optionally restricted to one type name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceableConverter {
    expected_type: Option<String>,
}

impl ReferenceableConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_type(type_name: impl Into<String>) -> Self {
        Self {
            expected_type: Some(type_name.into()),
        }
    }
}

fn optional_text(element: &OpenMetadataElement, name: &str) -> Result<Option<String>, String> {
    match element.properties.get(name) {
        None => Ok(None),
        Some(PropertyValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{} is a {}, expected string", name, other.category())),
    }
}

impl ElementConverter for ReferenceableConverter {
    type Output = ReferenceableView;

    fn convert(&self, element: &OpenMetadataElement) -> Result<ReferenceableView, String> {
        if let Some(expected) = &self.expected_type {
            if &element.type_name != expected {
                return Err(format!("expected type {}", expected));
            }
        }
        let qualified_name = optional_text(element, QUALIFIED_NAME)?
            .ok_or_else(|| format!("missing {}", QUALIFIED_NAME))?;
        Ok(ReferenceableView {
            guid: element.guid,
            type_name: element.type_name.clone(),
            qualified_name,
            display_name: optional_text(element, "displayName")?,
            description: optional_text(element, "description")?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
