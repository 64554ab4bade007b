//! # Template Expansion
//!
//! Creating an element from a template deep-copies the template's anchored
//! sub-graph. Expansion happens in two steps:
//!
//! 1. [`plan_template`] builds every new element and relationship in memory,
//!    with fresh GUIDs, substituted placeholders and remapped anchors.
//! 2. The store applies the finished [`TemplatePlan`] in one write.
//!
//! Planning fails before anything is written, so a failed expansion leaves
//! no partial copy.

use crate::element::{
    AnchorRef, Classification, EffectivityWindow, ElementHeader, OpenMetadataElement, Relationship,
};
use crate::primitives::{
    MAX_TEMPLATE_ELEMENTS, MEMENTO_CLASSIFICATION, SOURCED_FROM_RELATIONSHIP,
    TEMPLATE_CLASSIFICATION,
};
use crate::store::ParentLink;
use crate::{
    ElementProperties, ElementStatus, Guid, MetadataError, MetadataResult, PropertyValue,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// OPTIONS
// =============================================================================

/// How to instantiate a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOptions {
    pub template_guid: Guid,
    /// Values for `~{name}~` placeholders in the template's string properties.
    #[serde(default)]
    pub placeholder_properties: BTreeMap<String, String>,
    /// Properties applied to the new root after substitution.
    #[serde(default)]
    pub replacement_properties: ElementProperties,
    /// `true` replaces the root's copied properties instead of merging.
    #[serde(default)]
    pub replace_all_properties: bool,
    #[serde(default)]
    pub anchor_guid: Option<Guid>,
    /// The new root anchors itself; incompatible with `anchor_guid`.
    #[serde(default)]
    pub is_own_anchor: bool,
    #[serde(default)]
    pub parent: Option<ParentLink>,
    #[serde(default)]
    pub status: Option<ElementStatus>,
    #[serde(default)]
    pub effectivity: EffectivityWindow,
}

impl TemplateOptions {
    #[must_use]
    pub fn new(template_guid: Guid) -> Self {
        Self {
            template_guid,
            placeholder_properties: BTreeMap::new(),
            replacement_properties: ElementProperties::new(),
            replace_all_properties: false,
            anchor_guid: None,
            is_own_anchor: false,
            parent: None,
            status: None,
            effectivity: EffectivityWindow::unbounded(),
        }
    }

    #[must_use]
    pub fn placeholder(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholder_properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn replacing(mut self, properties: ElementProperties) -> Self {
        self.replacement_properties = properties;
        self
    }

    /// Reject contradictory anchoring before any store work.
    pub fn validate(&self) -> MetadataResult<()> {
        if self.template_guid.is_nil() {
            return Err(MetadataError::invalid("templateGUID", "must not be nil"));
        }
        if self.is_own_anchor && self.anchor_guid.is_some() {
            return Err(MetadataError::invalid(
                "anchorGUID",
                "an element that is its own anchor cannot also name an anchor",
            ));
        }
        self.effectivity.validate("effectiveTo")
    }
}

// =============================================================================
// PLACEHOLDERS
// =============================================================================

/// Delimiters marking a placeholder name in template text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderSyntax {
    pub prefix: String,
    pub suffix: String,
}

impl Default for PlaceholderSyntax {
    fn default() -> Self {
        Self {
            prefix: "~{".to_string(),
            suffix: "}~".to_string(),
        }
    }
}

/// Placeholder values plus the delimiters that mark them in text.
#[derive(Debug, Clone)]
pub struct Placeholders<'a> {
    values: &'a BTreeMap<String, String>,
    prefix: &'a str,
    suffix: &'a str,
}

impl<'a> Placeholders<'a> {
    #[must_use]
    pub fn new(values: &'a BTreeMap<String, String>, prefix: &'a str, suffix: &'a str) -> Self {
        Self {
            values,
            prefix,
            suffix,
        }
    }

    #[must_use]
    pub fn with_syntax(values: &'a BTreeMap<String, String>, syntax: &'a PlaceholderSyntax) -> Self {
        Self::new(values, &syntax.prefix, &syntax.suffix)
    }

    /// Replace every known placeholder in `text`. Unknown ones stay as written.
    ///
    /// One left-to-right pass: substituted values are never scanned again.
    #[must_use]
    pub fn apply_text(&self, text: &str) -> String {
        if self.prefix.is_empty() || !text.contains(self.prefix) {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(self.prefix) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.prefix.len()..];
            let known = after
                .find(self.suffix)
                .and_then(|end| self.values.get(&after[..end]).map(|value| (value, end)));
            match known {
                Some((value, end)) => {
                    out.push_str(value);
                    rest = &after[end + self.suffix.len()..];
                }
                None => {
                    out.push_str(self.prefix);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Substitute inside strings, recursing into arrays and maps.
    #[must_use]
    pub fn apply(&self, value: &PropertyValue) -> PropertyValue {
        match value {
            PropertyValue::String(s) => PropertyValue::String(self.apply_text(s)),
            PropertyValue::Array(items) => {
                PropertyValue::Array(items.iter().map(|v| self.apply(v)).collect())
            }
            PropertyValue::Map(entries) => PropertyValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), self.apply(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    #[must_use]
    pub fn apply_properties(&self, properties: &ElementProperties) -> ElementProperties {
        properties
            .iter()
            .map(|(name, value)| (name.clone(), self.apply(value)))
            .collect()
    }
}

// =============================================================================
// PLANNING
// =============================================================================

/// The template's sub-graph as read from the store.
#[derive(Debug, Clone)]
pub struct TemplateSource<'a> {
    pub root: &'a OpenMetadataElement,
    /// Elements anchored on the root, directly or transitively.
    pub members: Vec<&'a OpenMetadataElement>,
    /// Relationships with both ends inside root + members.
    pub relationships: Vec<&'a Relationship>,
}

/// Everything a template expansion will write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePlan {
    pub root_guid: Guid,
    pub elements: Vec<OpenMetadataElement>,
    pub relationships: Vec<Relationship>,
}

fn copy_classifications(
    source: &BTreeMap<String, Classification>,
    placeholders: &Placeholders<'_>,
    user_id: &str,
    now: Timestamp,
) -> BTreeMap<String, Classification> {
    source
        .iter()
        .filter(|(name, _)| {
            name.as_str() != TEMPLATE_CLASSIFICATION && name.as_str() != MEMENTO_CLASSIFICATION
        })
        .map(|(name, c)| {
            (
                name.clone(),
                Classification {
                    name: c.name.clone(),
                    properties: placeholders.apply_properties(&c.properties),
                    effectivity: c.effectivity,
                    header: ElementHeader::initial(user_id, now),
                },
            )
        })
        .collect()
}

/// Build the new elements and relationships for one template expansion.
pub fn plan_template(
    source: &TemplateSource<'_>,
    options: &TemplateOptions,
    placeholders: &Placeholders<'_>,
    user_id: &str,
    now: Timestamp,
) -> MetadataResult<TemplatePlan> {
    options.validate()?;
    let total = source.members.len().saturating_add(1);
    if total > MAX_TEMPLATE_ELEMENTS {
        return Err(MetadataError::invalid(
            "templateGUID",
            format!(
                "template expands to {} elements, limit is {}",
                total, MAX_TEMPLATE_ELEMENTS
            ),
        ));
    }

    let remap: BTreeMap<Guid, Guid> = std::iter::once(source.root)
        .chain(source.members.iter().copied())
        .map(|e| (e.guid, Guid::new_v4()))
        .collect();
    let new_guid = |old: Guid| remap.get(&old).copied();
    let root_guid = new_guid(source.root.guid).ok_or_else(|| {
        MetadataError::PropertyServer("template root missing from its own mapping".to_string())
    })?;

    // Root
    let mut root_properties = placeholders.apply_properties(&source.root.properties);
    if options.replace_all_properties {
        root_properties = options.replacement_properties.clone();
    } else {
        root_properties.merge(&options.replacement_properties);
    }
    let root_anchor = match (options.anchor_guid, options.is_own_anchor) {
        (Some(anchor), false) => Some(AnchorRef::new(anchor)),
        _ => None,
    };
    let mut elements = vec![OpenMetadataElement {
        guid: root_guid,
        type_name: source.root.type_name.clone(),
        status: options.status.unwrap_or(ElementStatus::Active),
        properties: root_properties,
        classifications: copy_classifications(
            &source.root.classifications,
            placeholders,
            user_id,
            now,
        ),
        anchor: root_anchor,
        effectivity: options.effectivity,
        header: ElementHeader::initial(user_id, now),
    }];

    // Anchored members
    for member in &source.members {
        let guid = new_guid(member.guid).ok_or_else(|| {
            MetadataError::PropertyServer(format!("template member {} unmapped", member.guid))
        })?;
        let anchor = member.anchor.as_ref().map(|a| AnchorRef {
            anchor_guid: new_guid(a.anchor_guid).unwrap_or(a.anchor_guid),
            anchor_type_name: a.anchor_type_name.clone(),
            anchor_scope_guid: a.anchor_scope_guid,
        });
        elements.push(OpenMetadataElement {
            guid,
            type_name: member.type_name.clone(),
            status: member.status,
            properties: placeholders.apply_properties(&member.properties),
            classifications: copy_classifications(
                &member.classifications,
                placeholders,
                user_id,
                now,
            ),
            anchor,
            effectivity: member.effectivity,
            header: ElementHeader::initial(user_id, now),
        });
    }

    // Internal relationships
    let mut relationships = Vec::with_capacity(source.relationships.len().saturating_add(2));
    for rel in &source.relationships {
        let (Some(end1), Some(end2)) = (new_guid(rel.end1_guid), new_guid(rel.end2_guid)) else {
            continue;
        };
        relationships.push(Relationship {
            guid: Guid::new_v4(),
            type_name: rel.type_name.clone(),
            end1_guid: end1,
            end2_guid: end2,
            directed: rel.directed,
            status: rel.status,
            properties: placeholders.apply_properties(&rel.properties),
            effectivity: rel.effectivity,
            header: ElementHeader::initial(user_id, now),
            cascade_deleted: false,
        });
    }

    let link = |type_name: &str, end1, end2, properties: ElementProperties| Relationship {
        guid: Guid::new_v4(),
        type_name: type_name.to_string(),
        end1_guid: end1,
        end2_guid: end2,
        directed: true,
        status: ElementStatus::Active,
        properties,
        effectivity: EffectivityWindow::unbounded(),
        header: ElementHeader::initial(user_id, now),
        cascade_deleted: false,
    };

    relationships.push(link(
        SOURCED_FROM_RELATIONSHIP,
        root_guid,
        source.root.guid,
        ElementProperties::new(),
    ));

    if let Some(parent) = &options.parent {
        let (end1, end2) = if parent.parent_at_end1 {
            (parent.parent_guid, root_guid)
        } else {
            (root_guid, parent.parent_guid)
        };
        relationships.push(link(
            &parent.relationship_type,
            end1,
            end2,
            parent.properties.clone(),
        ));
    }

    Ok(TemplatePlan {
        root_guid,
        elements,
        relationships,
    })
}

// =============================================================================
// TESTS
// =============================================================================
