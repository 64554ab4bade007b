//! # Descriptor Evaluation
//!
//! Store-side evaluation of [`SearchProperties`] and [`SearchClassifications`].
//!
//! Descriptors are compiled once per call (regexes built up front, bad
//! patterns rejected as invalid input) and then tested against every
//! candidate element.

use crate::element::{OpenMetadataElement, Relationship, Temporal};
use crate::search::{
    MatchCriteria, PropertyComparisonOperator, PropertyCondition, SearchClassifications,
    SearchProperties,
};
use crate::{ElementProperties, MetadataError, MetadataResult, PropertyValue, Timestamp};
use regex::Regex;

// =============================================================================
// PROPERTY CONDITIONS
// =============================================================================

#[derive(Debug)]
struct CompiledCondition {
    property: String,
    operator: PropertyComparisonOperator,
    value: Option<PropertyValue>,
    pattern: Option<Regex>,
}

impl CompiledCondition {
    fn compile(condition: &PropertyCondition) -> MetadataResult<Self> {
        let pattern = if condition.operator == PropertyComparisonOperator::Like {
            let text = condition
                .value
                .as_ref()
                .and_then(PropertyValue::as_str)
                .ok_or_else(|| {
                    MetadataError::invalid(
                        "searchProperties",
                        format!("LIKE on '{}' needs a string pattern", condition.property),
                    )
                })?;
            let anchored = format!("^(?:{})$", text);
            Some(Regex::new(&anchored).map_err(|e| {
                MetadataError::invalid(
                    "searchProperties",
                    format!("bad pattern for '{}': {}", condition.property, e),
                )
            })?)
        } else {
            None
        };

        Ok(Self {
            property: condition.property.clone(),
            operator: condition.operator,
            value: condition.value.clone(),
            pattern,
        })
    }

    fn matches(&self, properties: &ElementProperties) -> bool {
        let actual = properties.get(&self.property);
        match self.operator {
            PropertyComparisonOperator::IsNull => actual.is_none(),
            PropertyComparisonOperator::NotNull => actual.is_some(),
            PropertyComparisonOperator::Like => match (actual, &self.pattern) {
                (Some(actual), Some(pattern)) => like(actual, pattern),
                _ => false,
            },
            PropertyComparisonOperator::In => match (actual, &self.value) {
                (Some(actual), Some(PropertyValue::Array(members))) => members.contains(actual),
                _ => false,
            },
            PropertyComparisonOperator::Eq => actual.is_some() && actual == self.value.as_ref(),
            PropertyComparisonOperator::Neq => actual != self.value.as_ref(),
            PropertyComparisonOperator::Lt => self.ordered(actual, |o| o.is_lt()),
            PropertyComparisonOperator::Lte => self.ordered(actual, |o| o.is_le()),
            PropertyComparisonOperator::Gt => self.ordered(actual, |o| o.is_gt()),
            PropertyComparisonOperator::Gte => self.ordered(actual, |o| o.is_ge()),
        }
    }

    /// Ordered comparisons only hold between literals of the same category.
    fn ordered(
        &self,
        actual: Option<&PropertyValue>,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> bool {
        match (actual, &self.value) {
            (Some(actual), Some(expected)) if actual.category() == expected.category() => {
                accept(actual.cmp(expected))
            }
            _ => false,
        }
    }
}

/// Arrays match when any member matches.
fn like(actual: &PropertyValue, pattern: &Regex) -> bool {
    match actual {
        PropertyValue::Array(members) => members.iter().any(|m| like(m, pattern)),
        other => other.as_text().is_some_and(|text| pattern.is_match(&text)),
    }
}

/// A compiled [`SearchProperties`].
#[derive(Debug)]
pub struct PropertyMatcher {
    conditions: Vec<CompiledCondition>,
    criteria: MatchCriteria,
}

impl PropertyMatcher {
    pub fn compile(search: &SearchProperties) -> MetadataResult<Self> {
        let conditions = search
            .conditions
            .iter()
            .map(CompiledCondition::compile)
            .collect::<MetadataResult<Vec<_>>>()?;
        Ok(Self {
            conditions,
            criteria: search.match_criteria,
        })
    }

    #[must_use]
    pub fn matches(&self, properties: &ElementProperties) -> bool {
        self.criteria
            .combine(self.conditions.iter().map(|c| c.matches(properties)))
    }
}

// =============================================================================
// CLASSIFICATION CONDITIONS
// =============================================================================

#[derive(Debug)]
struct CompiledClassification {
    name: String,
    properties: Option<PropertyMatcher>,
}

/// A compiled [`SearchClassifications`].
#[derive(Debug)]
pub struct ClassificationMatcher {
    conditions: Vec<CompiledClassification>,
    criteria: MatchCriteria,
}

impl ClassificationMatcher {
    pub fn compile(search: &SearchClassifications) -> MetadataResult<Self> {
        let conditions = search
            .conditions
            .iter()
            .map(|c| {
                Ok(CompiledClassification {
                    name: c.name.clone(),
                    properties: c
                        .search_properties
                        .as_ref()
                        .map(PropertyMatcher::compile)
                        .transpose()?,
                })
            })
            .collect::<MetadataResult<Vec<_>>>()?;
        Ok(Self {
            conditions,
            criteria: search.match_criteria,
        })
    }

    /// Only classifications effective at `effective_time` count.
    #[must_use]
    pub fn matches(&self, element: &OpenMetadataElement, effective_time: Option<Timestamp>) -> bool {
        self.criteria.combine(self.conditions.iter().map(|condition| {
            element
                .classification(&condition.name)
                .filter(|c| c.is_effective_at(effective_time))
                .is_some_and(|c| {
                    condition
                        .properties
                        .as_ref()
                        .is_none_or(|p| p.matches(&c.properties))
                })
        }))
    }
}

// =============================================================================
// COMBINED FILTER
// =============================================================================

/// Both search axes of a find call, ANDed together.
#[derive(Debug, Default)]
pub struct ElementFilter {
    type_name: Option<String>,
    properties: Option<PropertyMatcher>,
    classifications: Option<ClassificationMatcher>,
}

impl ElementFilter {
    /// Compile a filter; `None` on an axis means "no constraint".
    pub fn compile(
        type_name: Option<&str>,
        properties: Option<&SearchProperties>,
        classifications: Option<&SearchClassifications>,
    ) -> MetadataResult<Self> {
        Ok(Self {
            type_name: type_name.map(str::to_string),
            properties: properties.map(PropertyMatcher::compile).transpose()?,
            classifications: classifications
                .map(ClassificationMatcher::compile)
                .transpose()?,
        })
    }

    #[must_use]
    pub fn matches(&self, element: &OpenMetadataElement, effective_time: Option<Timestamp>) -> bool {
        self.type_name
            .as_deref()
            .is_none_or(|t| element.type_name == t)
            && self
                .properties
                .as_ref()
                .is_none_or(|p| p.matches(&element.properties))
            && self
                .classifications
                .as_ref()
                .is_none_or(|c| c.matches(element, effective_time))
    }

    /// Relationships have no classifications; that axis is ignored.
    #[must_use]
    pub fn matches_relationship(&self, relationship: &Relationship) -> bool {
        self.type_name
            .as_deref()
            .is_none_or(|t| relationship.type_name == t)
            && self
                .properties
                .as_ref()
                .is_none_or(|p| p.matches(&relationship.properties))
    }
}

// =============================================================================
// TESTS
// =============================================================================
