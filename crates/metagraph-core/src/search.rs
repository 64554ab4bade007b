//! # Search Criteria Builder
//!
//! Composable, serializable query descriptors. Nothing here touches a store:
//! building a descriptor is pure data construction, evaluation lives in
//! [`crate::matcher`].
//!
//! Property search and classification search are independent axes. A find
//! call may carry both; the store ANDs them together while each axis uses its
//! own [`MatchCriteria`] internally.

use crate::PropertyValue;
use serde::{Deserialize, Serialize};

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// How a property value is compared with the literal in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyComparisonOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Regular-expression match over the value's text form (whole value).
    Like,
    /// The literal is an array; the property must equal one of its members.
    In,
    IsNull,
    NotNull,
}

impl PropertyComparisonOperator {
    /// Operators that carry no literal.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }
}

/// How a list of conditions is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchCriteria {
    /// Every condition must match.
    #[default]
    All,
    /// At least one condition must match.
    Any,
    /// No condition may match.
    None,
}

impl MatchCriteria {
    /// Fold a sequence of condition outcomes. An empty sequence always matches.
    pub fn combine(self, mut outcomes: impl Iterator<Item = bool>) -> bool {
        match self {
            Self::All => outcomes.all(|m| m),
            Self::None => !outcomes.any(|m| m),
            Self::Any => {
                let mut seen = false;
                for matched in outcomes {
                    if matched {
                        return true;
                    }
                    seen = true;
                }
                !seen
            }
        }
    }
}

/// One comparison against a named property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyCondition {
    pub property: String,
    pub operator: PropertyComparisonOperator,
    /// Absent for `IsNull`/`NotNull`.
    #[serde(default)]
    pub value: Option<PropertyValue>,
}

impl PropertyCondition {
    #[must_use]
    pub fn new(
        property: impl Into<String>,
        operator: PropertyComparisonOperator,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// A condition with no literal (`IsNull` / `NotNull`).
    #[must_use]
    pub fn unary(property: impl Into<String>, operator: PropertyComparisonOperator) -> Self {
        Self {
            property: property.into(),
            operator,
            value: None,
        }
    }
}

/// An ordered list of property conditions plus the rule that combines them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchProperties {
    pub conditions: Vec<PropertyCondition>,
    pub match_criteria: MatchCriteria,
}

impl SearchProperties {
    #[must_use]
    pub fn new(match_criteria: MatchCriteria) -> Self {
        Self {
            conditions: Vec::new(),
            match_criteria,
        }
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, condition: PropertyCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Match on one named classification, optionally on its properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassificationCondition {
    pub name: String,
    #[serde(default)]
    pub search_properties: Option<SearchProperties>,
}

/// An ordered list of classification conditions plus their combining rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchClassifications {
    pub conditions: Vec<ClassificationCondition>,
    pub match_criteria: MatchCriteria,
}

impl SearchClassifications {
    #[must_use]
    pub fn new(match_criteria: MatchCriteria) -> Self {
        Self {
            conditions: Vec::new(),
            match_criteria,
        }
    }

    #[must_use]
    pub fn with(mut self, condition: ClassificationCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Exact or substring match for the convenience builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyMatch {
    Exact,
    Contains,
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Regex matching any value that contains `value` literally.
///
/// Metacharacters in `value` are escaped so raw text never acts as a pattern.
#[must_use]
pub fn contains_pattern(value: &str) -> String {
    format!(".*{}.*", regex::escape(value))
}

/// Regex matching exactly `value`, metacharacters escaped.
#[must_use]
pub fn exact_pattern(value: &str) -> String {
    regex::escape(value)
}

/// "Any of these properties equals `value`."
#[must_use]
pub fn by_property_exact<I, S>(names: I, value: impl Into<PropertyValue>) -> SearchProperties
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let value = value.into();
    names
        .into_iter()
        .fold(SearchProperties::new(MatchCriteria::Any), |search, name| {
            search.with(PropertyCondition::new(
                name,
                PropertyComparisonOperator::Eq,
                value.clone(),
            ))
        })
}

/// "Any of these properties contains `value`" (LIKE over an escaped pattern).
#[must_use]
pub fn by_property_contains<I, S>(names: I, value: &str) -> SearchProperties
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let pattern = PropertyValue::String(contains_pattern(value));
    names
        .into_iter()
        .fold(SearchProperties::new(MatchCriteria::Any), |search, name| {
            search.with(PropertyCondition::new(
                name,
                PropertyComparisonOperator::Like,
                pattern.clone(),
            ))
        })
}

/// Elements carrying the named classification.
#[must_use]
pub fn by_classification(name: impl Into<String>) -> SearchClassifications {
    SearchClassifications::new(MatchCriteria::All).with(ClassificationCondition {
        name: name.into(),
        search_properties: None,
    })
}

/// Elements carrying the named classification with any of `property_names`
/// matching `value`.
#[must_use]
pub fn by_classification_property<I, S>(
    name: impl Into<String>,
    property_names: I,
    value: &str,
    mode: PropertyMatch,
) -> SearchClassifications
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inner = match mode {
        PropertyMatch::Exact => by_property_exact(property_names, value),
        PropertyMatch::Contains => by_property_contains(property_names, value),
    };
    SearchClassifications::new(MatchCriteria::All).with(ClassificationCondition {
        name: name.into(),
        search_properties: Some(inner),
    })
}

// =============================================================================
// TESTS
// =============================================================================
