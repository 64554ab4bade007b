//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the metadata graph:
//! - Identifiers and time (`Guid`, `Timestamp`)
//! - Property literals (`PropertyValue`, `ElementProperties`)
//! - Lifecycle status (`ElementStatus`)
//! - Error types (`MetadataError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they are used as keys, for `BTreeMap`/`BTreeSet` ordering
//! - Carry no floating point values, so equality is exact

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Globally unique identifier of an element, relationship, classification
/// or correlation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Allocate a fresh random GUID.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a GUID from its hyphenated text form.
    ///
    /// `parameter` names the caller-facing argument for the error message.
    pub fn parse(text: &str, parameter: &str) -> MetadataResult<Self> {
        Uuid::parse_str(text.trim())
            .map(Self)
            .map_err(|e| MetadataError::invalid(parameter, format!("malformed guid '{}': {}", text, e)))
    }

    /// The nil GUID, never handed out by `new_v4`.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Check whether this is the nil GUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    /// Create a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Raw milliseconds since the epoch.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Offset by a signed number of milliseconds (saturating).
    #[must_use]
    pub const fn plus_millis(self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// =============================================================================
// PROPERTY LITERALS
// =============================================================================

/// A typed property literal.
///
/// Every property stored on an element, relationship or classification, and
/// every literal inside a search condition, is one of these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Boolean(bool),
    Date(Timestamp),
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Create a string literal.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Borrow the text of a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the primitive category, used in error messages and logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Render a scalar literal as text for pattern matching.
    ///
    /// Arrays and maps have no single text form and return `None`.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Date(t) => Some(t.0.to_string()),
            Self::Array(_) | Self::Map(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Timestamp> for PropertyValue {
    fn from(t: Timestamp) -> Self {
        Self::Date(t)
    }
}

/// A property bag: property name -> typed literal, in name order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementProperties(BTreeMap<String, PropertyValue>);

impl ElementProperties {
    /// Create an empty property bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Insert or overwrite a property, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove a property.
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.0.remove(name)
    }

    /// Look up a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Look up a string property.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(PropertyValue::as_str)
    }

    /// Overlay `other` onto this bag (values in `other` win).
    pub fn merge(&mut self, other: &ElementProperties) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in property-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    /// Mutable iteration in property-name order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut PropertyValue)> {
        self.0.iter_mut()
    }
}

impl FromIterator<(String, PropertyValue)> for ElementProperties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Lifecycle status of an element or relationship.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementStatus {
    Unknown,
    Draft,
    Prepared,
    Proposed,
    Approved,
    Rejected,
    ApprovedConcept,
    UnderDevelopment,
    DevelopmentComplete,
    ApprovedForDeployment,
    StandbyDeployment,
    #[default]
    Active,
    Failed,
    Disabled,
    Complete,
    Deprecated,
    Other,
    /// Terminal but still visible to lineage queries.
    Archived,
    /// Terminal; only lineage queries can see it.
    Deleted,
}

impl ElementStatus {
    /// Check whether the status is one of the two terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Deleted)
    }
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Draft => "DRAFT",
            Self::Prepared => "PREPARED",
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ApprovedConcept => "APPROVED_CONCEPT",
            Self::UnderDevelopment => "UNDER_DEVELOPMENT",
            Self::DevelopmentComplete => "DEVELOPMENT_COMPLETE",
            Self::ApprovedForDeployment => "APPROVED_FOR_DEPLOYMENT",
            Self::StandbyDeployment => "STANDBY_DEPLOYMENT",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
            Self::Disabled => "DISABLED",
            Self::Complete => "COMPLETE",
            Self::Deprecated => "DEPRECATED",
            Self::Other => "OTHER",
            Self::Archived => "ARCHIVED",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// The three caller-visible error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is wrong; nothing was applied.
    InvalidParameter,
    /// The caller lacks rights for the action.
    NotAuthorized,
    /// The store failed or returned something unusable.
    PropertyServer,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => f.write_str("invalid_parameter"),
            Self::NotAuthorized => f.write_str("not_authorized"),
            Self::PropertyServer => f.write_str("property_server"),
        }
    }
}

/// Errors raised by the metadata core and its stores.
///
/// Every variant belongs to exactly one `ErrorKind`; see [`MetadataError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// A required parameter is missing or malformed.
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// No visible element has this GUID.
    #[error("element not found: {0}")]
    ElementNotFound(Guid),

    /// No visible relationship has this GUID.
    #[error("relationship not found: {0}")]
    RelationshipNotFound(Guid),

    /// The element already carries this classification.
    #[error("element {guid} is already classified as {classification}")]
    AlreadyClassified { guid: Guid, classification: String },

    /// The element does not carry this classification.
    #[error("element {guid} is not classified as {classification}")]
    NotClassified { guid: Guid, classification: String },

    /// The external identifier is already mapped to another element.
    #[error(
        "external identifier '{identifier}' in scope {scope_guid} is already mapped to element {existing_element}"
    )]
    DuplicateCorrelation {
        scope_guid: Guid,
        identifier: String,
        existing_element: Guid,
    },

    /// No correlation header matches the request.
    #[error("no correlation for identifier '{identifier}' in scope {scope_guid}")]
    CorrelationNotFound { scope_guid: Guid, identifier: String },

    /// The caller is not allowed to perform the action.
    #[error("user '{user_id}' is not authorized to {action}")]
    NotAuthorized { user_id: String, action: String },

    /// A stored element does not fit the requested typed view.
    #[error("{method}: element of type {type_name} could not be converted: {reason}")]
    Conversion {
        method: String,
        type_name: String,
        reason: String,
    },

    /// The store reported an internal failure.
    #[error("property server error: {0}")]
    PropertyServer(String),

    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl MetadataError {
    /// Shorthand for `InvalidParameter`.
    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// The caller-visible class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::ElementNotFound(_)
            | Self::RelationshipNotFound(_)
            | Self::AlreadyClassified { .. }
            | Self::NotClassified { .. }
            | Self::DuplicateCorrelation { .. }
            | Self::CorrelationNotFound { .. } => ErrorKind::InvalidParameter,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::Conversion { .. }
            | Self::PropertyServer(_)
            | Self::Serialization(_)
            | Self::Io(_) => ErrorKind::PropertyServer,
        }
    }
}

/// Result alias used throughout the crate.
pub type MetadataResult<T> = Result<T, MetadataError>;

// =============================================================================
// TESTS
// =============================================================================
