//! # metagraph-core
//!
//! A versioned metadata graph with effectivity windows, external identifier
//! correlation and composable search criteria.
//!
//! ## Layers
//!
//! - `element`, `search`, `correlation`: the model. Pure values and functions.
//! - `store`: the `MetadataStore` contract every backing store implements.
//! - `memory`: `MemoryStore`, the in-process reference store.
//! - `client`: `MetadataClient`, the operation set collaborators call.
//!
//! ## Constraints
//!
//! - Synchronous: no async, no network dependencies.
//! - Deterministic: every stored collection is a `BTreeMap`, so default
//!   result order is stable GUID order.
//! - The client keeps no state between calls beyond its fixed configuration.

// =============================================================================
// MODULES
// =============================================================================

pub mod client;
pub mod config;
pub mod converter;
pub mod correlation;
pub mod element;
pub mod formats;
pub mod matcher;
pub mod memory;
pub mod primitives;
pub mod search;
pub mod store;
pub mod template;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ElementProperties, ElementStatus, ErrorKind, Guid, MetadataError, MetadataResult,
    PropertyValue, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Model
// =============================================================================

pub use correlation::{
    CorrelationHeader, CorrelationLedger, CorrelationRequest, ExternalIdentifierProperties,
    ExternalScope, KeyPattern, SynchDirection,
};
pub use element::{
    AnchorRef, Classification, EffectivityWindow, ElementHeader, HistoryRequest,
    OpenMetadataElement, Paging, QueryOptions, Relationship, SequencingOrder, Temporal, Versioned,
};
pub use search::{
    ClassificationCondition, MatchCriteria, PropertyComparisonOperator, PropertyCondition,
    PropertyMatch, SearchClassifications, SearchProperties,
};

// =============================================================================
// RE-EXPORTS: Store and Client
// =============================================================================

pub use client::MetadataClient;
pub use config::{ClientConfig, EffectiveTimePolicy};
pub use converter::{
    ElementConverter, ElementSummary, ReferenceableConverter, ReferenceableView, SummaryConverter,
};
pub use memory::{MemoryStore, StoreSnapshot};
pub use store::{
    AccessAction, AccessControl, AllowAll, AnchorDirection, ArchiveProperties, Clock, DenyList,
    ElementQuery, ManualClock, MetadataStore, NewClassification, NewElement, NewRelationship,
    ParentLink, RelatedElement, RelationshipEnd, RelationshipOptions, RelationshipQuery,
    StoreStatistics, SystemClock,
};
pub use template::{PlaceholderSyntax, TemplateOptions};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, load_snapshot, save_snapshot, snapshot_from_bytes, snapshot_to_bytes};
