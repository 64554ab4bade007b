//! # Fixed Primitives
//!
//! Compile-time limits and well-known names for the metadata core.
//!
//! These values are immutable at runtime. Tunable limits (page sizes,
//! default effective time) live in [`crate::config::ClientConfig`].

/// Magic bytes for the snapshot binary format header.
///
/// - File Header = Magic Bytes ("MGRF") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MGRF";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Page size used when the caller passes 0 and the configuration sets no limit.
pub const DEFAULT_PAGE_SIZE: usize = 0;

/// Upper bound on transitive anchor walks (cascade, cycle detection, templates).
///
/// Prevents runaway traversal when stored anchors are corrupt.
pub const MAX_ANCHOR_DEPTH: usize = 100;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for type names, classification names and property names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for a string literal (64KB).
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum nesting depth of array/map literals.
pub const MAX_VALUE_DEPTH: usize = 16;

/// Maximum number of conditions in one `SearchProperties`.
pub const MAX_CONDITIONS: usize = 100;

/// Maximum number of elements a single template expansion may create.
pub const MAX_TEMPLATE_ELEMENTS: usize = 1000;

// =============================================================================
// WELL-KNOWN NAMES
// =============================================================================

/// Property holding an element's unique name.
pub const QUALIFIED_NAME: &str = "qualifiedName";

/// Properties scanned by free-text search.
pub const SEARCHABLE_NAME_PROPERTIES: [&str; 4] =
    ["qualifiedName", "displayName", "name", "description"];

/// Classification marking an archived tombstone.
pub const MEMENTO_CLASSIFICATION: &str = "Memento";

/// Classification marking a known duplicate.
pub const KNOWN_DUPLICATE_CLASSIFICATION: &str = "KnownDuplicate";

/// Classification marking an element as a template.
pub const TEMPLATE_CLASSIFICATION: &str = "Template";

/// Relationship linking a templated element to its template.
pub const SOURCED_FROM_RELATIONSHIP: &str = "SourcedFrom";
