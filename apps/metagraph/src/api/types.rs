//! # API Request/Response Types
//!
//! JSON bodies for the HTTP API. Request bodies embed the core request
//! shapes (`NewElement`, `QueryOptions`, `Paging`, ...) unchanged, so the
//! wire form of those follows their serde derives.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metagraph_core::{
    ArchiveProperties, CorrelationHeader, ElementProperties, ElementQuery, ElementStatus,
    EffectivityWindow, ErrorKind, Guid, HistoryRequest, MetadataError, NewClassification,
    NewRelationship, OpenMetadataElement, Paging, QueryOptions, RelatedElement, Relationship,
    RelationshipEnd, RelationshipOptions, SearchProperties, StoreStatistics, TemplateOptions,
    Timestamp,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / STATUS RESPONSES
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub server_name: String,
    pub elements: usize,
    pub relationships: usize,
    pub correlations: usize,
    pub element_versions: usize,
}

impl StatusResponse {
    pub fn new(server_name: impl Into<String>, stats: StoreStatistics) -> Self {
        Self {
            server_name: server_name.into(),
            elements: stats.elements,
            relationships: stats.relationships,
            correlations: stats.correlations,
            element_versions: stats.element_versions,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: ErrorKind,
    pub error: String,
}

/// A [`MetadataError`] on its way out of a handler.
///
/// Invalid parameters map to 400, authorization failures to 403 and
/// store failures to 500.
#[derive(Debug)]
pub struct ApiError(pub MetadataError);

impl From<MetadataError> for ApiError {
    fn from(error: MetadataError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
            ErrorKind::PropertyServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        let body = ErrorResponse {
            success: false,
            kind: self.0.kind(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result: a status and JSON body, or an [`ApiError`].
pub type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

// =============================================================================
// SUCCESS RESPONSES
// =============================================================================

/// Acknowledges an operation with no result value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// GUID of a newly created element, relationship or correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidResponse {
    pub success: bool,
    pub guid: Guid,
}

impl GuidResponse {
    pub fn new(guid: Guid) -> Self {
        Self {
            success: true,
            guid,
        }
    }
}

/// A single element. `element` is `null` when no visible element matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementResponse {
    pub success: bool,
    pub element: Option<OpenMetadataElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementsResponse {
    pub success: bool,
    pub elements: Vec<OpenMetadataElement>,
}

impl ElementsResponse {
    pub fn new(elements: Vec<OpenMetadataElement>) -> Self {
        Self {
            success: true,
            elements,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResponse {
    pub success: bool,
    pub relationship: Option<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipsResponse {
    pub success: bool,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedElementsResponse {
    pub success: bool,
    pub related: Vec<RelatedElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiersResponse {
    pub success: bool,
    pub identifiers: Vec<CorrelationHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub valid: bool,
}

/// Snapshot export: base64 of the binary snapshot plus its BLAKE3 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub size: usize,
    pub checksum: String,
    pub data: String,
}

// =============================================================================
// ELEMENT REQUESTS
// =============================================================================

/// Query options only; the body of delete and restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsRequest {
    pub options: QueryOptions,
}

/// Query-string options for `GET` lookups. Times are epoch milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadParams {
    pub effective_time: Option<i64>,
    pub as_of_time: Option<i64>,
    pub for_lineage: bool,
}

impl ReadParams {
    pub fn to_options(&self) -> QueryOptions {
        QueryOptions {
            effective_time: self.effective_time.map(Timestamp),
            as_of_time: self.as_of_time.map(Timestamp),
            for_lineage: self.for_lineage,
            ..QueryOptions::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub template: TemplateOptions,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePropertiesRequest {
    pub replace_all_properties: bool,
    pub properties: ElementProperties,
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: ElementStatus,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivityRequest {
    pub effectivity: EffectivityWindow,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveRequest {
    pub archive: ArchiveProperties,
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryBody {
    pub history: HistoryRequest,
    pub options: QueryOptions,
}

/// Element search.
///
/// With `search_string` set this is a literal contains-match over the name
/// properties, restricted to `query.type_name`. Otherwise `query` runs as
/// given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindRequest {
    pub search_string: Option<String>,
    pub query: ElementQuery,
    pub options: QueryOptions,
    pub paging: Paging,
}

// =============================================================================
// CLASSIFICATION REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub classification: NewClassification,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclassifyRequest {
    pub classification_name: String,
    #[serde(default)]
    pub replace_all_properties: bool,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclassifyRequest {
    pub classification_name: String,
    #[serde(default)]
    pub options: QueryOptions,
}

// =============================================================================
// RELATIONSHIP REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRelationshipRequest {
    pub relationship: NewRelationship,
    #[serde(default)]
    pub relationship_options: RelationshipOptions,
    #[serde(default)]
    pub options: QueryOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedRequest {
    pub starting_end: RelationshipEnd,
    pub relationship_type: Option<String>,
    pub options: QueryOptions,
    pub paging: Paging,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindRelationshipsRequest {
    pub relationship_type: Option<String>,
    pub search_properties: Option<SearchProperties>,
    pub options: QueryOptions,
    pub paging: Paging,
}

// =============================================================================
// CORRELATION REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveIdentifierRequest {
    pub scope_guid: Guid,
    pub identifier: String,
    pub element_guid: Guid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub scope_guid: Guid,
    pub element_guid: Guid,
    pub element_type_name: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateIdentifierRequest {
    pub scope_guid: Guid,
    pub identifier: String,
    pub element_guid: Guid,
    pub element_type_name: String,
    #[serde(default)]
    pub effective_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementsForIdentifierRequest {
    pub scope_guid: Guid,
    pub identifier: String,
    #[serde(default)]
    pub options: QueryOptions,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifiersForElementRequest {
    pub scope_guid: Guid,
    pub element_guid: Guid,
    #[serde(default)]
    pub options: QueryOptions,
    #[serde(default)]
    pub paging: Paging,
}
