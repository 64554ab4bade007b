//! # API Endpoint Handlers
//!
//! Each handler unpacks its request, makes one [`MetadataClient`] call and
//! wraps the result. Validation and error classification happen in the
//! client; [`ApiError`] turns the error kind into a status code.
//!
//! [`MetadataClient`]: metagraph_core::MetadataClient

use super::{
    AppState,
    auth::UserId,
    types::{
        AckResponse, ApiError, ApiResult, ArchiveRequest, ClassifyRequest, ConfirmRequest,
        CreateRelationshipRequest, DeclassifyRequest, EffectivityRequest, ElementResponse,
        ElementsForIdentifierRequest, ElementsResponse, ExportResponse, FindRelationshipsRequest,
        FindRequest, GuidResponse, HealthResponse, HistoryBody, IdentifiersForElementRequest,
        IdentifiersResponse, OptionsRequest, ReadParams, ReclassifyRequest, RelatedElementsResponse,
        RelatedRequest, RelationshipResponse, RelationshipsResponse, RemoveIdentifierRequest,
        StatusRequest, StatusResponse, TemplateRequest, UpdatePropertiesRequest,
        ValidateIdentifierRequest, ValidateResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use metagraph_core::{
    CorrelationRequest, Guid, NewElement,
    formats::{snapshot_checksum, snapshot_to_bytes},
};

fn path_guid(text: &str) -> Result<Guid, ApiError> {
    Ok(Guid::parse(text, "guid")?)
}

fn ack() -> (StatusCode, Json<AckResponse>) {
    (StatusCode::OK, Json(AckResponse::ok()))
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Element, relationship and correlation counts.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let stats = state.client.statistics()?;
    let response = StatusResponse::new(state.client.config().server_name.clone(), stats);
    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
// ELEMENTS
// =============================================================================

pub async fn create_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(element): Json<NewElement>,
) -> ApiResult<GuidResponse> {
    let guid = state.client.create_metadata_element_in_store(&user, &element)?;
    Ok((StatusCode::CREATED, Json(GuidResponse::new(guid))))
}

pub async fn create_from_template_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<TemplateRequest>,
) -> ApiResult<GuidResponse> {
    let guid = state.client.create_metadata_element_from_template(
        &user,
        &request.template,
        &request.options,
    )?;
    Ok((StatusCode::CREATED, Json(GuidResponse::new(guid))))
}

/// Fetch one element. An unknown or invisible GUID is `200` with a `null`
/// element, not an error.
pub async fn get_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Query(params): Query<ReadParams>,
) -> ApiResult<ElementResponse> {
    let guid = path_guid(&guid)?;
    let element = state
        .client
        .get_metadata_element_by_guid(&user, guid, &params.to_options())?;
    Ok((
        StatusCode::OK,
        Json(ElementResponse {
            success: true,
            element,
        }),
    ))
}

pub async fn update_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<UpdatePropertiesRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.update_metadata_element_in_store(
        &user,
        guid,
        request.replace_all_properties,
        &request.properties,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn update_status_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.update_metadata_element_status_in_store(
        &user,
        guid,
        request.status,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn update_effectivity_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<EffectivityRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.update_metadata_element_effectivity_in_store(
        &user,
        guid,
        request.effectivity,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn delete_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<OptionsRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state
        .client
        .delete_metadata_element_in_store(&user, guid, &request.options)?;
    Ok(ack())
}

pub async fn archive_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<ArchiveRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.archive_metadata_element_in_store(
        &user,
        guid,
        &request.archive,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn restore_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<OptionsRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state
        .client
        .restore_metadata_element_in_store(&user, guid, &request.options)?;
    Ok(ack())
}

/// Versions of one element, newest first unless `oldest_first` is set.
pub async fn element_history_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<HistoryBody>,
) -> ApiResult<ElementsResponse> {
    let guid = path_guid(&guid)?;
    let versions = state.client.get_metadata_element_history(
        &user,
        guid,
        &request.history,
        &request.options,
    )?;
    Ok((StatusCode::OK, Json(ElementsResponse::new(versions))))
}

pub async fn find_elements_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<FindRequest>,
) -> ApiResult<ElementsResponse> {
    let elements = match &request.search_string {
        Some(search) => state.client.find_metadata_elements_with_string(
            &user,
            search,
            request.query.type_name.as_deref(),
            &request.options,
            request.paging,
        )?,
        None => state.client.find_metadata_elements(
            &user,
            &request.query,
            &request.options,
            request.paging,
        )?,
    };
    Ok((StatusCode::OK, Json(ElementsResponse::new(elements))))
}

// =============================================================================
// CLASSIFICATIONS
// =============================================================================

pub async fn classify_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.classify_metadata_element_in_store(
        &user,
        guid,
        &request.classification,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn reclassify_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<ReclassifyRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.reclassify_metadata_element_in_store(
        &user,
        guid,
        &request.classification_name,
        request.replace_all_properties,
        &request.properties,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn declassify_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<DeclassifyRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.declassify_metadata_element_in_store(
        &user,
        guid,
        &request.classification_name,
        &request.options,
    )?;
    Ok(ack())
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

pub async fn create_relationship_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<CreateRelationshipRequest>,
) -> ApiResult<GuidResponse> {
    let guid = state.client.create_related_elements_in_store(
        &user,
        &request.relationship,
        &request.relationship_options,
        &request.options,
    )?;
    Ok((StatusCode::CREATED, Json(GuidResponse::new(guid))))
}

pub async fn get_relationship_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Query(params): Query<ReadParams>,
) -> ApiResult<RelationshipResponse> {
    let guid = path_guid(&guid)?;
    let relationship = state
        .client
        .get_relationship_by_guid(&user, guid, &params.to_options())?;
    Ok((
        StatusCode::OK,
        Json(RelationshipResponse {
            success: true,
            relationship,
        }),
    ))
}

pub async fn update_relationship_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<UpdatePropertiesRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state.client.update_related_elements_in_store(
        &user,
        guid,
        request.replace_all_properties,
        &request.properties,
        &request.options,
    )?;
    Ok(ack())
}

pub async fn delete_relationship_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<OptionsRequest>,
) -> ApiResult<AckResponse> {
    let guid = path_guid(&guid)?;
    state
        .client
        .delete_related_elements_in_store(&user, guid, &request.options)?;
    Ok(ack())
}

pub async fn find_relationships_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<FindRelationshipsRequest>,
) -> ApiResult<RelationshipsResponse> {
    let relationships = state.client.find_relationships_between_elements(
        &user,
        request.relationship_type.as_deref(),
        request.search_properties.as_ref(),
        &request.options,
        request.paging,
    )?;
    Ok((
        StatusCode::OK,
        Json(RelationshipsResponse {
            success: true,
            relationships,
        }),
    ))
}

/// Elements linked to `guid`, each paired with the linking relationship.
pub async fn related_elements_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(guid): Path<String>,
    Json(request): Json<RelatedRequest>,
) -> ApiResult<RelatedElementsResponse> {
    let guid = path_guid(&guid)?;
    let related = state.client.get_related_metadata_elements(
        &user,
        guid,
        request.starting_end,
        request.relationship_type.as_deref(),
        &request.options,
        request.paging,
    )?;
    Ok((
        StatusCode::OK,
        Json(RelatedElementsResponse {
            success: true,
            related,
        }),
    ))
}

// =============================================================================
// CORRELATIONS
// =============================================================================

pub async fn add_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<CorrelationRequest>,
) -> ApiResult<GuidResponse> {
    let guid = state.client.add_external_identifier(&user, &request)?;
    Ok((StatusCode::CREATED, Json(GuidResponse::new(guid))))
}

pub async fn update_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<CorrelationRequest>,
) -> ApiResult<GuidResponse> {
    let guid = state.client.update_external_identifier(&user, &request)?;
    Ok((StatusCode::OK, Json(GuidResponse::new(guid))))
}

pub async fn remove_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<RemoveIdentifierRequest>,
) -> ApiResult<AckResponse> {
    state.client.remove_external_identifier(
        &user,
        request.scope_guid,
        &request.identifier,
        request.element_guid,
    )?;
    Ok(ack())
}

pub async fn confirm_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult<AckResponse> {
    state.client.confirm_synchronization(
        &user,
        request.scope_guid,
        request.element_guid,
        &request.element_type_name,
        &request.identifier,
    )?;
    Ok(ack())
}

pub async fn validate_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<ValidateIdentifierRequest>,
) -> ApiResult<ValidateResponse> {
    let valid = state.client.validate_external_identifier(
        &user,
        request.scope_guid,
        &request.identifier,
        request.element_guid,
        &request.element_type_name,
        request.effective_time,
    )?;
    Ok((
        StatusCode::OK,
        Json(ValidateResponse {
            success: true,
            valid,
        }),
    ))
}

pub async fn elements_for_identifier_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<ElementsForIdentifierRequest>,
) -> ApiResult<ElementsResponse> {
    let elements = state.client.get_elements_for_external_identifier(
        &user,
        request.scope_guid,
        &request.identifier,
        &request.options,
        request.paging,
    )?;
    Ok((StatusCode::OK, Json(ElementsResponse::new(elements))))
}

pub async fn identifiers_for_element_handler(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(request): Json<IdentifiersForElementRequest>,
) -> ApiResult<IdentifiersResponse> {
    let identifiers = state.client.get_external_identifiers(
        &user,
        request.scope_guid,
        request.element_guid,
        &request.options,
        request.paging,
    )?;
    Ok((
        StatusCode::OK,
        Json(IdentifiersResponse {
            success: true,
            identifiers,
        }),
    ))
}

// =============================================================================
// EXPORT
// =============================================================================

/// Encode the whole store as a snapshot, base64 in the JSON body.
pub async fn export_handler(State(state): State<AppState>) -> ApiResult<ExportResponse> {
    let bytes = snapshot_to_bytes(&state.store.snapshot())?;
    let response = ExportResponse {
        success: true,
        size: bytes.len(),
        checksum: snapshot_checksum(&bytes),
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    };
    Ok((StatusCode::OK, Json(response)))
}
