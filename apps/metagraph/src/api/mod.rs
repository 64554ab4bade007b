//! # metagraph HTTP API Module
//!
//! HTTP front end over [`MetadataClient`], built with axum.
//!
//! ## Endpoints
//!
//! Every endpoint except `/health`, `/status` and `/export` acts on behalf
//! of the caller named in the `X-User-Id` header.
//!
//! - `GET /health`, `GET /status`, `POST /export`
//! - `POST /elements`, `POST /elements/from-template`, `POST /elements/find`
//! - `GET /elements/{guid}` and `POST /elements/{guid}/{update,status,
//!   effectivity,delete,archive,restore,history,classify,reclassify,
//!   declassify,related}`
//! - `POST /relationships`, `POST /relationships/find`,
//!   `GET /relationships/{guid}`, `POST /relationships/{guid}/{update,delete}`
//! - `POST /correlations/{add,update,remove,confirm,validate,elements,identifiers}`
//!
//! Failures return `{"success": false, "kind": ..., "error": ...}` with
//! 400 for invalid parameters, 403 for authorization failures and 500 for
//! store failures.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `METAGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `METAGRAPH_RATE_LIMIT` / `METAGRAPH_USER_RATE_LIMIT`: global and per-caller requests per second
//! - `METAGRAPH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{USER_ID_HEADER, UserId, get_api_key_from_env};
pub use middleware::RateLimits;
pub use types::{
    AckResponse, ApiError, ArchiveRequest, ClassifyRequest, ConfirmRequest,
    CreateRelationshipRequest, DeclassifyRequest, EffectivityRequest, ElementResponse,
    ElementsForIdentifierRequest, ElementsResponse, ErrorResponse, ExportResponse,
    FindRelationshipsRequest, FindRequest, GuidResponse, HealthResponse, HistoryBody,
    IdentifiersForElementRequest, IdentifiersResponse, OptionsRequest, ReadParams,
    ReclassifyRequest, RelatedElementsResponse, RelatedRequest, RelationshipResponse,
    RelationshipsResponse, RemoveIdentifierRequest, StatusRequest, StatusResponse,
    TemplateRequest, UpdatePropertiesRequest, ValidateIdentifierRequest, ValidateResponse,
};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use metagraph_core::{
    ClientConfig, MemoryStore, MetadataClient, MetadataError, MetadataStore, save_snapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// `client` is what the handlers call. `store` is the same store, kept
/// concretely for snapshot export.
#[derive(Clone)]
pub struct AppState {
    pub client: MetadataClient,
    pub store: Arc<MemoryStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: MemoryStore, config: ClientConfig) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn MetadataStore> = store.clone();
        Self {
            client: MetadataClient::new(shared, config),
            store,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn allowed_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(USER_ID_HEADER),
    ]
}

/// Build CORS layer from `METAGRAPH_CORS_ORIGINS`.
///
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("METAGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (METAGRAPH_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in METAGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers(allowed_headers())
            }
        }
        None => {
            tracing::info!("CORS: No METAGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/export", post(handlers::export_handler))
        // Elements
        .route("/elements", post(handlers::create_element_handler))
        .route(
            "/elements/from-template",
            post(handlers::create_from_template_handler),
        )
        .route("/elements/find", post(handlers::find_elements_handler))
        .route("/elements/{guid}", get(handlers::get_element_handler))
        .route("/elements/{guid}/update", post(handlers::update_element_handler))
        .route("/elements/{guid}/status", post(handlers::update_status_handler))
        .route(
            "/elements/{guid}/effectivity",
            post(handlers::update_effectivity_handler),
        )
        .route("/elements/{guid}/delete", post(handlers::delete_element_handler))
        .route("/elements/{guid}/archive", post(handlers::archive_element_handler))
        .route("/elements/{guid}/restore", post(handlers::restore_element_handler))
        .route("/elements/{guid}/history", post(handlers::element_history_handler))
        .route("/elements/{guid}/classify", post(handlers::classify_handler))
        .route("/elements/{guid}/reclassify", post(handlers::reclassify_handler))
        .route("/elements/{guid}/declassify", post(handlers::declassify_handler))
        .route("/elements/{guid}/related", post(handlers::related_elements_handler))
        // Relationships
        .route("/relationships", post(handlers::create_relationship_handler))
        .route("/relationships/find", post(handlers::find_relationships_handler))
        .route("/relationships/{guid}", get(handlers::get_relationship_handler))
        .route(
            "/relationships/{guid}/update",
            post(handlers::update_relationship_handler),
        )
        .route(
            "/relationships/{guid}/delete",
            post(handlers::delete_relationship_handler),
        )
        // Correlations
        .route("/correlations/add", post(handlers::add_identifier_handler))
        .route("/correlations/update", post(handlers::update_identifier_handler))
        .route("/correlations/remove", post(handlers::remove_identifier_handler))
        .route("/correlations/confirm", post(handlers::confirm_identifier_handler))
        .route("/correlations/validate", post(handlers::validate_identifier_handler))
        .route(
            "/correlations/elements",
            post(handlers::elements_for_identifier_handler),
        )
        .route(
            "/correlations/identifiers",
            post(handlers::identifiers_for_element_handler),
        )
}

/// Create the router with all endpoints and middleware, limits read from
/// the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with_limits(state, RateLimits::from_env())
}

/// Create the router with explicit rate limits.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - 2 MiB
/// 4. Rate Limiting - if enabled
/// 5. Authentication - if `METAGRAPH_API_KEY` is set
pub fn create_router_with_limits(state: AppState, limits: RateLimits) -> Router {
    if limits.is_enabled() {
        tracing::info!(
            global = limits.global.is_some(),
            per_user = limits.per_user.is_some(),
            "Rate limiting enabled"
        );
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set METAGRAPH_API_KEY to enable authentication."
        );
    }

    let mut router = routes();

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if limits.is_enabled() {
        router = router.layer(axum_middleware::from_fn_with_state(
            limits,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown requested");
}

/// Serve until Ctrl+C, then write the store back to `database`.
pub async fn run_server(
    addr: &str,
    state: AppState,
    database: PathBuf,
) -> Result<(), MetadataError> {
    let store = state.store.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MetadataError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("metagraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MetadataError::Io(format!("Server error: {}", e)))?;

    save_snapshot(&store, &database)?;
    tracing::info!(database = %database.display(), "Snapshot saved");
    Ok(())
}
