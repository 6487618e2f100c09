use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod membership;
pub mod models;
pub mod repository;
pub mod storage;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::{AccessGate, AdminUser, CurrentUser, LOCAL_USER_HEADER, VerifierState};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use events::EventBus;
pub use membership::MembershipWorkflow;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` payload into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::accounts::signup, handlers::accounts::login, handlers::accounts::get_me,
        handlers::accounts::update_user,
        handlers::documents::upload_document, handlers::documents::list_documents,
        handlers::documents::get_document, handlers::documents::update_document,
        handlers::documents::delete_document,
        handlers::collections::create_collection, handlers::collections::get_collection,
        handlers::collections::update_collection, handlers::collections::delete_collection,
        handlers::collections::search_collections,
        handlers::catalog::list_faculties, handlers::catalog::list_subjects,
        handlers::catalog::list_document_types, handlers::catalog::list_visibilities,
        handlers::catalog::list_sections,
        handlers::admin::list_requests, handlers::admin::accept_request,
        handlers::admin::reject_request, handlers::admin::list_users,
        handlers::admin::set_user_state, handlers::admin::set_user_accesses,
        handlers::admin::delete_user,
        events::events_handler
    ),
    components(
        schemas(
            models::Role, models::AccountState, models::UserProfile, models::SignupRequest,
            models::SignupResponse, models::LoginRequest, models::LoginResponse,
            models::UpdateUserRequest, models::SetUserStateRequest, models::SetAccessesRequest,
            models::MembershipRequest, models::PendingRequest,
            models::Document, models::DocumentMetadata, models::UpdateDocumentRequest,
            models::UploadForm,
            models::Collection, models::CreateCollectionRequest, models::UpdateCollectionRequest,
            models::SearchCollectionsRequest,
            models::Faculty, models::Subject, models::CatalogEntry,
            events::Event, events::EventKind,
        )
    ),
    tags(
        (name = "doc-archive", description = "Document archive API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request. All
/// members are cheap handles; the configuration is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Where uploaded files are written.
    pub storage: StorageState,
    pub config: AppConfig,
    /// Resolves the caller of every request.
    pub gate: AccessGate,
    /// Broadcast bus for refresh notifications.
    pub events: EventBus,
    pub membership: MembershipWorkflow,
}

impl AppState {
    /// Wires the request-facing services around an injected repository, file
    /// store and credential verifier.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        verifier: VerifierState,
        config: AppConfig,
    ) -> Self {
        let gate = AccessGate::new(verifier, repo.clone(), config.env.clone());
        let membership = MembershipWorkflow::new(repo.clone());
        Self {
            repo,
            storage,
            config,
            gate,
            events: EventBus::new(),
            membership,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(app_state: &AppState) -> AccessGate {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for EventBus {
    fn from_ref(app_state: &AppState) -> EventBus {
        app_state.events.clone()
    }
}

/// require_identity
///
/// Route layer for `authenticated_routes`. The `CurrentUser` extractor rejects
/// anonymous callers with 401 before the handler runs.
async fn require_identity(_user: CurrentUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_admin_role
///
/// Route layer for `admin_routes`: 401 when anonymous, 403 for members.
async fn require_admin_role(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// cors_layer
///
/// Allows the configured client origin with credentials. `*` or an origin that
/// is not a valid header value falls back to allowing any origin without
/// credentials.
fn cors_layer(origin: &str) -> CorsLayer {
    let parsed = (origin != "*")
        .then(|| HeaderValue::from_str(origin).ok())
        .flatten();

    match parsed {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(LOCAL_USER_HEADER),
            ])
            .allow_credentials(true),
        None => {
            tracing::warn!(%origin, "CORS origin not usable, allowing any origin");
            CorsLayer::new()
                .allow_methods(Any)
                .allow_origin(Any)
                .allow_headers(Any)
        }
    }
}

/// create_router
///
/// Assembles the routers, the access gate and the observability layers around
/// the shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_identity,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin_role,
            )),
        )
        // Every request passes the gate first. It never rejects; it only records
        // who the caller is.
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            auth::authenticate,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` set by
/// `SetRequestIdLayer` so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
