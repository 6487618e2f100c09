use crate::{AppState, events, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable by anonymous callers: the health probe, account entry
/// points, the static catalogs used by the signup and upload forms, and the
/// event stream.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /signup
        // Creates a pending account and files its membership request.
        .route("/signup", post(handlers::accounts::signup))
        // POST /login
        // Email-or-username plus password in, bearer token out.
        .route("/login", post(handlers::accounts::login))
        // --- Catalogs ---
        .route(
            "/catalog/faculties/{id}/subjects",
            get(handlers::catalog::list_subjects),
        )
        .route(
            "/catalog/document-types",
            get(handlers::catalog::list_document_types),
        )
        .route(
            "/catalog/visibilities",
            get(handlers::catalog::list_visibilities),
        )
        .route("/catalog/sections", get(handlers::catalog::list_sections))
        // GET /events
        // WebSocket upgrade; streams refresh notifications to every client.
        .route("/events", get(events::events_handler))
}
