use crate::{AppState, handlers, storage::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Headroom for the multipart framing and the metadata part around the file.
const UPLOAD_BODY_SLACK: usize = 1024 * 1024;

/// Authenticated Router Module
///
/// Routes that require an identity. The router is wrapped in a layer that
/// rejects anonymous callers with 401; handlers then apply subject scoping and
/// ownership checks themselves.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::accounts::get_me))
        // PATCH /users/{id}
        // Self-service profile edit; the id must be the caller's.
        .route("/users/{id}", patch(handlers::accounts::update_user))
        .route("/catalog/faculties", get(handlers::catalog::list_faculties))
        // --- Documents ---
        // POST /documents
        // Multipart upload. The body limit is raised for this route only.
        .route(
            "/documents",
            post(handlers::documents::upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + UPLOAD_BODY_SLACK))
                .get(handlers::documents::list_documents),
        )
        // GET/PATCH/DELETE /documents/{id}
        // Reads are scoped to the caller's subjects; writes are author-or-admin.
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document)
                .patch(handlers::documents::update_document)
                .delete(handlers::documents::delete_document),
        )
        // --- Collections ---
        .route(
            "/collections",
            post(handlers::collections::create_collection),
        )
        .route(
            "/collections/search",
            post(handlers::collections::search_collections),
        )
        .route(
            "/collections/{id}",
            get(handlers::collections::get_collection)
                .patch(handlers::collections::update_collection)
                .delete(handlers::collections::delete_collection),
        )
}
