use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Moderation endpoints, nested under `/admin`. The router is wrapped in a layer
/// that requires the `admin` role, and every handler extracts `AdminUser` as well.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/requests
        // Open membership requests joined with their accounts.
        .route("/requests", get(handlers::admin::list_requests))
        // POST /admin/requests/{id}/accept
        // Activates the account and removes the request.
        .route(
            "/requests/{id}/accept",
            post(handlers::admin::accept_request),
        )
        // DELETE /admin/requests/{id}
        // Rejects the request and disables the account.
        .route("/requests/{id}", delete(handlers::admin::reject_request))
        // --- Accounts ---
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}/state", put(handlers::admin::set_user_state))
        .route(
            "/users/{id}/accesses",
            put(handlers::admin::set_user_accesses),
        )
        .route("/users/{id}", delete(handlers::admin::delete_user))
}
