use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AdminUser,
    error::AppError,
    events::{Event, EventKind},
    models::{
        MembershipRequest, PendingRequest, SetAccessesRequest, SetUserStateRequest, UserPatch,
        UserProfile,
    },
};

// --- Membership Requests ---

/// list_requests
///
/// [Admin Route] Every open membership request with the account it belongs to.
#[utoipa::path(
    get,
    path = "/admin/requests",
    responses(
        (status = 200, description = "Open requests", body = [PendingRequest]),
        (status = 403, description = "Not an administrator")
    ),
    tag = "Admin"
)]
pub async fn list_requests(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingRequest>>, AppError> {
    Ok(Json(state.membership.list().await?))
}

/// accept_request
///
/// [Admin Route] Approves a request: the account becomes active and the request
/// is removed. Approving the same request twice yields 404.
#[utoipa::path(
    post,
    path = "/admin/requests/{id}/accept",
    params(("id" = String, Path, description = "Membership request id")),
    responses(
        (status = 200, description = "Approved", body = MembershipRequest),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such request")
    ),
    tag = "Admin"
)]
pub async fn accept_request(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MembershipRequest>, AppError> {
    let request = state.membership.approve(&id).await?;
    tracing::info!(admin_id = %admin.id, user_id = %request.user_id, "account activated");
    state
        .events
        .publish(Event::new(EventKind::UserUpdated, request.user_id));
    Ok(Json(request))
}

/// reject_request
///
/// [Admin Route] Removes a request and disables the account that filed it.
#[utoipa::path(
    delete,
    path = "/admin/requests/{id}",
    params(("id" = String, Path, description = "Membership request id")),
    responses(
        (status = 204, description = "Rejected"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such request")
    ),
    tag = "Admin"
)]
pub async fn reject_request(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let request = state.membership.reject(&id).await?;
    state
        .events
        .publish(Event::new(EventKind::UserUpdated, request.user_id));
    Ok(StatusCode::NO_CONTENT)
}

// --- Accounts ---

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All accounts", body = [UserProfile])),
    tag = "Admin"
)]
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

/// set_user_state
///
/// [Admin Route] Moves an account between pending, active and disabled.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/state",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = SetUserStateRequest,
    responses(
        (status = 200, description = "Updated account", body = UserProfile),
        (status = 404, description = "No such account")
    ),
    tag = "Admin"
)]
pub async fn set_user_state(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetUserStateRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let patch = UserPatch {
        state: Some(payload.state),
        ..UserPatch::default()
    };
    patch_user(&state, id, patch).await
}

/// set_user_accesses
///
/// [Admin Route] Replaces the subject list that scopes what a member can read.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/accesses",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = SetAccessesRequest,
    responses(
        (status = 200, description = "Updated account", body = UserProfile),
        (status = 404, description = "No such account")
    ),
    tag = "Admin"
)]
pub async fn set_user_accesses(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAccessesRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let mut accesses = payload.accesses;
    accesses.sort_unstable();
    accesses.dedup();

    let patch = UserPatch {
        accesses: Some(accesses),
        ..UserPatch::default()
    };
    patch_user(&state, id, patch).await
}

async fn patch_user(state: &AppState, id: Uuid, patch: UserPatch) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .repo
        .update_user(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    state.events.publish(Event::new(EventKind::UserUpdated, id));
    Ok(Json(user.profile()))
}

/// delete_user
///
/// [Admin Route] Removes an account and its open request. Deleting an account
/// that is already gone still answers 204.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses((status = 204, description = "Deleted or already absent")),
    tag = "Admin"
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_user(id).await? {
        tracing::info!(admin_id = %admin.id, user_id = %id, "account deleted");
        state.events.publish(Event::new(EventKind::UserDeleted, id));
    }
    Ok(StatusCode::NO_CONTENT)
}
