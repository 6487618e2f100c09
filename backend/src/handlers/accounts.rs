use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState, accounts,
    auth::{CurrentUser, ensure_self},
    error::AppError,
    events::{Event, EventKind},
    models::{LoginRequest, LoginResponse, SignupRequest, SignupResponse, UpdateUserRequest, UserProfile},
};

/// signup
///
/// [Public Route] Registers a pending member and files its membership request.
/// The account cannot log in until an administrator approves the request.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, awaiting approval", body = SignupResponse),
        (status = 400, description = "Invalid or already registered credentials")
    ),
    tag = "Accounts"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let response = accounts::signup(&state.repo, &state.membership, payload).await?;
    state
        .events
        .publish(Event::new(EventKind::NewUser, response.user.id));
    Ok((StatusCode::CREATED, Json(response)))
}

/// login
///
/// [Public Route] Exchanges an email-or-username and password for a bearer token.
///
/// Unknown accounts are 404; a wrong password, a pending account and a disabled
/// account are each a distinct 401.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Wrong password, pending or disabled account"),
        (status = 404, description = "No such account")
    ),
    tag = "Accounts"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .gate
        .verify_login(payload.login.trim(), &payload.password)
        .await?;
    let token = state
        .gate
        .issue_token(user.id)
        .map_err(|e| AppError::Internal(format!("token issue failed: {e}")))?;

    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        user: user.profile(),
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile, read fresh from the store.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Accounts"
)]
pub async fn get_me(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .repo
        .get_user(identity.id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    Ok(Json(user.profile()))
}

/// update_user
///
/// [Authenticated Route] Edits the caller's own email, username or password.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Identity to edit; must be the caller")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 403, description = "Not the caller's account")
    ),
    tag = "Accounts"
)]
pub async fn update_user(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    ensure_self(&identity, id)?;
    let user = accounts::update_profile(&state.repo, id, payload).await?;
    state.events.publish(Event::new(EventKind::UserUpdated, id));
    Ok(Json(user.profile()))
}
