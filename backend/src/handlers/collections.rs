use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{CurrentUser, Identity, ensure_self},
    error::AppError,
    events::{Event, EventKind},
    models::{
        Collection, CreateCollectionRequest, PRIVATE_PERMISSION, PUBLIC_PERMISSION,
        SearchCollectionsRequest, UpdateCollectionRequest,
    },
};

/// A collection is visible to its author, to admins, to identities listed in
/// its authorizations, and to everyone when public.
pub fn is_visible_to(collection: &Collection, identity: &Identity) -> bool {
    identity.is_admin()
        || collection.author == identity.id
        || collection.permissions == PUBLIC_PERMISSION
        || collection.authorizations.contains(&identity.id)
}

fn validate_permissions(permissions: &str) -> Result<(), AppError> {
    if permissions == PUBLIC_PERMISSION || permissions == PRIVATE_PERMISSION {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "permissions must be '{PUBLIC_PERMISSION}' or '{PRIVATE_PERMISSION}'"
        )))
    }
}

fn collection_not_found() -> AppError {
    AppError::NotFound("collection not found".to_string())
}

async fn load_visible(state: &AppState, identity: &Identity, id: Uuid) -> Result<Collection, AppError> {
    state
        .repo
        .get_collection(id)
        .await?
        .filter(|c| is_visible_to(c, identity))
        .ok_or_else(collection_not_found)
}

/// create_collection
///
/// [Authenticated Route] Creates an empty collection owned by the caller.
/// Permissions default to private.
#[utoipa::path(
    post,
    path = "/collections",
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Collection created", body = Collection),
        (status = 400, description = "Empty name or unknown permissions")
    ),
    tag = "Collections"
)]
pub async fn create_collection(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<Collection>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("invalid collection name".to_string()));
    }
    let permissions = payload
        .permissions
        .unwrap_or_else(|| PRIVATE_PERMISSION.to_string());
    validate_permissions(&permissions)?;

    let now = Utc::now();
    let collection = state
        .repo
        .create_collection(Collection {
            id: Uuid::new_v4(),
            name: name.to_string(),
            author: identity.id,
            permissions,
            authorizations: payload.authorizations,
            documents: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(collection_id = %collection.id, author = %identity.id, "collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

#[utoipa::path(
    get,
    path = "/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Collection", body = Collection),
        (status = 404, description = "Not found or not visible")
    ),
    tag = "Collections"
)]
pub async fn get_collection(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Collection>, AppError> {
    load_visible(&state, &identity, id).await.map(Json)
}

/// update_collection
///
/// [Authenticated Route] Author only. Also used to add or remove documents.
#[utoipa::path(
    patch,
    path = "/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection id")),
    request_body = UpdateCollectionRequest,
    responses(
        (status = 200, description = "Updated collection", body = Collection),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found or not visible")
    ),
    tag = "Collections"
)]
pub async fn update_collection(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<UpdateCollectionRequest>,
) -> Result<Json<Collection>, AppError> {
    let existing = load_visible(&state, &identity, id).await?;
    ensure_self(&identity, existing.author)?;

    if let Some(name) = patch.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("invalid collection name".to_string()));
        }
    }
    if let Some(permissions) = &patch.permissions {
        validate_permissions(permissions)?;
    }
    if let Some(documents) = patch.documents.as_mut() {
        let mut seen = std::collections::HashSet::new();
        documents.retain(|id| seen.insert(*id));
    }

    let collection = state
        .repo
        .update_collection(id, patch)
        .await?
        .ok_or_else(collection_not_found)?;
    state
        .events
        .publish(Event::new(EventKind::CollectionUpdated, id));
    Ok(Json(collection))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found or not visible")
    ),
    tag = "Collections"
)]
pub async fn delete_collection(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let existing = load_visible(&state, &identity, id).await?;
    ensure_self(&identity, existing.author)?;

    if state.repo.delete_collection(id).await? {
        state
            .events
            .publish(Event::new(EventKind::CollectionDeleted, id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// search_collections
///
/// [Authenticated Route] Case-insensitive name match over the collections the
/// caller can see.
#[utoipa::path(
    post,
    path = "/collections/search",
    request_body = SearchCollectionsRequest,
    responses((status = 200, description = "Matching collections", body = [Collection])),
    tag = "Collections"
)]
pub async fn search_collections(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SearchCollectionsRequest>,
) -> Result<Json<Vec<Collection>>, AppError> {
    let found = state.repo.search_collections(payload.name.trim()).await?;
    Ok(Json(
        found
            .into_iter()
            .filter(|c| is_visible_to(c, &identity))
            .collect(),
    ))
}
