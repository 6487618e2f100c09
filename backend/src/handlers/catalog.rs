use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::CurrentUser,
    error::AppError,
    models::{CatalogEntry, CatalogKind, Faculty, Subject},
};

// Read-only lookups that populate the client's upload and filter forms.

#[utoipa::path(
    get,
    path = "/catalog/faculties",
    responses(
        (status = 200, description = "Faculties with their subject ids", body = [Faculty]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Catalog"
)]
pub async fn list_faculties(
    CurrentUser(_caller): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Faculty>>, AppError> {
    Ok(Json(state.repo.list_faculties().await?))
}

#[utoipa::path(
    get,
    path = "/catalog/faculties/{id}/subjects",
    params(("id" = Uuid, Path, description = "Faculty id")),
    responses((status = 200, description = "Subjects taught in the faculty", body = [Subject])),
    tag = "Catalog"
)]
pub async fn list_subjects(
    State(state): State<AppState>,
    Path(faculty_id): Path<Uuid>,
) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(state.repo.list_subjects(faculty_id).await?))
}

async fn list(state: &AppState, kind: CatalogKind) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    Ok(Json(state.repo.list_catalog(kind).await?))
}

#[utoipa::path(
    get,
    path = "/catalog/document-types",
    responses((status = 200, description = "Document types", body = [CatalogEntry])),
    tag = "Catalog"
)]
pub async fn list_document_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    list(&state, CatalogKind::DocumentTypes).await
}

#[utoipa::path(
    get,
    path = "/catalog/visibilities",
    responses((status = 200, description = "Visibility labels", body = [CatalogEntry])),
    tag = "Catalog"
)]
pub async fn list_visibilities(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    list(&state, CatalogKind::Visibilities).await
}

#[utoipa::path(
    get,
    path = "/catalog/sections",
    responses((status = 200, description = "Class sections", body = [CatalogEntry])),
    tag = "Catalog"
)]
pub async fn list_sections(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    list(&state, CatalogKind::Sections).await
}
