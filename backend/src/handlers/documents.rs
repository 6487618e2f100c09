use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{CurrentUser, Identity, SubjectScope, ensure_owner_or_admin},
    error::AppError,
    events::{Event, EventKind},
    models::{Document, DocumentFilter, DocumentMetadata, UpdateDocumentRequest, UploadForm},
    storage::{MAX_UPLOAD_BYTES, is_allowed_mime, stored_file_name},
};

/// Multipart part carrying the JSON metadata.
const METADATA_PART: &str = "document";
/// Multipart part carrying the file itself.
const FILE_PART: &str = "fileToUpload";

struct UploadedFile {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

fn invalid(message: &str) -> AppError {
    AppError::Validation(message.to_string())
}

fn is_alphabetic_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(char::is_alphabetic)
}

/// Checks the metadata fields in form order and returns the parsed subject id.
fn validate_metadata(meta: &DocumentMetadata) -> Result<Uuid, AppError> {
    if meta.name.trim().is_empty() {
        return Err(invalid("invalid name"));
    }
    if meta.doc_type.trim().is_empty() {
        return Err(invalid("invalid type"));
    }
    if !is_alphabetic_word(&meta.faculty) {
        return Err(invalid("invalid faculty"));
    }
    let subject = Uuid::parse_str(meta.subject.trim()).map_err(|_| invalid("invalid subject"))?;
    if !is_alphabetic_word(&meta.visibility) {
        return Err(invalid("invalid visibility"));
    }
    if meta.description.trim().is_empty() {
        return Err(invalid("invalid description"));
    }
    Ok(subject)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("malformed upload: {}", err.body_text()))
}

/// upload_document
///
/// [Authenticated Route] Accepts a multipart upload with a JSON `document` part
/// and a `fileToUpload` part. The file is written under a timestamped name and
/// the caller is recorded as author.
#[utoipa::path(
    post,
    path = "/documents",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document stored", body = Document),
        (status = 400, description = "Invalid metadata, missing file or disallowed type"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Documents"
)]
pub async fn upload_document(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let mut metadata: Option<DocumentMetadata> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().map(str::to_owned);
        match part.as_deref() {
            Some(METADATA_PART) => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| AppError::Validation(format!("invalid document metadata: {e}")))?;
                metadata = Some(parsed);
            }
            Some(FILE_PART) => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some(UploadedFile {
                    original_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!(part = ?other, "ignoring unexpected multipart part"),
        }
    }

    let metadata = metadata.ok_or_else(|| invalid("missing document metadata"))?;
    let subject = validate_metadata(&metadata)?;
    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| invalid("no file uploaded"))?;
    if !is_allowed_mime(&file.mime_type) {
        return Err(AppError::Validation(format!(
            "file type '{}' is not allowed",
            file.mime_type
        )));
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(invalid("file exceeds the 100 MB limit"));
    }

    let directory = stored_file_name(&file.original_name);
    state.storage.store(&directory, &file.bytes).await?;

    let now = Utc::now();
    let document = Document {
        id: Uuid::new_v4(),
        name: metadata.name.trim().to_string(),
        doc_type: metadata.doc_type.trim().to_string(),
        faculty: metadata.faculty,
        subject,
        class: metadata.class.filter(|c| !c.trim().is_empty()),
        section: metadata.section.filter(|s| !s.trim().is_empty()),
        visibility: metadata.visibility,
        description: metadata.description,
        author: identity.id,
        directory: directory.clone(),
        mime_type: file.mime_type,
        created_at: now,
        updated_at: now,
    };

    let document = match state.repo.create_document(document).await {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.storage.remove(&directory).await {
                tracing::error!(%directory, error = %cleanup, "failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(document_id = %document.id, author = %identity.id, size = file.bytes.len(), "document uploaded");
    state
        .events
        .publish(Event::new(EventKind::NewDocument, document.id));
    Ok((StatusCode::CREATED, Json(document)))
}

/// list_documents
///
/// [Authenticated Route] Documents matching the optional filters, limited to the
/// subjects the caller may see.
#[utoipa::path(
    get,
    path = "/documents",
    params(DocumentFilter),
    responses((status = 200, description = "Visible documents", body = [Document])),
    tag = "Documents"
)]
pub async fn list_documents(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = state.repo.find_documents(&filter, &identity.scope()).await?;
    Ok(Json(documents))
}

/// get_document
///
/// [Authenticated Route] A document outside the caller's scope is reported as
/// not found.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document", body = Document),
        (status = 404, description = "Not found or not visible")
    ),
    tag = "Documents"
)]
pub async fn get_document(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    state
        .repo
        .get_document(id, &identity.scope())
        .await?
        .map(Json)
        .ok_or_else(document_not_found)
}

fn document_not_found() -> AppError {
    AppError::NotFound("document not found".to_string())
}

/// Loads a document for modification: invisible documents are not found, and
/// only the author or an admin may proceed.
async fn load_for_write(state: &AppState, identity: &Identity, id: Uuid) -> Result<Document, AppError> {
    let document = state
        .repo
        .get_document(id, &SubjectScope::Unrestricted)
        .await?
        .ok_or_else(document_not_found)?;

    if document.author != identity.id && !identity.scope().matches(&document.subject) {
        return Err(document_not_found());
    }
    ensure_owner_or_admin(identity, document.author)?;
    Ok(document)
}

/// update_document
///
/// [Authenticated Route] Author or admin only.
#[utoipa::path(
    patch,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Updated document", body = Document),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    ),
    tag = "Documents"
)]
pub async fn update_document(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    load_for_write(&state, &identity, id).await?;

    let blank = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&patch.name) || blank(&patch.doc_type) || blank(&patch.description) {
        return Err(invalid("fields may not be set to an empty value"));
    }
    if patch
        .visibility
        .as_deref()
        .is_some_and(|v| !is_alphabetic_word(v))
    {
        return Err(invalid("invalid visibility"));
    }

    let document = state
        .repo
        .update_document(id, patch)
        .await?
        .ok_or_else(document_not_found)?;
    state
        .events
        .publish(Event::new(EventKind::DocumentUpdated, id));
    Ok(Json(document))
}

/// delete_document
///
/// [Authenticated Route] Author or admin only. The stored file goes with the
/// record; a file that is already missing is ignored.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not found")
    ),
    tag = "Documents"
)]
pub async fn delete_document(
    CurrentUser(identity): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    load_for_write(&state, &identity, id).await?;

    let Some(document) = state.repo.delete_document(id).await? else {
        return Err(document_not_found());
    };

    match state.storage.remove(&document.directory).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(directory = %document.directory, "stored file was already missing"),
        Err(e) => tracing::error!(directory = %document.directory, error = %e, "failed to remove stored file"),
    }

    state
        .events
        .publish(Event::new(EventKind::DocumentDeleted, id));
    Ok(StatusCode::NO_CONTENT)
}
