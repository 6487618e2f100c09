use crate::{
    auth::SubjectScope,
    models::{
        CatalogEntry, CatalogKind, Collection, Document, DocumentFilter, Faculty,
        MembershipRequest, Subject, UpdateCollectionRequest, UpdateDocumentRequest, User,
        UserPatch,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// StoreError
///
/// Opaque persistence failure. Uniqueness violations are kept apart so callers
/// can log them precisely, but both surface as a generic write error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let duplicate = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.message().to_string());
        match duplicate {
            Some(message) => StoreError::Duplicate(message),
            None => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// The persistence collaborator: find-by-id, filtered find, insert, partial
/// update and delete-if-exists over identities, membership requests, documents,
/// collections and the read-only catalogs.
///
/// Deletes never fail because a record is already gone; they report whether
/// something was removed.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identities ---
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    // A login containing `@` matches the email (case-insensitive), anything
    // else matches the username.
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>>;
    // Also drops the identity's open membership request.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    // --- Membership Requests ---
    // Fails with `StoreError::Duplicate` when the identity already has an open request.
    async fn create_request(&self, user_id: Uuid) -> StoreResult<MembershipRequest>;
    async fn get_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>>;
    // Open requests joined with their identity, in the store's natural order.
    async fn list_requests(&self) -> StoreResult<Vec<(MembershipRequest, User)>>;
    async fn delete_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>>;

    // --- Documents ---
    async fn create_document(&self, document: Document) -> StoreResult<Document>;
    async fn get_document(&self, id: Uuid, scope: &SubjectScope) -> StoreResult<Option<Document>>;
    async fn find_documents(
        &self,
        filter: &DocumentFilter,
        scope: &SubjectScope,
    ) -> StoreResult<Vec<Document>>;
    async fn update_document(
        &self,
        id: Uuid,
        patch: UpdateDocumentRequest,
    ) -> StoreResult<Option<Document>>;
    async fn delete_document(&self, id: Uuid) -> StoreResult<Option<Document>>;

    // --- Collections ---
    async fn create_collection(&self, collection: Collection) -> StoreResult<Collection>;
    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    // Case-insensitive name fragment match; visibility is decided by the caller.
    async fn search_collections(&self, fragment: &str) -> StoreResult<Vec<Collection>>;
    async fn update_collection(
        &self,
        id: Uuid,
        patch: UpdateCollectionRequest,
    ) -> StoreResult<Option<Collection>>;
    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool>;

    // --- Catalogs ---
    async fn list_faculties(&self) -> StoreResult<Vec<Faculty>>;
    async fn list_subjects(&self, faculty_id: Uuid) -> StoreResult<Vec<Subject>>;
    async fn list_catalog(&self, kind: CatalogKind) -> StoreResult<Vec<CatalogEntry>>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
