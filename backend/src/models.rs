use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations ---

/// Raised when a stored role or state label is not recognised.
#[derive(Debug, Error)]
#[error("unknown {kind} label: {label}")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

/// Role
///
/// The RBAC field of an identity. Admins see every record; members only see the
/// subjects listed in their accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownLabel;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        match label.as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(UnknownLabel { kind: "role", label }),
        }
    }
}

/// AccountState
///
/// Lifecycle of an identity: `pending` until a membership request is approved,
/// then `active`. Admins may move an account to `disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AccountState {
    #[default]
    Pending,
    Active,
    Disabled,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Pending => "pending",
            AccountState::Active => "active",
            AccountState::Disabled => "disabled",
        }
    }
}

impl TryFrom<String> for AccountState {
    type Error = UnknownLabel;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        match label.as_str() {
            "pending" => Ok(AccountState::Pending),
            "active" => Ok(AccountState::Active),
            "disabled" => Ok(AccountState::Disabled),
            _ => Err(UnknownLabel { kind: "account state", label }),
        }
    }
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. Carries the password
/// hash, so it is never serialized directly; responses use `UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    // Subject ids this identity may view.
    pub accesses: Vec<Uuid>,
    #[sqlx(try_from = "String")]
    pub state: AccountState,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A fresh member account awaiting approval.
    pub fn pending_member(email: String, username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            role: Role::Member,
            accesses: Vec::new(),
            state: AccountState::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role,
            accesses: self.accesses.clone(),
            state: self.state,
            created_at: self.created_at,
        }
    }
}

/// UserPatch
///
/// Partial mutation of a `User`; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub state: Option<AccountState>,
    pub accesses: Option<Vec<Uuid>>,
}

/// MembershipRequest
///
/// An open application for account activation. At most one per identity
/// (unique `user_id`); removed once an administrator resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct MembershipRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Document
///
/// An uploaded file and its catalog metadata. `subject` is the field narrowed by
/// authorization scoping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    // `type` is reserved in Rust; kept as "type" on the wire and in SQL.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub doc_type: String,
    pub faculty: String,
    pub subject: Uuid,
    pub class: Option<String>,
    pub section: Option<String>,
    pub visibility: String,
    pub description: String,
    pub author: Uuid,
    // File name under the upload directory.
    pub directory: String,
    pub mime_type: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Collection
///
/// A named set of documents. `permissions` is the visibility label ("public" or
/// "private"); `authorizations` lists identities allowed to view a private one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub author: Uuid,
    pub permissions: String,
    pub authorizations: Vec<Uuid>,
    pub documents: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

pub const PUBLIC_PERMISSION: &str = "public";
pub const PRIVATE_PERMISSION: &str = "private";

// --- Catalogs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Faculty {
    pub id: Uuid,
    pub name: String,
    pub subjects: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub faculty_id: Uuid,
}

/// A named entry of one of the flat catalogs (document types, visibilities, sections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    DocumentTypes,
    Visibilities,
    Sections,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::DocumentTypes => "document_types",
            CatalogKind::Visibilities => "visibilities",
            CatalogKind::Sections => "sections",
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input for POST /signup. The account is created pending and a membership
/// request is filed for it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// LoginRequest
///
/// `login` accepts either the email or the username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetUserStateRequest {
    pub state: AccountState,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetAccessesRequest {
    pub accesses: Vec<Uuid>,
}

/// DocumentMetadata
///
/// The JSON `document` part of the multipart upload. `subject` arrives as a raw
/// string and is validated into an id by the upload handler.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DocumentMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub faculty: String,
    pub subject: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    pub visibility: String,
    pub description: String,
}

/// UploadForm
///
/// OpenAPI description of the multipart body of POST /documents. The handler
/// reads the parts directly.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    /// JSON-encoded `DocumentMetadata`.
    pub document: String,
    #[schema(value_type = String, format = Binary)]
    pub file_to_upload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateDocumentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// DocumentFilter
///
/// Query parameters for GET /documents. Combined with the caller's subject scope.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
pub struct DocumentFilter {
    pub faculty: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub subject: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCollectionRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub authorizations: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCollectionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SearchCollectionsRequest {
    pub name: String,
}

// --- Response Schemas (Output) ---

/// UserProfile
///
/// Public view of an identity, safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub accesses: Vec<Uuid>,
    pub state: AccountState,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// LoginResponse
///
/// Bearer token plus the profile it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// SignupResponse
///
/// The pending profile and the membership request filed for it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupResponse {
    pub user: UserProfile,
    pub request: MembershipRequest,
}

/// PendingRequest
///
/// A membership request joined with the identity it references.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PendingRequest {
    pub id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub user: UserProfile,
}
