//! Error taxonomy and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    auth::LoginError, membership::WorkflowError, repository::StoreError, storage::StorageError,
};

/// An error returned by a route handler.
///
/// Client-facing variants carry the message shown to the user; store and storage
/// failures are logged and reported with a generic message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input (non-conforming identifier, empty field, rejected file).
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// No identity attached to the request, or credentials rejected.
    #[error("{0}")]
    Unauthenticated(String),

    /// Identity present but lacking the privilege for this operation.
    #[error("{0}")]
    Authorization(String),

    /// Account is pending approval or disabled.
    #[error("{0}")]
    AccountState(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("file storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) | AppError::AccountState(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Store(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn unauthenticated() -> Self {
        AppError::Unauthenticated("authentication required".to_string())
    }

    pub fn forbidden() -> Self {
        AppError::Authorization("insufficient privileges for this operation".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "messages": [message] }))).into_response()
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        let message = err.to_string();
        match err {
            LoginError::UnknownAccount => AppError::NotFound(message),
            LoginError::AccountDisabled | LoginError::AccountPending => {
                AppError::AccountState(message)
            }
            LoginError::BadPassword => AppError::Unauthenticated(message),
            LoginError::Internal(_) => AppError::Internal(message),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidIdentifier(_) => AppError::Validation(err.to_string()),
            WorkflowError::IdentityNotFound(_) | WorkflowError::RequestNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            WorkflowError::Store(e) => AppError::Store(e),
        }
    }
}
