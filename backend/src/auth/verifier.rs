use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::password::verify_password;
use crate::{
    config::AppConfig,
    models::{AccountState, User},
    repository::{RepositoryState, StoreError},
};

/// Claims
///
/// Payload of the bearer tokens issued at login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the identity's id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// LoginError
///
/// Typed outcome of a failed interactive login. Each kind maps to its own
/// externally visible status.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("no account registered with this email or username")]
    UnknownAccount,
    #[error("this account has been disabled")]
    AccountDisabled,
    #[error("wrong password")]
    BadPassword,
    #[error("this account is awaiting approval")]
    AccountPending,
    #[error("login failed: {0}")]
    Internal(String),
}

impl LoginError {
    pub fn status(&self) -> StatusCode {
        match self {
            LoginError::UnknownAccount => StatusCode::NOT_FOUND,
            LoginError::AccountDisabled | LoginError::BadPassword | LoginError::AccountPending => {
                StatusCode::UNAUTHORIZED
            }
            LoginError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure to resolve or issue a bearer credential.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// CredentialVerifier
///
/// The pluggable credential-verification strategy. Constructed at startup and
/// injected into the `AccessGate`; there is no global registry.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolves a bearer token. `Ok(None)` means the token was valid but names no
    /// usable identity.
    async fn verify_bearer(&self, token: &str) -> Result<Option<User>, VerifyError>;

    /// Checks an (email-or-username, password) pair.
    async fn verify_login(&self, login: &str, password: &str) -> Result<User, LoginError>;

    /// Issues a bearer token for an identity.
    fn issue_token(&self, user_id: Uuid) -> Result<String, VerifyError>;
}

pub type VerifierState = Arc<dyn CredentialVerifier>;

/// JwtVerifier
///
/// HS256 bearer tokens plus argon2 password checks against the repository.
pub struct JwtVerifier {
    repo: RepositoryState,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl JwtVerifier {
    pub fn new(repo: RepositoryState, secret: &str, ttl_secs: u64) -> Self {
        Self {
            repo,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(repo: RepositoryState, config: &AppConfig) -> Self {
        Self::new(repo, &config.jwt_secret, config.token_ttl_secs)
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    /// Expired or badly signed tokens are errors. A token whose identity was
    /// deleted, or is no longer active, resolves to `None`.
    async fn verify_bearer(&self, token: &str) -> Result<Option<User>, VerifyError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding, &validation)?;
        let user = self.repo.get_user(token_data.claims.sub).await?;

        Ok(user.filter(|u| u.state == AccountState::Active))
    }

    /// Account state is checked before the password, so a pending account is
    /// always reported as pending.
    async fn verify_login(&self, login: &str, password: &str) -> Result<User, LoginError> {
        let user = self
            .repo
            .find_user_by_login(login)
            .await
            .map_err(|e| LoginError::Internal(e.to_string()))?
            .ok_or(LoginError::UnknownAccount)?;

        match user.state {
            AccountState::Disabled => return Err(LoginError::AccountDisabled),
            AccountState::Pending => return Err(LoginError::AccountPending),
            AccountState::Active => {}
        }

        let matches = verify_password(password, &user.password_hash)
            .map_err(|e| LoginError::Internal(e.to_string()))?;
        if !matches {
            return Err(LoginError::BadPassword);
        }

        Ok(user)
    }

    fn issue_token(&self, user_id: Uuid) -> Result<String, VerifyError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user_id,
            iat: now as usize,
            exp: now.saturating_add(self.ttl_secs).min(usize::MAX as u64) as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }
}
