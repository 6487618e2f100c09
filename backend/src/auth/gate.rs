use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use uuid::Uuid;

use super::{
    scope::{SubjectScope, authorize_scope, require_admin},
    verifier::{LoginError, VerifierState, VerifyError},
};
use crate::{
    config::Env,
    error::AppError,
    models::{AccountState, Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` to act as an existing identity without a token.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Identity
///
/// The authenticated actor attached to a request. Request-scoped; never written
/// back by the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub accesses: Vec<Uuid>,
    pub state: AccountState,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn scope(&self) -> SubjectScope {
        authorize_scope(self)
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            accesses: user.accesses,
            state: user.state,
        }
    }
}

/// Caller
///
/// What the gate decided about a request: an identity, or anonymous. Inserted
/// into request extensions by `authenticate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Caller {
    Authenticated(Identity),
    #[default]
    Anonymous,
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Caller::Authenticated(identity) => Some(identity),
            Caller::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

/// AccessGate
///
/// Resolves who is making a request. Bearer verification soft-fails: any error
/// leaves the request anonymous and lets it continue, so public routes stay
/// reachable and protected routes reject on their own.
#[derive(Clone)]
pub struct AccessGate {
    verifier: VerifierState,
    repo: RepositoryState,
    env: Env,
}

impl AccessGate {
    pub fn new(verifier: VerifierState, repo: RepositoryState, env: Env) -> Self {
        Self {
            verifier,
            repo,
            env,
        }
    }

    /// verify_bearer
    ///
    /// Never returns an error: verification failures and store errors both
    /// yield `Caller::Anonymous`.
    pub async fn verify_bearer(&self, token: &str) -> Caller {
        match self.verifier.verify_bearer(token).await {
            Ok(Some(user)) => Caller::Authenticated(user.into()),
            Ok(None) => {
                tracing::debug!("bearer token names no active identity");
                Caller::Anonymous
            }
            Err(VerifyError::Token(e)) => {
                tracing::debug!(error = %e, "bearer token rejected");
                Caller::Anonymous
            }
            Err(VerifyError::Store(e)) => {
                tracing::warn!(error = %e, "identity lookup failed during bearer verification");
                Caller::Anonymous
            }
        }
    }

    /// Resolves the caller from request headers: the local bypass header first
    /// (local env only), then `Authorization: Bearer <token>`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Caller {
        if self.env == Env::Local {
            if let Some(identity) = self.local_bypass(headers).await {
                return Caller::Authenticated(identity);
            }
        }

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match token {
            Some(token) => self.verify_bearer(token.trim()).await,
            None => Caller::Anonymous,
        }
    }

    async fn local_bypass(&self, headers: &HeaderMap) -> Option<Identity> {
        let user_id = headers
            .get(LOCAL_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok())?;

        match self.repo.get_user(user_id).await {
            Ok(Some(user)) if user.state == AccountState::Active => Some(user.into()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "local bypass lookup failed");
                None
            }
        }
    }

    /// verify_login
    ///
    /// Typed login check; the caller attaches the returned identity to its
    /// response context.
    pub async fn verify_login(&self, login: &str, password: &str) -> Result<User, LoginError> {
        self.verifier.verify_login(login, password).await
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, VerifyError> {
        self.verifier.issue_token(user_id)
    }
}

/// authenticate
///
/// Global middleware: resolves the `Caller` and always forwards the request.
pub async fn authenticate(
    State(gate): State<AccessGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = gate.resolve(request.headers()).await;
    if let Caller::Authenticated(identity) = &caller {
        tracing::debug!(user_id = %identity.id, "request authenticated");
    }
    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// `Caller` is always extractable; without the middleware it is anonymous.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

/// CurrentUser
///
/// Extractor for routes that require authentication. Rejects anonymous callers
/// with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Caller>() {
            Some(Caller::Authenticated(identity)) => Ok(CurrentUser(identity.clone())),
            _ => Err(AppError::unauthenticated()),
        }
    }
}

/// AdminUser
///
/// Extractor for admin routes: 401 when anonymous, 403 when not an admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&identity)?;
        Ok(AdminUser(identity))
    }
}
