//! Account lifecycle outside the membership workflow: signup, self-service
//! edits and the bootstrap administrator.

use uuid::Uuid;

use crate::{
    auth::hash_password,
    config::AppConfig,
    error::AppError,
    membership::MembershipWorkflow,
    models::{AccountState, Role, SignupRequest, SignupResponse, UpdateUserRequest, User, UserPatch},
    repository::{RepositoryState, StoreError},
};

const MIN_PASSWORD_LEN: usize = 6;

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if is_plausible_email(email) {
        Ok(())
    } else {
        Err(AppError::Validation("invalid email".to_string()))
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    // `@` is reserved for email logins.
    if username.is_empty() || username.chars().any(|c| c.is_whitespace() || c == '@') {
        return Err(AppError::Validation("invalid username".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

fn taken(err: StoreError) -> AppError {
    match err {
        StoreError::Duplicate(_) => {
            AppError::Validation("email or username already registered".to_string())
        }
        other => AppError::Store(other),
    }
}

/// signup
///
/// Creates a pending member and files its membership request. If the request
/// cannot be filed the new account is removed again.
pub async fn signup(
    repo: &RepositoryState,
    membership: &MembershipWorkflow,
    payload: SignupRequest,
) -> Result<SignupResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();
    validate_email(&email)?;
    validate_username(&username)?;
    validate_password(&payload.password)?;

    let user = repo
        .create_user(User::pending_member(email, username, hash(&payload.password)?))
        .await
        .map_err(taken)?;

    let request = match membership.submit(&user.id.to_string()).await {
        Ok(request) => request,
        Err(e) => {
            if let Err(cleanup) = repo.delete_user(user.id).await {
                tracing::error!(user_id = %user.id, error = %cleanup, "failed to remove account after signup error");
            }
            return Err(e.into());
        }
    };

    tracing::info!(user_id = %user.id, "account created, awaiting approval");
    Ok(SignupResponse {
        user: user.profile(),
        request,
    })
}

/// Applies a self-service profile edit. Fields left out are unchanged.
pub async fn update_profile(
    repo: &RepositoryState,
    id: Uuid,
    payload: UpdateUserRequest,
) -> Result<User, AppError> {
    let email = payload.email.map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let username = payload.username.map(|u| u.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    let password_hash = match payload.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash(&password)?)
        }
        None => None,
    };

    let patch = UserPatch {
        email,
        username,
        password_hash,
        ..UserPatch::default()
    };
    repo.update_user(id, patch)
        .await
        .map_err(taken)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

/// ensure_admin_account
///
/// Creates an active administrator from `ADMIN_EMAIL` / `ADMIN_PASSWORD` when
/// both are set and no account uses that email yet. Returns the created account.
pub async fn ensure_admin_account(
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<Option<User>, AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(None);
    };
    let email = email.trim().to_lowercase();
    validate_email(&email)?;

    if repo.find_user_by_login(&email).await?.is_some() {
        tracing::debug!(%email, "bootstrap administrator already present");
        return Ok(None);
    }

    let base = email.split('@').next().unwrap_or("admin").to_string();
    let username = if repo.find_user_by_login(&base).await?.is_some() {
        let suffix = Uuid::new_v4().simple().to_string();
        let fallback = format!("{base}-{}", &suffix[..8]);
        tracing::warn!(%base, %fallback, "bootstrap administrator username taken, using fallback");
        fallback
    } else {
        base
    };
    let mut admin = User::pending_member(email, username, hash(password)?);
    admin.role = Role::Admin;
    admin.state = AccountState::Active;

    let admin = repo.create_user(admin).await?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "bootstrap administrator created");
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use std::sync::Arc;

    fn services() -> (RepositoryState, MembershipWorkflow) {
        let repo: RepositoryState = Arc::new(MemoryRepository::new());
        let membership = MembershipWorkflow::new(repo.clone());
        (repo, membership)
    }

    fn signup_payload(email: &str, username: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    #[test]
    fn email_shape_check() {
        assert!(is_plausible_email("ada@example.com"));
        assert!(!is_plausible_email("ada.example.com"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ada@localhost"));
        assert!(!is_plausible_email("ada@@example.com"));
        assert!(!is_plausible_email("a da@example.com"));
    }

    #[tokio::test]
    async fn signup_creates_pending_member_with_request() {
        let (repo, membership) = services();

        let response = signup(&repo, &membership, signup_payload("Ada@Example.com", "ada"))
            .await
            .unwrap();

        assert_eq!(response.user.email, "ada@example.com");
        assert_eq!(response.user.state, AccountState::Pending);
        assert_eq!(response.user.role, Role::Member);
        assert_eq!(response.request.user_id, response.user.id);
        assert_eq!(membership.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signup_rejects_taken_email() {
        let (repo, membership) = services();
        signup(&repo, &membership, signup_payload("ada@example.com", "ada"))
            .await
            .unwrap();

        let err = signup(&repo, &membership, signup_payload("ada@example.com", "other"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let (repo, membership) = services();
        let mut payload = signup_payload("ada@example.com", "ada");
        payload.password = "123".into();

        let err = signup(&repo, &membership, payload).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_bootstrap_runs_once() {
        let (repo, _) = services();
        let config = AppConfig {
            admin_email: Some("root@example.com".into()),
            admin_password: Some("change-me-now".into()),
            ..AppConfig::default()
        };

        let created = ensure_admin_account(&repo, &config).await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.state, AccountState::Active);

        assert!(ensure_admin_account(&repo, &config).await.unwrap().is_none());
        assert_eq!(repo.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_bootstrap_survives_a_taken_username() {
        let (repo, membership) = services();
        signup(&repo, &membership, signup_payload("someone@example.com", "root"))
            .await
            .unwrap();
        let config = AppConfig {
            admin_email: Some("root@example.com".into()),
            admin_password: Some("change-me-now".into()),
            ..AppConfig::default()
        };

        let created = ensure_admin_account(&repo, &config).await.unwrap().unwrap();

        assert!(created.username.starts_with("root-"));
        assert_eq!(created.email, "root@example.com");
        assert_eq!(repo.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_bootstrap_needs_both_settings() {
        let (repo, _) = services();
        let config = AppConfig {
            admin_email: Some("root@example.com".into()),
            ..AppConfig::default()
        };
        assert!(ensure_admin_account(&repo, &config).await.unwrap().is_none());
    }
}
