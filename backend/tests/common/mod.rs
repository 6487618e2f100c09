//! Shared fixtures for the router-level test suites.
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use doc_archive::{
    AppConfig, AppState, MemoryRepository, MockStorageService, create_router,
    auth::{CredentialVerifier, JwtVerifier, hash_password},
    config::Env,
    models::{AccountState, Role, User},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use chrono::Utc;
use std::sync::{Arc, OnceLock};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";
pub const SECRET: &str = "integration-test-secret";

/// Argon2 is slow in debug builds; every seeded account shares one hash.
pub fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub struct TestApp {
    pub repo: Arc<MemoryRepository>,
    pub storage: MockStorageService,
    pub verifier: Arc<JwtVerifier>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_env(Env::Production)
    }

    pub fn with_env(env: Env) -> Self {
        Self::build(env, MockStorageService::new())
    }

    pub fn with_failing_storage() -> Self {
        Self::build(Env::Production, MockStorageService::new_failing())
    }

    fn build(env: Env, storage: MockStorageService) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let verifier = Arc::new(JwtVerifier::new(repo.clone(), SECRET, 3600));
        let config = AppConfig {
            env,
            jwt_secret: SECRET.to_string(),
            ..AppConfig::default()
        };
        let state = AppState::new(
            repo.clone() as RepositoryState,
            Arc::new(storage.clone()) as StorageState,
            verifier.clone(),
            config,
        );
        Self {
            repo,
            storage,
            verifier,
            state,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Inserts an account directly, bypassing signup.
    pub async fn seed_user(
        &self,
        username: &str,
        role: Role,
        state: AccountState,
        accesses: Vec<Uuid>,
    ) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: password_hash(),
            role,
            accesses,
            state,
            created_at: Utc::now(),
        };
        self.repo.create_user(user).await.unwrap()
    }

    pub async fn admin(&self) -> User {
        self.seed_user("root", Role::Admin, AccountState::Active, vec![])
            .await
    }

    pub async fn member(&self, username: &str, accesses: Vec<Uuid>) -> User {
        self.seed_user(username, Role::Member, AccountState::Active, accesses)
            .await
    }

    pub fn token(&self, user: &User) -> String {
        self.verifier.issue_token(user.id).unwrap()
    }

    /// Sends a JSON request, authenticated when `user` is given.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

/// Builds a multipart body with a `document` JSON part and an optional file part.
pub fn multipart_upload(metadata: &Value, file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let boundary = "----doc-archive-test-boundary".to_string();
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"document\"\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    if let Some((file_name, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"fileToUpload\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
