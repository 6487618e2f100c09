use doc_archive::{
    AppConfig, AppState, MemoryRepository, MockStorageService, create_router,
    accounts::ensure_admin_account,
    auth::{JwtVerifier, VerifierState},
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

const ADMIN_EMAIL: &str = "root@example.com";
const ADMIN_PASSWORD: &str = "bootstrap-pass";

pub struct TestServer {
    pub address: String,
}

/// Serves the full router on an ephemeral port, backed by the in-memory store
/// and a bootstrap administrator.
async fn spawn_app() -> TestServer {
    let config = AppConfig {
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ..AppConfig::default()
    };
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let verifier = Arc::new(JwtVerifier::from_config(repo.clone(), &config)) as VerifierState;
    ensure_admin_account(&repo, &config).await.unwrap();

    let router = create_router(AppState::new(repo, storage, verifier, config));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer { address }
}

async fn login(client: &reqwest::Client, app: &TestServer, login: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/login", app.address))
        .json(&json!({ "login": login, "password": password }))
        .send()
        .await
        .expect("login request failed")
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/admin/requests/{id}/accept"].is_object());
    assert!(doc["paths"]["/documents"].is_object());
    for path in ["/admin/requests", "/admin/users", "/admin/users/{id}/state", "/catalog/faculties"] {
        assert!(doc["paths"][path].is_object(), "missing {path}");
    }
}

#[tokio::test]
async fn test_membership_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Signup
    let response = client
        .post(format!("{}/signup", app.address))
        .json(&json!({ "email": "ada@example.com", "username": "ada", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();

    // Pending login
    let pending = login(&client, &app, "ada", "hunter22").await;
    assert_eq!(pending.status(), 401);

    // Admin approves
    let admin: Value = login(&client, &app, ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .json()
        .await
        .unwrap();
    let token = admin["token"].as_str().unwrap();
    let response = client
        .post(format!(
            "{}/admin/requests/{}/accept",
            app.address,
            created["request"]["id"].as_str().unwrap()
        ))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Active login
    let active = login(&client, &app, "ada@example.com", "hunter22").await;
    assert_eq!(active.status(), 200);
    let body: Value = active.json().await.unwrap();
    let me: Value = client
        .get(format!("{}/me", app.address))
        .bearer_auth(body["token"].as_str().unwrap())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["state"], "active");
}
