use chrono::{Duration, Utc};
use doc_archive::{
    auth::SubjectScope,
    models::{
        AccountState, Collection, Document, DocumentFilter, UpdateCollectionRequest,
        UpdateDocumentRequest, User,
    },
    repository::{MemoryRepository, PostgresRepository, Repository, StoreError},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Connects to the database named by `DATABASE_URL`, or returns `None` when the
/// variable is unset or selects the in-memory store. The Postgres half of each
/// test is skipped in that case.
async fn postgres() -> Option<PostgresRepository> {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }

    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");
    let repo = PostgresRepository::new(pool);
    repo.migrate().await.expect("Failed to run database migrations.");
    Some(repo)
}

// --- Test Data Helpers ---

fn unique_user() -> User {
    let tag = Uuid::new_v4().simple().to_string();
    User::pending_member(
        format!("{}@test.com", &tag[..12]),
        format!("user-{}", &tag[..12]),
        "not-a-real-hash".to_string(),
    )
}

fn document(author: Uuid, subject: Uuid, doc_type: &str, age_minutes: i64) -> Document {
    let created = Utc::now() - Duration::minutes(age_minutes);
    Document {
        id: Uuid::new_v4(),
        name: format!("{doc_type} notes"),
        doc_type: doc_type.to_string(),
        faculty: "Engineering".to_string(),
        subject,
        class: None,
        section: None,
        visibility: "public".to_string(),
        description: "fixture".to_string(),
        author,
        directory: format!("{}.pdf", Uuid::new_v4().simple()),
        mime_type: "application/pdf".to_string(),
        created_at: created,
        updated_at: created,
    }
}

// --- Contract checks shared by both implementations ---

async fn membership_contract(repo: &dyn Repository) {
    let user = repo.create_user(unique_user()).await.unwrap();

    let request = repo.create_request(user.id).await.unwrap();
    assert_eq!(request.user_id, user.id);

    let duplicate = repo.create_request(user.id).await;
    assert!(matches!(duplicate, Err(StoreError::Duplicate(_))));

    let listed = repo.list_requests().await.unwrap();
    let (found, owner) = listed
        .iter()
        .find(|(r, _)| r.id == request.id)
        .expect("request should be listed");
    assert_eq!(found.user_id, user.id);
    assert_eq!(owner.state, AccountState::Pending);

    assert_eq!(repo.delete_request(request.id).await.unwrap().map(|r| r.id), Some(request.id));
    assert!(repo.delete_request(request.id).await.unwrap().is_none());

    assert!(repo.delete_user(user.id).await.unwrap());
    assert!(!repo.delete_user(user.id).await.unwrap());
}

async fn login_lookup_contract(repo: &dyn Repository) {
    let user = repo.create_user(unique_user()).await.unwrap();

    let by_email = repo
        .find_user_by_login(&user.email.to_uppercase())
        .await
        .unwrap();
    let by_username = repo.find_user_by_login(&user.username).await.unwrap();

    assert_eq!(by_email.map(|u| u.id), Some(user.id));
    assert_eq!(by_username.map(|u| u.id), Some(user.id));
    assert!(repo.find_user_by_login("nobody-at-all").await.unwrap().is_none());

    // A username spelled like this account's email never shadows it.
    let mut lookalike = unique_user();
    lookalike.username = user.email.clone();
    let lookalike = repo.create_user(lookalike).await.unwrap();
    let resolved = repo.find_user_by_login(&user.email).await.unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));

    repo.delete_user(lookalike.id).await.unwrap();
    repo.delete_user(user.id).await.unwrap();
}

async fn document_scope_contract(repo: &dyn Repository) {
    let author = repo.create_user(unique_user()).await.unwrap();
    let (maths, physics) = (Uuid::new_v4(), Uuid::new_v4());

    let older = repo.create_document(document(author.id, maths, "exam", 10)).await.unwrap();
    let newer = repo.create_document(document(author.id, maths, "lecture", 1)).await.unwrap();
    let hidden = repo.create_document(document(author.id, physics, "exam", 5)).await.unwrap();

    let scope = SubjectScope::Subjects(vec![maths]);
    let visible = repo
        .find_documents(&DocumentFilter { subject: Some(maths), ..DocumentFilter::default() }, &scope)
        .await
        .unwrap();
    assert_eq!(visible.iter().map(|d| d.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

    let exams_everywhere = repo
        .find_documents(
            &DocumentFilter { doc_type: Some("exam".into()), ..DocumentFilter::default() },
            &SubjectScope::Subjects(vec![maths, physics]),
        )
        .await
        .unwrap();
    assert!(exams_everywhere.iter().any(|d| d.id == hidden.id));
    assert!(exams_everywhere.iter().all(|d| d.doc_type == "exam"));

    assert!(repo.get_document(hidden.id, &scope).await.unwrap().is_none());
    assert!(repo.get_document(hidden.id, &SubjectScope::Unrestricted).await.unwrap().is_some());

    let patch = UpdateDocumentRequest {
        description: Some("revised".into()),
        ..UpdateDocumentRequest::default()
    };
    let updated = repo.update_document(older.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.description, "revised");
    assert_eq!(updated.doc_type, "exam");

    for id in [older.id, newer.id, hidden.id] {
        assert!(repo.delete_document(id).await.unwrap().is_some());
    }
    assert!(repo.delete_document(older.id).await.unwrap().is_none());
    repo.delete_user(author.id).await.unwrap();
}

async fn collection_contract(repo: &dyn Repository) {
    let author = repo.create_user(unique_user()).await.unwrap();
    let marker = Uuid::new_v4().simple().to_string();
    let now = Utc::now();
    let collection = repo
        .create_collection(Collection {
            id: Uuid::new_v4(),
            name: format!("Revision {marker}"),
            author: author.id,
            permissions: "private".to_string(),
            authorizations: vec![],
            documents: vec![],
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let found = repo.search_collections(&marker.to_uppercase()).await.unwrap();
    assert_eq!(found.iter().map(|c| c.id).collect::<Vec<_>>(), vec![collection.id]);

    // Wildcard characters in the fragment match literally.
    let mut discount = collection.clone();
    discount.id = Uuid::new_v4();
    discount.name = format!("{marker} 50% off");
    let discount = repo.create_collection(discount).await.unwrap();
    let mut pages = collection.clone();
    pages.id = Uuid::new_v4();
    pages.name = format!("{marker} 500 pages");
    let pages = repo.create_collection(pages).await.unwrap();

    let literal = repo.search_collections(&format!("{marker} 50%")).await.unwrap();
    assert_eq!(literal.iter().map(|c| c.id).collect::<Vec<_>>(), vec![discount.id]);
    let underscore = repo.search_collections(&format!("{marker} 5_0")).await.unwrap();
    assert!(underscore.is_empty());

    for id in [discount.id, pages.id] {
        assert!(repo.delete_collection(id).await.unwrap());
    }

    let document = Uuid::new_v4();
    let patch = UpdateCollectionRequest {
        documents: Some(vec![document]),
        ..UpdateCollectionRequest::default()
    };
    let updated = repo.update_collection(collection.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.documents, vec![document]);
    assert_eq!(updated.permissions, "private");

    assert!(repo.delete_collection(collection.id).await.unwrap());
    assert!(!repo.delete_collection(collection.id).await.unwrap());
    repo.delete_user(author.id).await.unwrap();
}

// --- Test Cases ---

#[tokio::test]
async fn test_membership_requests() {
    membership_contract(&MemoryRepository::new()).await;
    if let Some(repo) = postgres().await {
        membership_contract(&repo).await;
    }
}

#[tokio::test]
async fn test_login_lookup() {
    login_lookup_contract(&MemoryRepository::new()).await;
    if let Some(repo) = postgres().await {
        login_lookup_contract(&repo).await;
    }
}

#[tokio::test]
async fn test_document_scoping() {
    document_scope_contract(&MemoryRepository::new()).await;
    if let Some(repo) = postgres().await {
        document_scope_contract(&repo).await;
    }
}

#[tokio::test]
async fn test_collections() {
    collection_contract(&MemoryRepository::new()).await;
    if let Some(repo) = postgres().await {
        collection_contract(&repo).await;
    }
}
