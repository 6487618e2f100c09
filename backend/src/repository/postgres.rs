use super::{Repository, StoreResult};
use crate::{
    auth::SubjectScope,
    models::{
        CatalogEntry, CatalogKind, Collection, Document, DocumentFilter, Faculty,
        MembershipRequest, Subject, UpdateCollectionRequest, UpdateDocumentRequest, User,
        UserPatch,
    },
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, username, password_hash, role, accesses, state, created_at";
const DOCUMENT_COLUMNS: &str = r#"id, name, "type", faculty, subject, class, section, visibility,
    description, author, directory, mime_type, created_at, updated_at"#;
const COLLECTION_COLUMNS: &str =
    "id, name, author, permissions, authorizations, documents, created_at, updated_at";

/// Escapes `LIKE` wildcards so a fragment only matches itself.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A membership request row joined with its identity.
#[derive(FromRow)]
struct PendingRow {
    request_id: Uuid,
    request_created_at: chrono::DateTime<chrono::Utc>,
    #[sqlx(flatten)]
    user: User,
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Schema lives in
/// `migrations/` and is applied at startup.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- IDENTITIES ---

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let sql = if login.contains('@') {
            format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)")
        } else {
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1")
        };
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.accesses)
            .bind(user.state.as_str())
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Partial update via `COALESCE`: only columns whose patch field is `Some` change.
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                username = COALESCE($3, username),
                password_hash = COALESCE($4, password_hash),
                state = COALESCE($5, state),
                accesses = COALESCE($6, accesses)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(patch.email)
            .bind(patch.username)
            .bind(patch.password_hash)
            .bind(patch.state.map(|state| state.as_str()))
            .bind(patch.accesses)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Open membership requests go with the row (`ON DELETE CASCADE`).
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- MEMBERSHIP REQUESTS ---

    async fn create_request(&self, user_id: Uuid) -> StoreResult<MembershipRequest> {
        Ok(sqlx::query_as::<_, MembershipRequest>(
            "INSERT INTO membership_requests (id, user_id, created_at) VALUES ($1, $2, NOW()) RETURNING id, user_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>> {
        Ok(sqlx::query_as::<_, MembershipRequest>(
            "SELECT id, user_id, created_at FROM membership_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_requests(&self) -> StoreResult<Vec<(MembershipRequest, User)>> {
        let rows = sqlx::query_as::<_, PendingRow>(
            r#"
            SELECT r.id AS request_id, r.created_at AS request_created_at,
                   u.id, u.email, u.username, u.password_hash, u.role, u.accesses, u.state, u.created_at
            FROM membership_requests r
            JOIN users u ON u.id = r.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let request = MembershipRequest {
                    id: row.request_id,
                    user_id: row.user.id,
                    created_at: row.request_created_at,
                };
                (request, row.user)
            })
            .collect())
    }

    /// Delete-if-exists: an already-removed request yields `Ok(None)`.
    async fn delete_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>> {
        Ok(sqlx::query_as::<_, MembershipRequest>(
            "DELETE FROM membership_requests WHERE id = $1 RETURNING id, user_id, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // --- DOCUMENTS ---

    async fn create_document(&self, document: Document) -> StoreResult<Document> {
        let sql = format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {DOCUMENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(document.id)
            .bind(&document.name)
            .bind(&document.doc_type)
            .bind(&document.faculty)
            .bind(document.subject)
            .bind(&document.class)
            .bind(&document.section)
            .bind(&document.visibility)
            .bind(&document.description)
            .bind(document.author)
            .bind(&document.directory)
            .bind(&document.mime_type)
            .bind(document.created_at)
            .bind(document.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    /// A document outside `scope` is indistinguishable from a missing one.
    async fn get_document(&self, id: Uuid, scope: &SubjectScope) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND ($2::uuid[] IS NULL OR subject = ANY($2))"
        );
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .bind(scope.subjects().map(<[Uuid]>::to_vec))
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Builds the filter with `QueryBuilder`; the scope predicate is ANDed with
    /// the caller's own filters.
    async fn find_documents(
        &self,
        filter: &DocumentFilter,
        scope: &SubjectScope,
    ) -> StoreResult<Vec<Document>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE TRUE"));

        if let Some(subjects) = scope.subjects() {
            builder.push(" AND subject = ANY(");
            builder.push_bind(subjects.to_vec());
            builder.push(")");
        }
        if let Some(faculty) = &filter.faculty {
            builder.push(" AND faculty = ");
            builder.push_bind(faculty.clone());
        }
        if let Some(doc_type) = &filter.doc_type {
            builder.push(r#" AND "type" = "#);
            builder.push_bind(doc_type.clone());
        }
        if let Some(subject) = filter.subject {
            builder.push(" AND subject = ");
            builder.push_bind(subject);
        }
        builder.push(" ORDER BY created_at DESC");

        Ok(builder
            .build_query_as::<Document>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_document(
        &self,
        id: Uuid,
        patch: UpdateDocumentRequest,
    ) -> StoreResult<Option<Document>> {
        let sql = format!(
            r#"
            UPDATE documents
            SET name = COALESCE($2, name),
                "type" = COALESCE($3, "type"),
                visibility = COALESCE($4, visibility),
                description = COALESCE($5, description),
                class = COALESCE($6, class),
                section = COALESCE($7, section),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.doc_type)
            .bind(patch.visibility)
            .bind(patch.description)
            .bind(patch.class)
            .bind(patch.section)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        let sql = format!("DELETE FROM documents WHERE id = $1 RETURNING {DOCUMENT_COLUMNS}");
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- COLLECTIONS ---

    async fn create_collection(&self, collection: Collection) -> StoreResult<Collection> {
        let sql = format!(
            "INSERT INTO collections ({COLLECTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {COLLECTION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Collection>(&sql)
            .bind(collection.id)
            .bind(&collection.name)
            .bind(collection.author)
            .bind(&collection.permissions)
            .bind(&collection.authorizations)
            .bind(&collection.documents)
            .bind(collection.created_at)
            .bind(collection.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = $1");
        Ok(sqlx::query_as::<_, Collection>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn search_collections(&self, fragment: &str) -> StoreResult<Vec<Collection>> {
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE name ILIKE $1 ESCAPE '\\' ORDER BY name"
        );
        Ok(sqlx::query_as::<_, Collection>(&sql)
            .bind(format!("%{}%", escape_like(fragment)))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_collection(
        &self,
        id: Uuid,
        patch: UpdateCollectionRequest,
    ) -> StoreResult<Option<Collection>> {
        let sql = format!(
            r#"
            UPDATE collections
            SET name = COALESCE($2, name),
                permissions = COALESCE($3, permissions),
                authorizations = COALESCE($4, authorizations),
                documents = COALESCE($5, documents),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLLECTION_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Collection>(&sql)
            .bind(id)
            .bind(patch.name)
            .bind(patch.permissions)
            .bind(patch.authorizations)
            .bind(patch.documents)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CATALOGS ---

    async fn list_faculties(&self) -> StoreResult<Vec<Faculty>> {
        Ok(sqlx::query_as::<_, Faculty>(
            r#"
            SELECT f.id, f.name,
                   COALESCE(array_agg(s.id) FILTER (WHERE s.id IS NOT NULL), '{}') AS subjects
            FROM faculties f
            LEFT JOIN subjects s ON s.faculty_id = f.id
            GROUP BY f.id, f.name
            ORDER BY f.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_subjects(&self, faculty_id: Uuid) -> StoreResult<Vec<Subject>> {
        Ok(sqlx::query_as::<_, Subject>(
            "SELECT id, name, faculty_id FROM subjects WHERE faculty_id = $1 ORDER BY name",
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_catalog(&self, kind: CatalogKind) -> StoreResult<Vec<CatalogEntry>> {
        // Table names come from a closed enum, never from input.
        let sql = format!("SELECT id, name FROM {} ORDER BY name", kind.table());
        Ok(sqlx::query_as::<_, CatalogEntry>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}
