use super::{Repository, StoreError, StoreResult};
use crate::{
    auth::SubjectScope,
    models::{
        CatalogEntry, CatalogKind, Collection, Document, DocumentFilter, Faculty,
        MembershipRequest, Subject, UpdateCollectionRequest, UpdateDocumentRequest, User,
        UserPatch,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    requests: Vec<MembershipRequest>,
    documents: Vec<Document>,
    collections: Vec<Collection>,
    faculties: Vec<(Uuid, String)>,
    subjects: Vec<Subject>,
    catalogs: HashMap<CatalogKind, Vec<CatalogEntry>>,
}

/// MemoryRepository
///
/// In-process `Repository` used by the test suites and by local runs started with
/// `DATABASE_URL=memory`. Records keep insertion order, which stands in for the
/// store's natural order.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    // --- Catalog seeding (catalogs are read-only through the trait) ---

    pub fn add_faculty(&self, name: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.write()?.faculties.push((id, name.to_string()));
        Ok(id)
    }

    pub fn add_subject(&self, faculty_id: Uuid, name: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.write()?.subjects.push(Subject {
            id,
            name: name.to_string(),
            faculty_id,
        });
        Ok(id)
    }

    pub fn add_catalog_entry(&self, kind: CatalogKind, name: &str) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.write()?
            .catalogs
            .entry(kind)
            .or_default()
            .push(CatalogEntry {
                id,
                name: name.to_string(),
            });
        Ok(id)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let by_email = login.contains('@');
        Ok(self
            .read()?
            .users
            .iter()
            .find(|u| {
                if by_email {
                    u.email.eq_ignore_ascii_case(login)
                } else {
                    u.username == login
                }
            })
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.clone())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.write()?;
        let taken = tables.users.iter().any(|u| {
            u.id == user.id || u.email.eq_ignore_ascii_case(&user.email) || u.username == user.username
        });
        if taken {
            return Err(StoreError::Duplicate(format!(
                "user {} already registered",
                user.email
            )));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        let clash = tables.users.iter().filter(|u| u.id != id).find(|u| {
            patch.email.as_ref().is_some_and(|e| u.email.eq_ignore_ascii_case(e))
                || patch.username.as_ref().is_some_and(|n| &u.username == n)
        });
        if let Some(other) = clash {
            return Err(StoreError::Duplicate(format!(
                "email or username held by user {}",
                other.id
            )));
        }
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(state) = patch.state {
            user.state = state;
        }
        if let Some(accesses) = patch.accesses {
            user.accesses = accesses;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        tables.requests.retain(|r| r.user_id != id);
        Ok(tables.users.len() < before)
    }

    /// Mirrors the database constraints: the identity must exist and may hold
    /// only one open request.
    async fn create_request(&self, user_id: Uuid) -> StoreResult<MembershipRequest> {
        let mut tables = self.write()?;
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::Unavailable(format!(
                "foreign key violation: no user {user_id}"
            )));
        }
        if tables.requests.iter().any(|r| r.user_id == user_id) {
            return Err(StoreError::Duplicate(format!(
                "membership request for user {user_id} already exists"
            )));
        }
        let request = MembershipRequest {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>> {
        Ok(self.read()?.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_requests(&self) -> StoreResult<Vec<(MembershipRequest, User)>> {
        let tables = self.read()?;
        Ok(tables
            .requests
            .iter()
            .filter_map(|request| {
                tables
                    .users
                    .iter()
                    .find(|u| u.id == request.user_id)
                    .map(|user| (request.clone(), user.clone()))
            })
            .collect())
    }

    async fn delete_request(&self, id: Uuid) -> StoreResult<Option<MembershipRequest>> {
        let mut tables = self.write()?;
        let position = tables.requests.iter().position(|r| r.id == id);
        Ok(position.map(|index| tables.requests.remove(index)))
    }

    async fn create_document(&self, document: Document) -> StoreResult<Document> {
        self.write()?.documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid, scope: &SubjectScope) -> StoreResult<Option<Document>> {
        Ok(self
            .read()?
            .documents
            .iter()
            .find(|d| d.id == id && scope.matches(&d.subject))
            .cloned())
    }

    async fn find_documents(
        &self,
        filter: &DocumentFilter,
        scope: &SubjectScope,
    ) -> StoreResult<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .read()?
            .documents
            .iter()
            .filter(|d| scope.matches(&d.subject))
            .filter(|d| filter.faculty.as_ref().is_none_or(|f| &d.faculty == f))
            .filter(|d| filter.doc_type.as_ref().is_none_or(|t| &d.doc_type == t))
            .filter(|d| filter.subject.is_none_or(|s| d.subject == s))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn update_document(
        &self,
        id: Uuid,
        patch: UpdateDocumentRequest,
    ) -> StoreResult<Option<Document>> {
        let mut tables = self.write()?;
        let Some(document) = tables.documents.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            document.name = name;
        }
        if let Some(doc_type) = patch.doc_type {
            document.doc_type = doc_type;
        }
        if let Some(visibility) = patch.visibility {
            document.visibility = visibility;
        }
        if let Some(description) = patch.description {
            document.description = description;
        }
        if patch.class.is_some() {
            document.class = patch.class;
        }
        if patch.section.is_some() {
            document.section = patch.section;
        }
        document.updated_at = Utc::now();
        Ok(Some(document.clone()))
    }

    async fn delete_document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        let mut tables = self.write()?;
        let position = tables.documents.iter().position(|d| d.id == id);
        Ok(position.map(|index| tables.documents.remove(index)))
    }

    async fn create_collection(&self, collection: Collection) -> StoreResult<Collection> {
        self.write()?.collections.push(collection.clone());
        Ok(collection)
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.read()?.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn search_collections(&self, fragment: &str) -> StoreResult<Vec<Collection>> {
        let needle = fragment.to_lowercase();
        let mut found: Vec<Collection> = self
            .read()?
            .collections
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn update_collection(
        &self,
        id: Uuid,
        patch: UpdateCollectionRequest,
    ) -> StoreResult<Option<Collection>> {
        let mut tables = self.write()?;
        let Some(collection) = tables.collections.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            collection.name = name;
        }
        if let Some(permissions) = patch.permissions {
            collection.permissions = permissions;
        }
        if let Some(authorizations) = patch.authorizations {
            collection.authorizations = authorizations;
        }
        if let Some(documents) = patch.documents {
            collection.documents = documents;
        }
        collection.updated_at = Utc::now();
        Ok(Some(collection.clone()))
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let before = tables.collections.len();
        tables.collections.retain(|c| c.id != id);
        Ok(tables.collections.len() < before)
    }

    async fn list_faculties(&self) -> StoreResult<Vec<Faculty>> {
        let tables = self.read()?;
        let mut faculties: Vec<Faculty> = tables
            .faculties
            .iter()
            .map(|(id, name)| Faculty {
                id: *id,
                name: name.clone(),
                subjects: tables
                    .subjects
                    .iter()
                    .filter(|s| s.faculty_id == *id)
                    .map(|s| s.id)
                    .collect(),
            })
            .collect();
        faculties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(faculties)
    }

    async fn list_subjects(&self, faculty_id: Uuid) -> StoreResult<Vec<Subject>> {
        let mut subjects: Vec<Subject> = self
            .read()?
            .subjects
            .iter()
            .filter(|s| s.faculty_id == faculty_id)
            .cloned()
            .collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    async fn list_catalog(&self, kind: CatalogKind) -> StoreResult<Vec<CatalogEntry>> {
        let mut entries = self
            .read()?
            .catalogs
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
