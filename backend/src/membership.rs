//! Membership request workflow: pending accounts apply, administrators resolve.

use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{AccountState, MembershipRequest, PendingRequest, UserPatch},
    repository::{RepositoryState, StoreError},
};

/// WorkflowError
///
/// Typed failures of the membership workflow. Converted into `AppError` at the
/// handler boundary.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("no identity with id {0}")]
    IdentityNotFound(Uuid),

    #[error("no membership request with id {0}")]
    RequestNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn parse_id(raw: &str) -> Result<Uuid, WorkflowError> {
    Uuid::parse_str(raw.trim()).map_err(|_| WorkflowError::InvalidIdentifier(raw.to_string()))
}

/// MembershipWorkflow
///
/// State machine per identity: `pending` (with one open request) to `active`.
/// Stateless itself; every transition goes through the repository.
#[derive(Clone)]
pub struct MembershipWorkflow {
    repo: RepositoryState,
}

impl MembershipWorkflow {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// submit
    ///
    /// Files a request for an existing identity. The id is validated before the
    /// store is touched. A second request for the same identity is rejected by
    /// the store as a duplicate.
    pub async fn submit(&self, identity_id: &str) -> Result<MembershipRequest, WorkflowError> {
        let user_id = parse_id(identity_id)?;

        if self.repo.get_user(user_id).await?.is_none() {
            return Err(WorkflowError::IdentityNotFound(user_id));
        }

        let request = self.repo.create_request(user_id).await?;
        tracing::info!(request_id = %request.id, %user_id, "membership request submitted");
        Ok(request)
    }

    /// Open requests joined with their identities, in the store's order.
    pub async fn list(&self) -> Result<Vec<PendingRequest>, WorkflowError> {
        let rows = self.repo.list_requests().await?;
        Ok(rows
            .into_iter()
            .map(|(request, user)| PendingRequest {
                id: request.id,
                created_at: request.created_at,
                user: user.profile(),
            })
            .collect())
    }

    /// approve
    ///
    /// Activates the identity, then deletes the request. The two writes are not
    /// atomic: if the delete fails after activation, the identity stays active
    /// and the request lingers until approved again, which repeats the same
    /// idempotent writes.
    pub async fn approve(&self, request_id: &str) -> Result<MembershipRequest, WorkflowError> {
        let id = parse_id(request_id)?;
        let request = self
            .repo
            .get_request(id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(id))?;

        let activate = UserPatch {
            state: Some(AccountState::Active),
            ..UserPatch::default()
        };
        if self.repo.update_user(request.user_id, activate).await?.is_none() {
            // The identity vanished underneath its request; clear the orphan.
            self.repo.delete_request(id).await?;
            return Err(WorkflowError::IdentityNotFound(request.user_id));
        }

        // A concurrent approval may already have removed it.
        if self.repo.delete_request(id).await?.is_none() {
            tracing::debug!(request_id = %id, "membership request already removed");
        }

        tracing::info!(request_id = %id, user_id = %request.user_id, "membership request approved");
        Ok(request)
    }

    /// reject
    ///
    /// Removes the request and disables the identity it referenced.
    pub async fn reject(&self, request_id: &str) -> Result<MembershipRequest, WorkflowError> {
        let id = parse_id(request_id)?;
        let request = self
            .repo
            .delete_request(id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(id))?;

        let disable = UserPatch {
            state: Some(AccountState::Disabled),
            ..UserPatch::default()
        };
        self.repo.update_user(request.user_id, disable).await?;

        tracing::info!(request_id = %id, user_id = %request.user_id, "membership request rejected");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::SubjectScope,
        models::{
            CatalogEntry, CatalogKind, Collection, Document, DocumentFilter, Faculty, Subject,
            UpdateCollectionRequest, UpdateDocumentRequest, User,
        },
        repository::{MemoryRepository, Repository, StoreResult},
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Fails the test on any store access.
    struct UntouchableRepository;

    #[async_trait]
    impl Repository for UntouchableRepository {
        async fn get_user(&self, _: Uuid) -> StoreResult<Option<User>> {
            panic!("store accessed")
        }
        async fn find_user_by_login(&self, _: &str) -> StoreResult<Option<User>> {
            panic!("store accessed")
        }
        async fn list_users(&self) -> StoreResult<Vec<User>> {
            panic!("store accessed")
        }
        async fn create_user(&self, _: User) -> StoreResult<User> {
            panic!("store accessed")
        }
        async fn update_user(&self, _: Uuid, _: UserPatch) -> StoreResult<Option<User>> {
            panic!("store accessed")
        }
        async fn delete_user(&self, _: Uuid) -> StoreResult<bool> {
            panic!("store accessed")
        }
        async fn create_request(&self, _: Uuid) -> StoreResult<MembershipRequest> {
            panic!("store accessed")
        }
        async fn get_request(&self, _: Uuid) -> StoreResult<Option<MembershipRequest>> {
            panic!("store accessed")
        }
        async fn list_requests(&self) -> StoreResult<Vec<(MembershipRequest, User)>> {
            panic!("store accessed")
        }
        async fn delete_request(&self, _: Uuid) -> StoreResult<Option<MembershipRequest>> {
            panic!("store accessed")
        }
        async fn create_document(&self, _: Document) -> StoreResult<Document> {
            panic!("store accessed")
        }
        async fn get_document(&self, _: Uuid, _: &SubjectScope) -> StoreResult<Option<Document>> {
            panic!("store accessed")
        }
        async fn find_documents(
            &self,
            _: &DocumentFilter,
            _: &SubjectScope,
        ) -> StoreResult<Vec<Document>> {
            panic!("store accessed")
        }
        async fn update_document(
            &self,
            _: Uuid,
            _: UpdateDocumentRequest,
        ) -> StoreResult<Option<Document>> {
            panic!("store accessed")
        }
        async fn delete_document(&self, _: Uuid) -> StoreResult<Option<Document>> {
            panic!("store accessed")
        }
        async fn create_collection(&self, _: Collection) -> StoreResult<Collection> {
            panic!("store accessed")
        }
        async fn get_collection(&self, _: Uuid) -> StoreResult<Option<Collection>> {
            panic!("store accessed")
        }
        async fn search_collections(&self, _: &str) -> StoreResult<Vec<Collection>> {
            panic!("store accessed")
        }
        async fn update_collection(
            &self,
            _: Uuid,
            _: UpdateCollectionRequest,
        ) -> StoreResult<Option<Collection>> {
            panic!("store accessed")
        }
        async fn delete_collection(&self, _: Uuid) -> StoreResult<bool> {
            panic!("store accessed")
        }
        async fn list_faculties(&self) -> StoreResult<Vec<Faculty>> {
            panic!("store accessed")
        }
        async fn list_subjects(&self, _: Uuid) -> StoreResult<Vec<Subject>> {
            panic!("store accessed")
        }
        async fn list_catalog(&self, _: CatalogKind) -> StoreResult<Vec<CatalogEntry>> {
            panic!("store accessed")
        }
    }

    async fn pending_user(repo: &MemoryRepository) -> User {
        repo.create_user(User::pending_member(
            "grace@example.com".into(),
            "grace".into(),
            "$argon2id$placeholder".into(),
        ))
        .await
        .unwrap()
    }

    fn workflow(repo: Arc<MemoryRepository>) -> MembershipWorkflow {
        MembershipWorkflow::new(repo)
    }

    #[tokio::test]
    async fn submit_rejects_malformed_id_before_touching_the_store() {
        let workflow = MembershipWorkflow::new(Arc::new(UntouchableRepository));

        let err = workflow.submit("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidIdentifier(raw) if raw == "not-a-uuid"));

        let err = workflow.approve("12345").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn submit_for_unknown_identity_is_not_found() {
        let workflow = workflow(Arc::new(MemoryRepository::new()));
        let ghost = Uuid::new_v4();

        let err = workflow.submit(&ghost.to_string()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::IdentityNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn duplicate_submit_is_a_store_error() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo);

        workflow.submit(&user.id.to_string()).await.unwrap();
        let err = workflow.submit(&user.id.to_string()).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Store(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn list_joins_requests_with_identities() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo);
        let request = workflow.submit(&user.id.to_string()).await.unwrap();

        let pending = workflow.list().await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, request.id);
        assert_eq!(pending[0].user.username, "grace");
        assert_eq!(pending[0].user.state, AccountState::Pending);
    }

    #[tokio::test]
    async fn approve_missing_request_leaves_identities_alone() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo.clone());

        let err = workflow.approve(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RequestNotFound(_)));

        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AccountState::Pending);
    }

    #[tokio::test]
    async fn approve_activates_identity_and_removes_request() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo.clone());
        let request = workflow.submit(&user.id.to_string()).await.unwrap();

        let approved = workflow.approve(&request.id.to_string()).await.unwrap();

        assert_eq!(approved.id, request.id);
        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AccountState::Active);
        assert!(repo.get_request(request.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_approve_is_not_found() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo.clone());
        let request = workflow.submit(&user.id.to_string()).await.unwrap();

        workflow.approve(&request.id.to_string()).await.unwrap();
        let err = workflow.approve(&request.id.to_string()).await.unwrap_err();

        assert!(matches!(err, WorkflowError::RequestNotFound(id) if id == request.id));
        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AccountState::Active);
    }

    #[tokio::test]
    async fn reject_disables_identity() {
        let repo = Arc::new(MemoryRepository::new());
        let user = pending_user(&repo).await;
        let workflow = workflow(repo.clone());
        let request = workflow.submit(&user.id.to_string()).await.unwrap();

        workflow.reject(&request.id.to_string()).await.unwrap();

        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.state, AccountState::Disabled);
        assert!(workflow.list().await.unwrap().is_empty());
    }
}
