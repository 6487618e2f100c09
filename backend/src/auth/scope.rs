//! Authorization scoping and privilege checks.

use super::Identity;
use crate::{error::AppError, models::Role};
use uuid::Uuid;

/// SubjectScope
///
/// The query filter produced for an identity. Every read of scoped records in a
/// request must AND this with its own predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectScope {
    /// Matches every record.
    Unrestricted,
    /// Matches records whose subject is in the set.
    Subjects(Vec<Uuid>),
}

impl SubjectScope {
    pub fn matches(&self, subject: &Uuid) -> bool {
        match self {
            SubjectScope::Unrestricted => true,
            SubjectScope::Subjects(allowed) => allowed.contains(subject),
        }
    }

    /// The permitted subject set, or `None` when unrestricted.
    pub fn subjects(&self) -> Option<&[Uuid]> {
        match self {
            SubjectScope::Unrestricted => None,
            SubjectScope::Subjects(allowed) => Some(allowed),
        }
    }
}

/// authorize_scope
///
/// Admins get an unrestricted filter; everyone else is limited to the subjects
/// in their accesses list.
pub fn authorize_scope(identity: &Identity) -> SubjectScope {
    match identity.role {
        Role::Admin => SubjectScope::Unrestricted,
        Role::Member => SubjectScope::Subjects(identity.accesses.clone()),
    }
}

/// Rejects a caller operating on another identity's resource.
pub fn ensure_self(identity: &Identity, target: Uuid) -> Result<(), AppError> {
    if identity.id == target {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// Like `ensure_self`, but admins may act on anyone's resource.
pub fn ensure_owner_or_admin(identity: &Identity, owner: Uuid) -> Result<(), AppError> {
    if identity.is_admin() {
        return Ok(());
    }
    ensure_self(identity, owner)
}

pub fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
