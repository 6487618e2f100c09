//! Access control: credential verification, the request gate, and scoping.

mod gate;
mod password;
mod scope;
mod verifier;

pub use gate::{AccessGate, AdminUser, Caller, CurrentUser, Identity, LOCAL_USER_HEADER, authenticate};
pub use password::{hash_password, verify_password};
pub use scope::{SubjectScope, authorize_scope, ensure_owner_or_admin, ensure_self, require_admin};
pub use verifier::{Claims, CredentialVerifier, JwtVerifier, LoginError, VerifierState, VerifyError};
