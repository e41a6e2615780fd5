//! Local credentials, delegated identities, and the per-request capability they grant.

mod oauth;
mod password;
mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{RecruiterId, StudentId};

pub use oauth::{DelegatedIdentity, GithubProfile, GoogleProfile, Provider, ProviderProfile};
pub use password::CredentialHasher;
pub use session::{IssuedSession, SessionSigner};

/// The authenticated party behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Principal {
    Student(StudentId),
    Recruiter(RecruiterId),
}

impl Principal {
    pub const fn role(self) -> &'static str {
        match self {
            Principal::Student(_) => "student",
            Principal::Recruiter(_) => "recruiter",
        }
    }
}

/// Explicit authorization token handed to every mutating portal operation.
///
/// A capability is only minted by [`SessionSigner`] after verifying a session token, so holding
/// one means the principal was authenticated for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

impl Capability {
    pub(crate) fn new(principal: Principal, expires_at: DateTime<Utc>) -> Self {
        Self {
            principal,
            expires_at,
        }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn student(&self) -> Result<StudentId, IdentityError> {
        match self.principal {
            Principal::Student(id) => Ok(id),
            Principal::Recruiter(_) => Err(IdentityError::Forbidden(
                "operation requires a student session".to_string(),
            )),
        }
    }

    pub fn recruiter(&self) -> Result<RecruiterId, IdentityError> {
        match self.principal {
            Principal::Recruiter(id) => Ok(id),
            Principal::Student(_) => Err(IdentityError::Forbidden(
                "operation requires a recruiter session".to_string(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("authentication failed: {0}")]
    Unauthenticated(&'static str),
    #[error("identity conflict: {0}")]
    AuthConflict(String),
    #[error("credential hashing failed: {0}")]
    Hashing(String),
}
