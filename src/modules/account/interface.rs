use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;

use super::model::{Purpose, Session, User, UserId, VerificationCode};

// =============================================================================
// PERSISTENCE PORT
// =============================================================================

pub type Result<T> = std::result::Result<T, AccountError>;

/// Proof of control over `email` for `purpose`, checked and consumed by [`AccountStore::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeClaim {
    pub email: String,
    pub purpose: Purpose,
    pub code_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    None,
    Create { email: String, password_hash: String },
    SetPassword { email: String, password_hash: String },
    ChangeEmail { old_email: String, new_email: String },
    ExtendSubscription { id: UserId, period: Duration },
    Delete { id: UserId },
}

/// A user mutation gated by zero or more verification codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMutation {
    pub claims: Vec<CodeClaim>,
    pub change: UserChange,
}

impl AccountMutation {
    pub fn new(change: UserChange) -> Self {
        Self {
            claims: Vec::new(),
            change,
        }
    }

    pub fn claim(mut self, claim: CodeClaim) -> Self {
        self.claims.push(claim);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub codes: u64,
    pub sessions: u64,
}

/// Storage for users, verification codes and sessions.
///
/// `apply` is the only compound write: every claim is checked, the user change
/// is applied and the claimed codes are consumed as one atomic unit. A claim
/// that fails with [`CodeError::Mismatch`] still records the failed attempt.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Drops every outstanding code for the record's (email, purpose) and stores the record.
    async fn replace_code(&self, code: VerificationCode) -> StoreResult<()>;
    /// Removes an unconsumed code by id. Returns whether a row was removed.
    async fn discard_code(&self, id: &str) -> StoreResult<bool>;

    /// Stores a session for an existing user, atomically with the existence
    /// check. Fails with `UserNotFound` once the user has been deleted.
    async fn insert_session(&self, session: Session) -> StoreResult<()>;
    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;
    /// Marks a live session revoked. Returns false if it is unknown or already revoked.
    async fn revoke_session(&self, token_hash: &str) -> StoreResult<bool>;

    async fn apply(&self, mutation: AccountMutation, now: DateTime<Utc>) -> StoreResult<Option<User>>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeStats>;
}

/// Runs a store call under a deadline so a stalled backend surfaces as a transient failure.
pub async fn bounded<T>(
    limit: std::time::Duration,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout)?
}

// =============================================================================
// ERROR TYPES
// =============================================================================

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("verification code does not match")]
    Mismatch,

    #[error("verification code expired")]
    Expired,

    #[error("verification code already used")]
    AlreadyUsed,

    #[error("verification code locked after too many attempts")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Code(#[from] CodeError),

    #[error("email already registered")]
    EmailTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("storage call timed out")]
    Timeout,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("session revoked")]
    Revoked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure kinds surfaced by the account lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("invalid email format")]
    InvalidEmailFormat,

    #[error("email already registered")]
    EmailTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid credentials")]
    CredentialMismatch,

    #[error("verification failed: {0}")]
    CodeInvalid(CodeError),

    #[error("session not found")]
    SessionNotFound,

    #[error("verification code delivery failed: {0}")]
    DispatchFailed(String),

    #[error("storage temporarily unavailable")]
    StorageUnavailable,

    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl AccountError {
    /// Stable response code for transport. Every code-validation failure shares one code.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidParam(_) => 1001,
            Self::InvalidEmailFormat => 1002,
            Self::EmailTaken => 1003,
            Self::UserNotFound => 1004,
            Self::CredentialMismatch => 1005,
            Self::CodeInvalid(_) => 1006,
            Self::SessionNotFound => 1007,
            Self::DispatchFailed(_) => 1008,
            Self::StorageUnavailable => 1009,
            Self::InternalFailure(_) => 1010,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParam(_) => "invalid_param",
            Self::InvalidEmailFormat => "invalid_email_format",
            Self::EmailTaken => "email_taken",
            Self::UserNotFound => "user_not_found",
            Self::CredentialMismatch => "credential_mismatch",
            Self::CodeInvalid(_) => "code_invalid",
            Self::SessionNotFound => "session_not_found",
            Self::DispatchFailed(_) => "dispatch_failed",
            Self::StorageUnavailable => "storage_unavailable",
            Self::InternalFailure(_) => "internal_failure",
        }
    }

    /// Whether repeating the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DispatchFailed(_) | Self::StorageUnavailable)
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidParam(_) => StatusCode::BAD_REQUEST,
            Self::InvalidEmailFormat => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::CredentialMismatch => StatusCode::UNAUTHORIZED,
            Self::CodeInvalid(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound => StatusCode::UNAUTHORIZED,
            Self::DispatchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam(message.into())
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Code(code) => AccountError::CodeInvalid(code),
            StoreError::EmailTaken => AccountError::EmailTaken,
            StoreError::UserNotFound => AccountError::UserNotFound,
            StoreError::Timeout => AccountError::StorageUnavailable,
            StoreError::Backend(message) => AccountError::InternalFailure(message),
        }
    }
}

impl From<SessionError> for AccountError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::Expired | SessionError::Revoked => {
                AccountError::SessionNotFound
            }
            SessionError::Store(store) => store.into(),
        }
    }
}
