use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::interface::{CodeError, SessionError};

pub type UserId = i64;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub verified: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// VERIFICATION CODES
// =============================================================================

/// Workflow a verification code authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    Register,
    ForgotPassword,
    EmailChangeOld,
    EmailChangeNew,
}

impl Purpose {
    pub const ALL: [Purpose; 4] = [
        Purpose::Register,
        Purpose::ForgotPassword,
        Purpose::EmailChangeOld,
        Purpose::EmailChangeNew,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ForgotPassword => "forgot-password",
            Self::EmailChangeOld => "email-change-old",
            Self::EmailChangeNew => "email-change-new",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Register => "Confirm your registration",
            Self::ForgotPassword => "Reset your password",
            Self::EmailChangeOld => "Confirm your email change request",
            Self::EmailChangeNew => "Confirm your new email address",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verification purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl FromStr for Purpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Purpose::ALL
            .into_iter()
            .find(|purpose| purpose.as_str() == s)
            .ok_or_else(|| UnknownPurpose(s.to_string()))
    }
}

/// Stored form of a single-use code. Only the SHA-256 digest of the value is kept.
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub id: String,
    pub email: String,
    pub purpose: Purpose,
    pub code_hash: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn new(
        email: &str,
        purpose: Purpose,
        code_hash: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            purpose,
            code_hash,
            attempts: 0,
            max_attempts,
            consumed: false,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Decides whether `code_hash` redeems this row at `now`.
    ///
    /// An exhausted row rejects even the right value, and the value is compared
    /// before the consumed/expired state so a wrong guess learns nothing about it.
    /// Callers persist an attempt increment when this returns `Mismatch`.
    pub fn check(&self, code_hash: &str, now: DateTime<Utc>) -> Result<(), CodeError> {
        if self.attempts >= self.max_attempts {
            return Err(CodeError::Exhausted);
        }
        if self.code_hash != code_hash {
            return Err(CodeError::Mismatch);
        }
        if self.consumed {
            return Err(CodeError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(CodeError::Expired);
        }
        Ok(())
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub fn status(&self, now: DateTime<Utc>) -> Result<UserId, SessionError> {
        if self.revoked {
            return Err(SessionError::Revoked);
        }
        if now >= self.expires_at {
            return Err(SessionError::Expired);
        }
        Ok(self.user_id)
    }
}

// =============================================================================
// SNAPSHOTS RETURNED TO TRANSPORT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub verified: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            verified: user.verified,
            subscription_expires_at: user.subscription_expires_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}
