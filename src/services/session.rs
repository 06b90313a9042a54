use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AccountConfig;
use crate::modules::account::interface::{bounded, AccountStore, SessionError};
use crate::modules::account::model::{Session, UserId};
use crate::services::tokens::{self, SESSION_TOKEN_LENGTH};

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Opaque bearer sessions. Tokens are handed out once and stored only as digests.
pub struct SessionStore {
    store: Arc<dyn AccountStore>,
    ttl: chrono::Duration,
    storage_timeout: Duration,
}

impl SessionStore {
    pub fn new(store: Arc<dyn AccountStore>, config: &AccountConfig) -> Self {
        Self {
            store,
            ttl: config.session_ttl(),
            storage_timeout: config.storage_timeout(),
        }
    }

    pub async fn create(&self, user_id: UserId) -> Result<IssuedSession, SessionError> {
        let token = tokens::opaque_token(SESSION_TOKEN_LENGTH);
        let now = Utc::now();
        let session = Session {
            token_hash: tokens::digest(&token),
            user_id,
            created_at: now,
            expires_at: now + self.ttl,
            revoked: false,
        };
        let expires_at = session.expires_at;

        bounded(self.storage_timeout, self.store.insert_session(session)).await?;

        Ok(IssuedSession { token, expires_at })
    }

    pub async fn validate(&self, token: &str) -> Result<UserId, SessionError> {
        let session = bounded(self.storage_timeout, self.store.find_session(&tokens::digest(token)))
            .await?
            .ok_or(SessionError::NotFound)?;
        session.status(Utc::now())
    }

    /// Unknown and already-revoked tokens both report `NotFound`.
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let revoked = bounded(self.storage_timeout, self.store.revoke_session(&tokens::digest(token))).await?;
        if revoked {
            Ok(())
        } else {
            Err(SessionError::NotFound)
        }
    }
}
