use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::interface::{
    AccountMutation, AccountStore, CodeError, PurgeStats, StoreError, StoreResult, UserChange,
};
use super::model::{Purpose, Session, User, UserId, VerificationCode};

#[derive(Default)]
struct Tables {
    last_user_id: UserId,
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    codes: HashMap<(String, Purpose), VerificationCode>,
    sessions: HashMap<String, Session>,
}

/// In-process store. One lock guards all three tables and no `.await` happens
/// while it is held, so every call is atomic and cancellation-safe.
#[derive(Default)]
pub struct MemoryAccountStore {
    tables: Mutex<Tables>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn replace_code(&self, code: VerificationCode) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.codes.insert((code.email.clone(), code.purpose), code);
        Ok(())
    }

    async fn discard_code(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.codes.len();
        tables.codes.retain(|_, code| code.id != id || code.consumed);
        Ok(tables.codes.len() < before)
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        // a Delete that got the lock first has already revoked this user's sessions
        if !tables.users.contains_key(&session.user_id) {
            return Err(StoreError::UserNotFound);
        }
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Backend("duplicate session token".to_string()));
        }
        tables.sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.get(token_hash).cloned())
    }

    async fn revoke_session(&self, token_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.sessions.get_mut(token_hash) {
            Some(session) if !session.revoked => {
                session.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply(&self, mutation: AccountMutation, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        for claim in &mutation.claims {
            let row = tables
                .codes
                .get_mut(&(claim.email.clone(), claim.purpose))
                .ok_or(CodeError::Mismatch)?;
            if let Err(err) = row.check(&claim.code_hash, now) {
                if err == CodeError::Mismatch {
                    row.attempts += 1;
                }
                return Err(err.into());
            }
        }

        let user = tables.apply_change(mutation.change, now)?;

        for claim in &mutation.claims {
            if let Some(row) = tables.codes.get_mut(&(claim.email.clone(), claim.purpose)) {
                row.consumed = true;
            }
        }

        Ok(user)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeStats> {
        let mut tables = self.tables.lock().await;
        let codes_before = tables.codes.len();
        tables.codes.retain(|_, code| !code.is_expired(now));
        let sessions_before = tables.sessions.len();
        tables
            .sessions
            .retain(|_, session| !session.revoked && session.expires_at > now);

        Ok(PurgeStats {
            codes: (codes_before - tables.codes.len()) as u64,
            sessions: (sessions_before - tables.sessions.len()) as u64,
        })
    }
}

impl Tables {
    fn apply_change(&mut self, change: UserChange, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        match change {
            UserChange::None => Ok(None),
            UserChange::Create { email, password_hash } => {
                if self.emails.contains_key(&email) {
                    return Err(StoreError::EmailTaken);
                }
                self.last_user_id += 1;
                let user = User {
                    id: self.last_user_id,
                    email: email.clone(),
                    password_hash,
                    verified: true,
                    subscription_expires_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.emails.insert(email, user.id);
                self.users.insert(user.id, user.clone());
                Ok(Some(user))
            }
            UserChange::SetPassword { email, password_hash } => {
                let user = self.user_by_email_mut(&email)?;
                user.password_hash = password_hash;
                user.updated_at = now;
                Ok(Some(user.clone()))
            }
            UserChange::ChangeEmail { old_email, new_email } => {
                if self.emails.contains_key(&new_email) {
                    return Err(StoreError::EmailTaken);
                }
                let id = *self.emails.get(&old_email).ok_or(StoreError::UserNotFound)?;
                let user = self.users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
                user.email = new_email.clone();
                user.updated_at = now;
                let snapshot = user.clone();
                self.emails.remove(&old_email);
                self.emails.insert(new_email, id);
                Ok(Some(snapshot))
            }
            UserChange::ExtendSubscription { id, period } => {
                let user = self.users.get_mut(&id).ok_or(StoreError::UserNotFound)?;
                let base = user
                    .subscription_expires_at
                    .filter(|expires| *expires > now)
                    .unwrap_or(now);
                user.subscription_expires_at = Some(base + period);
                user.updated_at = now;
                Ok(Some(user.clone()))
            }
            UserChange::Delete { id } => {
                let user = self.users.remove(&id).ok_or(StoreError::UserNotFound)?;
                self.emails.remove(&user.email);
                for session in self.sessions.values_mut().filter(|s| s.user_id == id) {
                    session.revoked = true;
                }
                Ok(Some(user))
            }
        }
    }

    fn user_by_email_mut(&mut self, email: &str) -> StoreResult<&mut User> {
        let id = self.emails.get(email).ok_or(StoreError::UserNotFound)?;
        self.users.get_mut(id).ok_or(StoreError::UserNotFound)
    }
}
