use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, Pool, Transaction};

use super::interface::{
    AccountMutation, AccountStore, CodeError, PurgeStats, StoreError, StoreResult, UserChange,
};
use super::model::{Purpose, Session, User, UserId, VerificationCode};

// =============================================================================
// ROW MAPPING
// =============================================================================

#[derive(Debug, FromRow)]
struct CodeRow {
    id: String,
    email: String,
    purpose: String,
    code_hash: String,
    attempts: u32,
    max_attempts: u32,
    consumed: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<CodeRow> for VerificationCode {
    type Error = StoreError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        let purpose: Purpose = row
            .purpose
            .parse()
            .map_err(|e: super::model::UnknownPurpose| StoreError::Backend(e.to_string()))?;

        Ok(VerificationCode {
            id: row.id,
            email: row.email,
            purpose,
            code_hash: row.code_hash,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            consumed: row.consumed,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// =============================================================================
// MYSQL STORE
// =============================================================================

/// MySQL-backed store. Compound writes run in one transaction with the touched
/// rows locked `FOR UPDATE`; a dropped transaction rolls back.
pub struct MySqlAccountStore {
    pool: Pool<MySql>,
}

impl MySqlAccountStore {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    async fn lock_code(
        tx: &mut Transaction<'_, MySql>,
        email: &str,
        purpose: Purpose,
    ) -> StoreResult<Option<VerificationCode>> {
        let row = sqlx::query_as::<_, CodeRow>(
            r#"
            SELECT id, email, purpose, code_hash, attempts, max_attempts, consumed, created_at, expires_at
            FROM verification_codes
            WHERE email = ? AND purpose = ?
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(email)
        .bind(purpose.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(VerificationCode::try_from).transpose()
    }

    async fn lock_user_by_id(tx: &mut Transaction<'_, MySql>, id: UserId) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn lock_user_by_email(tx: &mut Transaction<'_, MySql>, email: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? FOR UPDATE")
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?)
    }

    async fn apply_change(
        tx: &mut Transaction<'_, MySql>,
        change: UserChange,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let id = match change {
            UserChange::None => return Ok(None),
            UserChange::Create { email, password_hash } => {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO users (email, password_hash, verified, subscription_expires_at, created_at, updated_at)
                    VALUES (?, ?, TRUE, NULL, ?, ?)
                    "#,
                )
                .bind(&email)
                .bind(&password_hash)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await;

                match inserted {
                    Ok(done) => done.last_insert_id() as UserId,
                    Err(e) if is_unique_violation(&e) => return Err(StoreError::EmailTaken),
                    Err(e) => return Err(e.into()),
                }
            }
            UserChange::SetPassword { email, password_hash } => {
                let user = Self::lock_user_by_email(tx, &email)
                    .await?
                    .ok_or(StoreError::UserNotFound)?;
                sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                    .bind(&password_hash)
                    .bind(now)
                    .bind(user.id)
                    .execute(&mut **tx)
                    .await?;
                user.id
            }
            UserChange::ChangeEmail { old_email, new_email } => {
                if Self::lock_user_by_email(tx, &new_email).await?.is_some() {
                    return Err(StoreError::EmailTaken);
                }
                let user = Self::lock_user_by_email(tx, &old_email)
                    .await?
                    .ok_or(StoreError::UserNotFound)?;
                let updated = sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
                    .bind(&new_email)
                    .bind(now)
                    .bind(user.id)
                    .execute(&mut **tx)
                    .await;
                match updated {
                    Ok(_) => user.id,
                    Err(e) if is_unique_violation(&e) => return Err(StoreError::EmailTaken),
                    Err(e) => return Err(e.into()),
                }
            }
            UserChange::ExtendSubscription { id, period } => {
                let user = Self::lock_user_by_id(tx, id)
                    .await?
                    .ok_or(StoreError::UserNotFound)?;
                let base = user
                    .subscription_expires_at
                    .filter(|expires| *expires > now)
                    .unwrap_or(now);
                sqlx::query("UPDATE users SET subscription_expires_at = ?, updated_at = ? WHERE id = ?")
                    .bind(base + period)
                    .bind(now)
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                id
            }
            UserChange::Delete { id } => {
                let user = Self::lock_user_by_id(tx, id)
                    .await?
                    .ok_or(StoreError::UserNotFound)?;
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                sqlx::query("UPDATE sessions SET revoked = TRUE WHERE user_id = ?")
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                return Ok(Some(user));
            }
        };

        Self::lock_user_by_id(tx, id)
            .await?
            .map(Some)
            .ok_or_else(|| StoreError::Backend(format!("user {} vanished inside transaction", id)))
    }
}

#[async_trait]
impl AccountStore for MySqlAccountStore {
    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn replace_code(&self, code: VerificationCode) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM verification_codes WHERE email = ? AND purpose = ?")
            .bind(&code.email)
            .bind(code.purpose.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO verification_codes (id, email, purpose, code_hash, attempts, max_attempts, consumed, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code.id)
        .bind(&code.email)
        .bind(code.purpose.as_str())
        .bind(&code.code_hash)
        .bind(code.attempts)
        .bind(code.max_attempts)
        .bind(code.consumed)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn discard_code(&self, id: &str) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM verification_codes WHERE id = ? AND consumed = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // serializes against Delete, which holds the same row lock while revoking
        if Self::lock_user_by_id(&mut tx, session.user_id).await?.is_none() {
            return Err(StoreError::UserNotFound);
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at, revoked)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT token_hash, user_id, created_at, expires_at, revoked FROM sessions WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn revoke_session(&self, token_hash: &str) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE sessions SET revoked = TRUE WHERE token_hash = ? AND revoked = FALSE")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn apply(&self, mutation: AccountMutation, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;
        let mut claimed = Vec::with_capacity(mutation.claims.len());

        for claim in &mutation.claims {
            let row = Self::lock_code(&mut tx, &claim.email, claim.purpose)
                .await?
                .ok_or(CodeError::Mismatch)?;

            if let Err(err) = row.check(&claim.code_hash, now) {
                if err == CodeError::Mismatch {
                    sqlx::query("UPDATE verification_codes SET attempts = attempts + 1 WHERE id = ?")
                        .bind(&row.id)
                        .execute(&mut *tx)
                        .await?;
                    tx.commit().await?;
                }
                return Err(err.into());
            }
            claimed.push(row.id);
        }

        let user = Self::apply_change(&mut tx, mutation.change, now).await?;

        for id in &claimed {
            sqlx::query("UPDATE verification_codes SET consumed = TRUE WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeStats> {
        let codes = sqlx::query("DELETE FROM verification_codes WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let sessions = sqlx::query("DELETE FROM sessions WHERE revoked = TRUE OR expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(PurgeStats { codes, sessions })
    }
}
