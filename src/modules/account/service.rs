//! Account and session lifecycle.
//!
//! Every operation validates its inputs after they have been decoded, then
//! coordinates the code store, credential manager and session store. Writes
//! that depend on verification codes go through a single [`AccountStore::apply`]
//! so a code is never consumed without its effect, nor the effect applied
//! without its codes.

use chrono::Utc;
use std::sync::Arc;

use super::interface::{
    bounded, AccountError, AccountMutation, AccountStore, PurgeStats, Result, UserChange,
};
use super::model::{LoginOutcome, Purpose, SubscriptionInfo, User, UserId, UserProfile};
use crate::config::AccountConfig;
use crate::services::delivery::CodeDelivery;
use crate::services::hashing::CredentialManager;
use crate::services::metrics::MetricsRegistry;
use crate::services::session::SessionStore;
use crate::services::validation::{is_valid_email, normalize_email};
use crate::services::verification::VerificationCodeStore;

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    codes: VerificationCodeStore,
    sessions: SessionStore,
    credentials: CredentialManager,
    metrics: Arc<MetricsRegistry>,
    config: AccountConfig,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        delivery: Arc<dyn CodeDelivery>,
        credentials: CredentialManager,
        metrics: Arc<MetricsRegistry>,
        config: AccountConfig,
    ) -> Self {
        Self {
            codes: VerificationCodeStore::new(store.clone(), delivery, &config),
            sessions: SessionStore::new(store.clone(), &config),
            store,
            credentials,
            metrics,
            config,
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    pub async fn register(&self, email: &str, password: &str, code: &str) -> Result<UserProfile> {
        let result = self.register_inner(email, password, code).await;
        self.observe("register", result)
    }

    pub async fn get_verify_code(&self, email: &str, purpose: Purpose) -> Result<()> {
        let result = self.get_verify_code_inner(email, purpose).await;
        self.observe("get_verify_code", result)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let result = self.login_inner(email, password).await;
        self.observe("login", result)
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        let result = self.logout_inner(token).await;
        self.observe("logout", result)
    }

    pub async fn forgot_pass(&self, email: &str, new_password: &str, code: &str) -> Result<()> {
        let result = self.forgot_pass_inner(email, new_password, code).await;
        self.observe("forgot_pass", result)
    }

    pub async fn update_mail(
        &self,
        old_email: &str,
        new_email: &str,
        old_code: &str,
        new_code: &str,
    ) -> Result<UserProfile> {
        let result = self
            .update_mail_inner(old_email, new_email, old_code, new_code)
            .await;
        self.observe("update_mail", result)
    }

    /// Removes the account and revokes all of its sessions in one step.
    pub async fn delete(&self, uid: UserId) -> Result<()> {
        let result = self.delete_inner(uid).await;
        self.observe("delete", result)
    }

    pub async fn get_info(&self, uid: UserId) -> Result<UserProfile> {
        let result = self.get_info_inner(uid).await;
        self.observe("get_info", result)
    }

    pub async fn buy(&self, uid: UserId) -> Result<SubscriptionInfo> {
        let result = self.buy_inner(uid).await;
        self.observe("buy", result)
    }

    /// Resolves a bearer token to the uid it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<UserId> {
        let token = require(token, "token")?;
        Ok(self.sessions.validate(token).await?)
    }

    pub async fn purge_expired(&self) -> Result<PurgeStats> {
        Ok(bounded(self.config.storage_timeout(), self.store.purge_expired(Utc::now())).await?)
    }

    // =========================================================================
    // WORKFLOWS
    // =========================================================================

    async fn register_inner(&self, email: &str, password: &str, code: &str) -> Result<UserProfile> {
        let email = require_email(email)?;
        let password = require_password(password)?;
        let code = require(code, "code")?;

        // cheap rejection before hashing; the store re-checks inside the transaction
        if self.find_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let mutation = AccountMutation::new(UserChange::Create {
            email: email.clone(),
            password_hash,
        })
        .claim(VerificationCodeStore::claim(&email, Purpose::Register, code));

        let user = self.apply(mutation).await?;
        tracing::info!(uid = user.id, %email, "account registered");
        Ok(UserProfile::from(&user))
    }

    async fn get_verify_code_inner(&self, email: &str, purpose: Purpose) -> Result<()> {
        let email = require_email(email)?;
        self.codes.issue(&email, purpose).await?;
        self.metrics
            .codes_issued_total
            .with_label_values(&[purpose.as_str()])
            .inc();
        Ok(())
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = require_email(email)?;
        let password = require_password(password)?;

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::warn!(uid = user.id, %email, "login rejected: credential mismatch");
            return Err(AccountError::CredentialMismatch);
        }

        let session = self.sessions.create(user.id).await?;
        tracing::info!(uid = user.id, %email, "session created");
        Ok(LoginOutcome {
            token: session.token,
            expires_at: session.expires_at,
            profile: UserProfile::from(&user),
        })
    }

    async fn logout_inner(&self, token: &str) -> Result<()> {
        let token = require(token, "token")?;
        self.sessions.revoke(token).await?;
        tracing::info!("session revoked");
        Ok(())
    }

    async fn forgot_pass_inner(&self, email: &str, new_password: &str, code: &str) -> Result<()> {
        let email = require_email(email)?;
        let new_password = require_password(new_password)?;
        let code = require(code, "code")?;

        let password_hash = self.hash_password(new_password).await?;
        let mutation = AccountMutation::new(UserChange::SetPassword {
            email: email.clone(),
            password_hash,
        })
        .claim(VerificationCodeStore::claim(&email, Purpose::ForgotPassword, code));

        let user = self.apply(mutation).await?;
        tracing::info!(uid = user.id, %email, "password reset");
        Ok(())
    }

    async fn update_mail_inner(
        &self,
        old_email: &str,
        new_email: &str,
        old_code: &str,
        new_code: &str,
    ) -> Result<UserProfile> {
        let old_email = require_email(old_email)?;
        let new_email = require_email(new_email)?;
        let old_code = require(old_code, "old code")?;
        let new_code = require(new_code, "new code")?;

        if old_email == new_email {
            return Err(AccountError::invalid_param("new email must differ from the current one"));
        }

        let mutation = AccountMutation::new(UserChange::ChangeEmail {
            old_email: old_email.clone(),
            new_email: new_email.clone(),
        })
        .claim(VerificationCodeStore::claim(&old_email, Purpose::EmailChangeOld, old_code))
        .claim(VerificationCodeStore::claim(&new_email, Purpose::EmailChangeNew, new_code));

        let user = self.apply(mutation).await?;
        tracing::info!(uid = user.id, from = %old_email, to = %new_email, "email changed");
        Ok(UserProfile::from(&user))
    }

    async fn delete_inner(&self, uid: UserId) -> Result<()> {
        require_uid(uid)?;
        let user = self
            .apply(AccountMutation::new(UserChange::Delete { id: uid }))
            .await?;
        tracing::info!(uid, email = %user.email, "account deleted");
        Ok(())
    }

    async fn get_info_inner(&self, uid: UserId) -> Result<UserProfile> {
        require_uid(uid)?;
        let user = bounded(self.config.storage_timeout(), self.store.find_user_by_id(uid))
            .await?
            .ok_or(AccountError::UserNotFound)?;
        Ok(UserProfile::from(&user))
    }

    async fn buy_inner(&self, uid: UserId) -> Result<SubscriptionInfo> {
        require_uid(uid)?;
        let user = self
            .apply(AccountMutation::new(UserChange::ExtendSubscription {
                id: uid,
                period: self.config.subscription_period(),
            }))
            .await?;
        let expires_at = user
            .subscription_expires_at
            .ok_or_else(|| AccountError::InternalFailure("subscription expiry not recorded".into()))?;
        tracing::info!(uid, %expires_at, "subscription extended");
        Ok(SubscriptionInfo {
            user_id: uid,
            expires_at,
        })
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(bounded(self.config.storage_timeout(), self.store.find_user_by_email(email)).await?)
    }

    async fn apply(&self, mutation: AccountMutation) -> Result<User> {
        bounded(self.config.storage_timeout(), self.store.apply(mutation, Utc::now()))
            .await?
            .ok_or_else(|| AccountError::InternalFailure("mutation returned no user".into()))
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let credentials = self.credentials.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AccountError::InternalFailure(e.to_string()))?
            .map_err(|e| AccountError::InternalFailure(e.to_string()))
    }

    async fn verify_password(&self, password: &str, credential: &str) -> Result<bool> {
        let credentials = self.credentials.clone();
        let password = password.to_owned();
        let credential = credential.to_owned();
        tokio::task::spawn_blocking(move || credentials.verify(&password, &credential))
            .await
            .map_err(|e| AccountError::InternalFailure(e.to_string()))?
            .map_err(|e| AccountError::InternalFailure(e.to_string()))
    }

    fn observe<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.metrics.record_operation(operation, "ok"),
            Err(e) => {
                self.metrics.record_operation(operation, e.kind());
                match e {
                    AccountError::InternalFailure(message) => {
                        tracing::error!(operation, error = %message, "account operation failed");
                    }
                    e if e.is_transient() => {
                        tracing::warn!(operation, error = %e, "account operation failed transiently");
                    }
                    e => {
                        tracing::debug!(operation, error = %e, "account operation rejected");
                    }
                }
            }
        }
        result
    }
}

fn require<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AccountError::invalid_param(format!("{} is required", field)));
    }
    Ok(value)
}

fn require_password(password: &str) -> Result<&str> {
    if password.is_empty() {
        return Err(AccountError::invalid_param("password is required"));
    }
    Ok(password)
}

fn require_email(raw: &str) -> Result<String> {
    let email = normalize_email(require(raw, "email")?);
    if !is_valid_email(&email) {
        return Err(AccountError::InvalidEmailFormat);
    }
    Ok(email)
}

fn require_uid(uid: UserId) -> Result<()> {
    if uid <= 0 {
        return Err(AccountError::invalid_param("uid must be positive"));
    }
    Ok(())
}
