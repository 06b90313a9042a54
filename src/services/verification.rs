use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AccountConfig;
use crate::modules::account::interface::{
    bounded, AccountError, AccountMutation, AccountStore, CodeClaim, Result, UserChange,
};
use crate::modules::account::model::{Purpose, VerificationCode};
use crate::services::delivery::{CodeDelivery, DeliveryError};
use crate::services::tokens::{self, CODE_LENGTH};

/// Issues and redeems single-use codes scoped to (email, purpose).
pub struct VerificationCodeStore {
    store: Arc<dyn AccountStore>,
    delivery: Arc<dyn CodeDelivery>,
    ttl: chrono::Duration,
    max_attempts: u32,
    dispatch_timeout: Duration,
    storage_timeout: Duration,
}

impl VerificationCodeStore {
    pub fn new(store: Arc<dyn AccountStore>, delivery: Arc<dyn CodeDelivery>, config: &AccountConfig) -> Self {
        Self {
            store,
            delivery,
            ttl: config.code_ttl(),
            max_attempts: config.code_max_attempts,
            dispatch_timeout: config.dispatch_timeout(),
            storage_timeout: config.storage_timeout(),
        }
    }

    /// Replaces any outstanding code for the pair and hands the new one to delivery.
    ///
    /// If delivery fails the stored row is discarded again, so no code exists
    /// that its owner never received. The code it replaced is not restored:
    /// after a failed issue the pair has no outstanding code at all.
    pub async fn issue(&self, email: &str, purpose: Purpose) -> Result<String> {
        let code = tokens::numeric_code(CODE_LENGTH);
        let now = Utc::now();
        let record = VerificationCode::new(
            email,
            purpose,
            tokens::digest(&code),
            now,
            now + self.ttl,
            self.max_attempts,
        );
        let id = record.id.clone();

        bounded(self.storage_timeout, self.store.replace_code(record)).await?;

        let dispatched = tokio::time::timeout(
            self.dispatch_timeout,
            self.delivery.dispatch(email, purpose, &code),
        )
        .await
        .unwrap_or(Err(DeliveryError::Timeout));

        if let Err(e) = dispatched {
            tracing::warn!(%email, %purpose, error = %e, "verification code dispatch failed");
            if let Err(rollback) = bounded(self.storage_timeout, self.store.discard_code(&id)).await {
                tracing::error!(%email, %purpose, error = %rollback, "failed to discard undelivered code");
                return Err(rollback.into());
            }
            return Err(AccountError::DispatchFailed(e.to_string()));
        }

        tracing::info!(%email, %purpose, "verification code issued");
        Ok(code)
    }

    pub fn claim(email: &str, purpose: Purpose, code: &str) -> CodeClaim {
        CodeClaim {
            email: email.to_string(),
            purpose,
            code_hash: tokens::digest(code.trim()),
        }
    }

    /// Consumes the code if it is the outstanding, unexpired one for the pair.
    /// Of any number of concurrent calls with the same code at most one succeeds.
    pub async fn validate(&self, email: &str, purpose: Purpose, code: &str) -> Result<()> {
        let mutation = AccountMutation::new(UserChange::None).claim(Self::claim(email, purpose, code));
        bounded(self.storage_timeout, self.store.apply(mutation, Utc::now())).await?;
        Ok(())
    }
}
