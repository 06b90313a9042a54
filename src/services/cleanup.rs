use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::modules::account::AccountService;

/// Periodically drops expired verification codes and dead sessions.
/// A zero period is raised to one millisecond.
pub fn spawn_cleanup(accounts: Arc<AccountService>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match accounts.purge_expired().await {
                Ok(stats) if stats.codes > 0 || stats.sessions > 0 => {
                    tracing::debug!(codes = stats.codes, sessions = stats.sessions, "purged expired records");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "expired record purge failed"),
            }
        }
    })
}
