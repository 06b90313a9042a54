use std::sync::Arc;

use crm_accounts::config::{init_db, Config};
use crm_accounts::modules::account::{AccountService, AccountStore, MemoryAccountStore, MySqlAccountStore};
use crm_accounts::services::cleanup::spawn_cleanup;
use crm_accounts::services::delivery::{CodeDelivery, HttpMailDelivery, LogDelivery};
use crm_accounts::services::hashing::CredentialManager;
use crm_accounts::services::metrics::MetricsRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_accounts=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn AccountStore> = match &config.database_url {
        Some(url) => {
            let pool = init_db(url, config.accounts.storage_timeout()).await?;
            tracing::info!("Connected to MySQL");
            Arc::new(MySqlAccountStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts are kept in memory only");
            Arc::new(MemoryAccountStore::new())
        }
    };

    let delivery: Arc<dyn CodeDelivery> = match config.mail.clone() {
        Some(mail) => {
            tracing::info!(endpoint = %mail.endpoint, "Verification codes delivered via mail API");
            Arc::new(HttpMailDelivery::new(mail)?)
        }
        None => {
            tracing::warn!("MAIL_API_URL not set, verification codes are only logged");
            Arc::new(LogDelivery)
        }
    };

    let metrics = MetricsRegistry::new()?;
    let accounts = Arc::new(AccountService::new(
        store,
        delivery,
        CredentialManager::default(),
        metrics.clone(),
        config.accounts.clone(),
    ));

    spawn_cleanup(accounts.clone(), config.accounts.cleanup_interval());

    let app = crm_accounts::create_app(accounts, metrics);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
