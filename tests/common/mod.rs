use async_trait::async_trait;
use axum_test::TestServer;
use crm_accounts::config::{init_db, AccountConfig};
use crm_accounts::modules::account::model::{Purpose, UserProfile};
use crm_accounts::modules::account::{AccountService, MemoryAccountStore, MySqlAccountStore};
use crm_accounts::services::delivery::{CodeDelivery, DeliveryError};
use crm_accounts::services::hashing::CredentialManager;
use crm_accounts::services::metrics::MetricsRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Remembers the last code handed out per (email, purpose) instead of mailing it.
#[derive(Default)]
pub struct RecordingDelivery {
    codes: Mutex<HashMap<(String, Purpose), String>>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl RecordingDelivery {
    pub fn last_code(&self, email: &str, purpose: Purpose) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .get(&(email.to_string(), purpose))
            .cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CodeDelivery for RecordingDelivery {
    async fn dispatch(&self, email: &str, purpose: Purpose, code: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected(503));
        }
        self.codes
            .lock()
            .unwrap()
            .insert((email.to_string(), purpose), code.to_string());
        Ok(())
    }
}

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub server: TestServer,
    pub accounts: Arc<AccountService>,
    pub store: Arc<MemoryAccountStore>,
    pub delivery: Arc<RecordingDelivery>,
    pub metrics: Arc<MetricsRegistry>,
}

#[allow(dead_code)]
impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(AccountConfig::default()).await
    }

    pub async fn with_config(config: AccountConfig) -> Self {
        let store = Arc::new(MemoryAccountStore::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let metrics = MetricsRegistry::new().expect("Failed to create metrics registry");
        // cheap argon2 parameters keep the suite fast
        let credentials = CredentialManager::new(1024, 1, 1).expect("Invalid argon2 parameters");

        let accounts = Arc::new(AccountService::new(
            store.clone(),
            delivery.clone(),
            credentials,
            metrics.clone(),
            config,
        ));

        let app = crm_accounts::create_app(accounts.clone(), metrics.clone());
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            accounts,
            store,
            delivery,
            metrics,
        }
    }

    /// Requests a code through the service and returns what was delivered.
    pub async fn issue_code(&self, email: &str, purpose: Purpose) -> String {
        self.accounts
            .get_verify_code(email, purpose)
            .await
            .expect("Failed to issue verification code");
        self.delivery
            .last_code(&email.trim().to_lowercase(), purpose)
            .expect("No code was delivered")
    }

    pub async fn register(&self, email: &str, password: &str) -> UserProfile {
        let code = self.issue_code(email, Purpose::Register).await;
        self.accounts
            .register(email, password, &code)
            .await
            .expect("Failed to register test user")
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        self.accounts
            .login(email, password)
            .await
            .expect("Failed to log in test user")
            .token
    }

    /// Registers a fresh account and logs it in.
    pub async fn signed_in_user(&self) -> (UserProfile, String) {
        let email = test_email();
        let profile = self.register(&email, test_password()).await;
        let token = self.login(&email, test_password()).await;
        (profile, token)
    }
}

/// MySQL-backed store for the suites that exercise the production backend.
/// Returns `None` when `TEST_DATABASE_URL` is not set so those tests skip.
#[allow(dead_code)]
pub async fn mysql_store() -> Option<Arc<MySqlAccountStore>> {
    dotenvy::dotenv().ok();

    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping MySQL store test");
            return None;
        }
    };

    let pool = init_db(&database_url, std::time::Duration::from_secs(5))
        .await
        .expect("Failed to connect to test database");

    Some(Arc::new(MySqlAccountStore::new(pool)))
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4().simple())
}

// Helper to generate test password
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "TestPassword123!"
}
