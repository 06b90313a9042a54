use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::delivery::MailApiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set when MAIL_API_URL is set")]
    Missing(&'static str),
}

/// Tunables of the account lifecycle engine.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub code_ttl_secs: i64,
    pub code_max_attempts: u32,
    pub session_ttl_secs: i64,
    pub subscription_period_days: i64,
    pub dispatch_timeout_secs: u64,
    pub storage_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 600,            // 10 minutes
            code_max_attempts: 5,
            session_ttl_secs: 7 * 86400,   // 7 days
            subscription_period_days: 30,
            dispatch_timeout_secs: 10,
            storage_timeout_secs: 5,
            cleanup_interval_secs: 300,
        }
    }
}

impl AccountConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            code_ttl_secs: parse_positive_or("CODE_TTL_SECS", defaults.code_ttl_secs)?,
            code_max_attempts: parse_positive_or("CODE_MAX_ATTEMPTS", defaults.code_max_attempts)?,
            session_ttl_secs: parse_positive_or("SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            subscription_period_days: parse_positive_or("SUBSCRIPTION_PERIOD_DAYS", defaults.subscription_period_days)?,
            dispatch_timeout_secs: parse_positive_or("DISPATCH_TIMEOUT_SECS", defaults.dispatch_timeout_secs)?,
            storage_timeout_secs: parse_positive_or("STORAGE_TIMEOUT_SECS", defaults.storage_timeout_secs)?,
            cleanup_interval_secs: parse_positive_or("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs)?,
        })
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.code_ttl_secs)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs)
    }

    pub fn subscription_period(&self) -> chrono::Duration {
        chrono::Duration::days(self.subscription_period_days)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Environment configuration
/// Loads and validates environment variables
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub mail: Option<MailApiConfig>,
    pub accounts: AccountConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let accounts = AccountConfig::from_env()?;

        let mail = match env::var("MAIL_API_URL") {
            Ok(endpoint) if !endpoint.is_empty() => Some(MailApiConfig {
                endpoint,
                api_key: env::var("MAIL_API_KEY").map_err(|_| ConfigError::Missing("MAIL_API_KEY"))?,
                from_address: env::var("MAIL_FROM").map_err(|_| ConfigError::Missing("MAIL_FROM"))?,
                timeout: accounts.dispatch_timeout(),
                code_ttl_minutes: accounts.code_ttl().num_minutes(),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            mail,
            accounts,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_or`], but zero and negative values are invalid.
fn parse_positive_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let value = parse_or(key, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: env::var(key).unwrap_or_default(),
        });
    }
    Ok(value)
}
