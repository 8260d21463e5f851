//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `SHOPIFY_ENCRYPTION_KEY` - base64-encoded 32-byte key used to encrypt
//!   stored Shopify access tokens
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 127.0.0.1)
//! - `APP_PORT` - Listen port (default: 8000)
//! - `SHOPIFY_API_VERSION` - Admin REST API version (default: 2023-10)
//! - `SHOPIFY_SYNC_ENABLED` - Run the background order sync (default: true)
//! - `SHOPIFY_SYNC_INTERVAL_SECS` - Pause after a finished sync (default: 600)
//! - `SHOPIFY_SYNC_RETRY_SECS` - Pause after a failed sync (default: 60)
//! - `RECURRING_TASKS_INTERVAL_SECS` - Recurring task tick (default: 60)
//! - `CORS_ALLOWED_ORIGINS` - Comma separated list of browser origins
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_SHOPIFY_API_VERSION: &str = "2023-10";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Key for encrypting Shopify access tokens at rest
    pub encryption_key: SecretString,
    /// Shopify API and background sync settings
    pub shopify: ShopifySettings,
    /// Tick of the recurring task spawner
    pub recurring_interval: Duration,
    /// Browser origins allowed by CORS; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Shopify API and order sync settings.
///
/// Store credentials are not here: they are entered by an administrator and
/// kept (encrypted) in the database.
#[derive(Debug, Clone)]
pub struct ShopifySettings {
    /// Admin REST API version (e.g., 2023-10)
    pub api_version: String,
    /// Whether the background poller runs
    pub sync_enabled: bool,
    /// Pause after a successful (or skipped) sync
    pub sync_interval: Duration,
    /// Pause after a failed sync
    pub sync_retry: Duration,
}

impl Default for ShopifySettings {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_SHOPIFY_API_VERSION.to_string(),
            sync_enabled: true,
            sync_interval: Duration::from_secs(600),
            sync_retry: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("APP_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("APP_PORT", "8000")?;
        let encryption_key = get_validated_secret("SHOPIFY_ENCRYPTION_KEY")?;

        let shopify = ShopifySettings {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_SHOPIFY_API_VERSION),
            sync_enabled: parse_bool("SHOPIFY_SYNC_ENABLED", true)?,
            sync_interval: get_secs("SHOPIFY_SYNC_INTERVAL_SECS", 600)?,
            sync_retry: get_secs("SHOPIFY_SYNC_RETRY_SECS", 60)?,
        };
        let recurring_interval = get_secs("RECURRING_TASKS_INTERVAL_SECS", 60)?;
        let cors_allowed_origins = split_list(&get_env_or_default("CORS_ALLOWED_ORIGINS", ""));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            encryption_key,
            shopify,
            recurring_interval,
            cors_allowed_origins,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_env_or_default(key, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| parse_bool_value(key, &raw))
}

fn parse_bool_value(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Split a comma separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-key-here", "SHOPIFY_ENCRYPTION_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"A".repeat(44), "SHOPIFY_ENCRYPTION_KEY");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_base64_key() {
        let result = validate_secret_strength(
            "q5Zt0Vd9Kc3mRj8LwP2bN7sHf4GyE1uXoA6iTkBvM0Q=",
            "SHOPIFY_ENCRYPTION_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_bool_value() {
        assert!(parse_bool_value("X", "TRUE").unwrap());
        assert!(parse_bool_value("X", "1").unwrap());
        assert!(!parse_bool_value("X", "off").unwrap());
        assert!(matches!(
            parse_bool_value("X", "maybe"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" https://a.test, ,https://b.test "),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_shopify_settings_defaults() {
        let settings = ShopifySettings::default();
        assert_eq!(settings.api_version, "2023-10");
        assert_eq!(settings.sync_interval, Duration::from_secs(600));
        assert_eq!(settings.sync_retry, Duration::from_secs(60));
        assert!(settings.sync_enabled);
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            encryption_key: SecretString::from("k"),
            shopify: ShopifySettings::default(),
            recurring_interval: Duration::from_secs(60),
            cors_allowed_origins: Vec::new(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = AppConfig {
            database_url: SecretString::from("postgres://user:hunter2@db/app"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            encryption_key: SecretString::from("super-private-key-material"),
            shopify: ShopifySettings::default(),
            recurring_interval: Duration::from_secs(60),
            cors_allowed_origins: Vec::new(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("super-private-key-material"));
    }
}
