//! API server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CLEMENTINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CLEMENTINE_BASE_URL` - Public URL for the API
//! - `CLEMENTINE_JWT_SECRET` - JWT signing secret (min 32 chars, high entropy)
//! - `CLEMENTINE_WEBHOOK_SECRET` - Payment webhook HMAC secret
//!
//! ## Optional
//! - `CLEMENTINE_HOST` - Bind address (default: 127.0.0.1)
//! - `CLEMENTINE_PORT` - Listen port (default: 4000)
//! - `CLEMENTINE_JWT_EXPIRY_HOURS` - Token lifetime (default: 24)
//! - `CLEMENTINE_UPLOAD_DIR` - Product image directory (default: uploads)
//! - `CLEMENTINE_CORS_ORIGIN` - Allowed browser origin for the SPA
//! - `CLEMENTINE_ADMIN_EMAIL` / `CLEMENTINE_ADMIN_PASSWORD` - Bootstrap admin
//!   seeded on first login
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Google OAuth login
//! - `PAYMENT_GATEWAY_URL` / `PAYMENT_GATEWAY_SECRET_KEY` - External card gateway;
//!   when unset, card payments use the simulated processor
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use clementine_core::Email;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the API (OAuth redirects)
    pub base_url: String,
    /// JWT signing secret
    pub jwt_secret: SecretString,
    /// JWT lifetime in hours
    pub jwt_expiry_hours: i64,
    /// Directory where product images are written and served from
    pub upload_dir: PathBuf,
    /// Allowed browser origin for CORS (SPA host)
    pub cors_origin: Option<String>,
    /// Admin account seeded on first login
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// Google OAuth login
    pub google: Option<GoogleConfig>,
    /// Payment gateway adapter
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Bootstrap admin credentials.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: Email,
    pub password: SecretString,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Google OAuth client configuration.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Payment gateway configuration.
///
/// The external gateway is optional; without it every payment method runs
/// through the simulated processor.
#[derive(Clone)]
pub struct PaymentConfig {
    pub gateway_url: Option<String>,
    pub secret_key: Option<SecretString>,
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("gateway_url", &self.gateway_url)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("CLEMENTINE_DATABASE_URL")?;
        let host = get_env_or_default("CLEMENTINE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CLEMENTINE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CLEMENTINE_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CLEMENTINE_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("CLEMENTINE_BASE_URL")?;
        let jwt_secret = get_validated_secret("CLEMENTINE_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "CLEMENTINE_JWT_SECRET")?;
        let jwt_expiry_hours = get_env_or_default("CLEMENTINE_JWT_EXPIRY_HOURS", "24")
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CLEMENTINE_JWT_EXPIRY_HOURS".to_string(), e.to_string())
            })?;
        let upload_dir = PathBuf::from(get_env_or_default("CLEMENTINE_UPLOAD_DIR", "uploads"));
        let cors_origin = get_optional_env("CLEMENTINE_CORS_ORIGIN");

        let bootstrap_admin = BootstrapAdmin::from_env()?;
        let google = GoogleConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            jwt_secret,
            jwt_expiry_hours,
            upload_dir,
            cors_origin,
            bootstrap_admin,
            google,
            payment,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BootstrapAdmin {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(email) = get_optional_env("CLEMENTINE_ADMIN_EMAIL") else {
            return Ok(None);
        };
        let email = Email::parse(&email).map_err(|e| {
            ConfigError::InvalidEnvVar("CLEMENTINE_ADMIN_EMAIL".to_string(), e.to_string())
        })?;
        let password = get_required_env("CLEMENTINE_ADMIN_PASSWORD")?;
        Ok(Some(Self {
            email,
            password: SecretString::from(password),
        }))
    }
}

impl GoogleConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = get_optional_env("GOOGLE_CLIENT_ID") else {
            return Ok(None);
        };
        let client_secret = get_required_env("GOOGLE_CLIENT_SECRET")?;
        Ok(Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
        }))
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let gateway_url = get_optional_env("PAYMENT_GATEWAY_URL");
        let secret_key = if gateway_url.is_some() {
            Some(SecretString::from(get_required_env(
                "PAYMENT_GATEWAY_SECRET_KEY",
            )?))
        } else {
            None
        };
        let webhook_secret = get_validated_secret("CLEMENTINE_WEBHOOK_SECRET")?;

        Ok(Self {
            gateway_url,
            secret_key,
            webhook_secret,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
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
