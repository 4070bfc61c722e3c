//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PORTAL_BACKEND_URL` - Base URL of the hosted backend service
//! - `PORTAL_BACKEND_ANON_KEY` - Backend publishable (anon) API key
//! - `PORTAL_BASE_URL` - Public URL the payment gateway redirects back to
//! - `GATEWAY_PUBLIC_KEY` - Payment gateway public key (safe to transmit)
//! - `GATEWAY_ACCESS_TOKEN` - Payment gateway secret token (server-side
//!   credential, forwarded only to the payment-session function)
//!
//! ## Optional
//! - `PORTAL_CART_FILE` - Path of the persisted cart file
//!   (default: `portal_sete_cart.json`)

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Hosted backend service connection settings
    pub backend: BackendConfig,
    /// Payment gateway credentials
    pub gateway: GatewayConfig,
    /// Public base URL used to derive the gateway's return URLs
    pub base_url: String,
    /// Path of the durable local cart file
    pub cart_file: PathBuf,
}

/// Hosted backend service configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://abcdefgh.backend.example`
    pub base_url: String,
    /// Publishable API key sent with every request
    pub anon_key: String,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the secret token.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Public key (safe to expose in the client)
    pub public_key: String,
    /// Secret access token, consumed only by the backend's payment function
    pub access_token: SecretString,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("public_key", &self.public_key)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the gateway token fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig {
            base_url: get_required_env("PORTAL_BACKEND_URL").map(|u| normalize_base_url(&u))?,
            anon_key: get_required_env("PORTAL_BACKEND_ANON_KEY")?,
        };
        let gateway = GatewayConfig {
            public_key: get_required_env("GATEWAY_PUBLIC_KEY")?,
            access_token: get_validated_secret("GATEWAY_ACCESS_TOKEN")?,
        };
        let base_url = get_required_env("PORTAL_BASE_URL")?;
        let cart_file = get_env_or_default("PORTAL_CART_FILE", "portal_sete_cart.json").into();

        Ok(Self {
            backend,
            gateway,
            base_url,
            cart_file,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Strip a trailing slash so joined paths never double up.
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
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
            #[allow(clippy::cast_precision_loss)]
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the real gateway credential."
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
