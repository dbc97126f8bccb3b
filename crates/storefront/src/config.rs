//! Charge Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_STOREFRONT_PRIVATE_TOKEN` - Storefront API private access token
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` - API version (default: 2025-01)
//! - `CHARGECART_STATE_DIR` - Directory holding the persisted cart (default: .chargecart)
//! - `CHARGECART_REMOTE_TIMEOUT_SECS` - Timeout for each Shopify call (default: 8)
//! - `CHARGECART_CATALOG_TTL_SECS` - Bundle catalog freshness window (default: 300)
//! - `CHARGECART_FREE_ACCESSORY_HANDLE` - Product given away with the family pack (default: wall-charger)
//! - `ANALYTICS_ENDPOINT` - Analytics ingestion URL; events are only logged when unset
//! - `ANALYTICS_API_KEY` - API key for the analytics endpoint (required with the endpoint)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_VERSION: &str = "2025-01";
const DEFAULT_STATE_DIR: &str = ".chargecart";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 8;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const DEFAULT_FREE_ACCESSORY_HANDLE: &str = "wall-charger";
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

/// Charge Cart configuration.
#[derive(Debug, Clone)]
pub struct ChargeCartConfig {
    /// Shopify Storefront API configuration
    pub shopify: ShopifyStorefrontConfig,
    /// Cart store and catalog settings
    pub cart: CartSettings,
    /// Analytics sink configuration, `None` when events are only logged
    pub analytics: Option<AnalyticsConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Shopify Storefront API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyStorefrontConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2025-01)
    pub api_version: String,
    /// Storefront API private access token (server-side only)
    pub storefront_private_token: SecretString,
}

impl std::fmt::Debug for ShopifyStorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyStorefrontConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("storefront_private_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyStorefrontConfig {
    /// GraphQL endpoint for the configured store and API version.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "https://{}/api/{}/graphql.json",
            self.store, self.api_version
        )
    }
}

/// Cart store and bundle catalog settings.
#[derive(Debug, Clone)]
pub struct CartSettings {
    /// Directory holding `shopify-cart.json`
    pub state_dir: PathBuf,
    /// Upper bound for each remote call
    pub remote_timeout: Duration,
    /// How long resolved bundle options are served without a refresh
    pub catalog_ttl: Duration,
    /// Handle of the accessory given away with the family pack
    pub free_accessory_handle: String,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            free_accessory_handle: DEFAULT_FREE_ACCESSORY_HANDLE.to_string(),
        }
    }
}

/// Analytics ingestion configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AnalyticsConfig {
    /// Ingestion endpoint
    pub endpoint: Url,
    /// API key sent with every event
    pub api_key: SecretString,
}

impl std::fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ChargeCartConfig {
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

        Self::from_vars(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit variable map.
    ///
    /// # Errors
    ///
    /// Same as [`ChargeCartConfig::from_env`].
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_vars(&|key| vars.get(key).cloned())
    }

    fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            shopify: ShopifyStorefrontConfig::from_vars(vars)?,
            cart: CartSettings::from_vars(vars)?,
            analytics: AnalyticsConfig::from_vars(vars)?,
            sentry_dsn: vars("SENTRY_DSN").filter(|v| !v.is_empty()),
            sentry_environment: vars("SENTRY_ENVIRONMENT").filter(|v| !v.is_empty()),
        })
    }
}

impl ShopifyStorefrontConfig {
    fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            store: get_required_env(vars, "SHOPIFY_STORE")?,
            api_version: get_env_or_default(vars, "SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            storefront_private_token: get_validated_secret(
                vars,
                "SHOPIFY_STOREFRONT_PRIVATE_TOKEN",
            )?,
        };

        Url::parse(&config.endpoint())
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPIFY_STORE".to_string(), e.to_string()))?;

        Ok(config)
    }
}

impl CartSettings {
    fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let remote_timeout = get_seconds(
            vars,
            "CHARGECART_REMOTE_TIMEOUT_SECS",
            DEFAULT_REMOTE_TIMEOUT_SECS,
        )?;
        if remote_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "CHARGECART_REMOTE_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            state_dir: PathBuf::from(get_env_or_default(
                vars,
                "CHARGECART_STATE_DIR",
                DEFAULT_STATE_DIR,
            )),
            remote_timeout,
            catalog_ttl: get_seconds(vars, "CHARGECART_CATALOG_TTL_SECS", DEFAULT_CATALOG_TTL_SECS)?,
            free_accessory_handle: get_env_or_default(
                vars,
                "CHARGECART_FREE_ACCESSORY_HANDLE",
                DEFAULT_FREE_ACCESSORY_HANDLE,
            ),
        })
    }
}

impl AnalyticsConfig {
    fn from_vars(vars: &dyn Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(endpoint) = vars("ANALYTICS_ENDPOINT").filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        let endpoint = Url::parse(&endpoint).map_err(|e| {
            ConfigError::InvalidEnvVar("ANALYTICS_ENDPOINT".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            endpoint,
            api_key: get_validated_secret(vars, "ANALYTICS_API_KEY")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    vars(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    vars(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Get a duration in whole seconds.
fn get_seconds(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    vars(key).filter(|v| !v.is_empty()).map_or(
        Ok(Duration::from_secs(default)),
        |v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        },
    )
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

    // Real API tokens are random hex or base64
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by Shopify."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret(
    vars: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = get_required_env(vars, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const TOKEN: &str = "f3a9c1e07b5d48a2964e0cb7d1f82a35";

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = [
            ("SHOPIFY_STORE", "charge-test.myshopify.com"),
            ("SHOPIFY_STOREFRONT_PRIVATE_TOKEN", TOKEN),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            map.insert((*k).to_string(), (*v).to_string());
        }
        map
    }

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
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(TOKEN, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = ChargeCartConfig::from_map(&vars(&[])).unwrap();

        assert_eq!(config.shopify.api_version, "2025-01");
        assert_eq!(
            config.shopify.endpoint(),
            "https://charge-test.myshopify.com/api/2025-01/graphql.json"
        );
        assert_eq!(config.shopify.storefront_private_token.expose_secret(), TOKEN);
        assert_eq!(config.cart.state_dir, PathBuf::from(".chargecart"));
        assert_eq!(config.cart.remote_timeout, Duration::from_secs(8));
        assert_eq!(config.cart.catalog_ttl, Duration::from_secs(300));
        assert_eq!(config.cart.free_accessory_handle, "wall-charger");
        assert!(config.analytics.is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_store() {
        let mut map = vars(&[]);
        map.remove("SHOPIFY_STORE");
        let err = ChargeCartConfig::from_map(&map).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SHOPIFY_STORE"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ChargeCartConfig::from_map(&vars(&[("CHARGECART_REMOTE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = ChargeCartConfig::from_map(&vars(&[("CHARGECART_REMOTE_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_analytics_requires_api_key() {
        let err = ChargeCartConfig::from_map(&vars(&[(
            "ANALYTICS_ENDPOINT",
            "https://events.chargecart.dev/v1/events",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ANALYTICS_API_KEY"));

        let config = ChargeCartConfig::from_map(&vars(&[
            ("ANALYTICS_ENDPOINT", "https://events.chargecart.dev/v1/events"),
            ("ANALYTICS_API_KEY", "9Kx2mQ7vLp4Rt8Wz1Nc6Hb3Fy5Dj0Gs"),
        ]))
        .unwrap();
        assert_eq!(
            config.analytics.unwrap().endpoint.as_str(),
            "https://events.chargecart.dev/v1/events"
        );
    }

    #[test]
    fn test_invalid_analytics_endpoint() {
        let err = ChargeCartConfig::from_map(&vars(&[
            ("ANALYTICS_ENDPOINT", "not a url"),
            ("ANALYTICS_API_KEY", "9Kx2mQ7vLp4Rt8Wz1Nc6Hb3Fy5Dj0Gs"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "ANALYTICS_ENDPOINT"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ChargeCartConfig::from_map(&vars(&[
            ("ANALYTICS_ENDPOINT", "https://events.chargecart.dev/v1/events"),
            ("ANALYTICS_API_KEY", "9Kx2mQ7vLp4Rt8Wz1Nc6Hb3Fy5Dj0Gs"),
        ]))
        .unwrap();

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("charge-test.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(TOKEN));
        assert!(!debug_output.contains("9Kx2mQ7vLp4Rt8Wz1Nc6Hb3Fy5Dj0Gs"));
    }
}
