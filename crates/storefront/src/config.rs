//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATA_DIR` - Cart storage root (default: data)
//! - `STOREFRONT_STATIC_DIR` - Directory holding `store-categories.json`
//!   (default: crates/storefront/static)
//! - `STORE_CATEGORIES_URL` - Category manifest (default: `{base_url}/store-categories.json`)
//! - `STORE_PACKAGES_URL` - Package list (default: Tebex package listing)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `CART_IDLE_TTL_SECS` - Idle time before a cart leaves memory (default: 1800)
//! - `TEBEX_PUBLIC_TOKEN` - Tebex webstore token; enables basket sync
//! - `TEBEX_PRIVATE_KEY` - Tebex private key for authorized requests
//! - `TEBEX_API_URL` - Tebex Headless base URL (default: <https://headless.tebex.io/api>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_TEBEX_API_URL: &str = "https://headless.tebex.io/api";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
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
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Root directory for per-cart storage
    pub data_dir: PathBuf,
    /// Directory served for `/store-categories.json`
    pub static_dir: PathBuf,
    /// How long an untouched cart stays in memory
    pub cart_idle_ttl: Duration,
    /// Catalog sources
    pub catalog: CatalogConfig,
    /// Tebex basket configuration; `None` disables basket sync
    pub tebex: Option<TebexConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Where the catalog loader reads from.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Category manifest URL
    pub categories_url: String,
    /// Package list URL; `None` means no package source is configured
    pub packages_url: Option<String>,
    /// Cache lifetime for fetched documents
    pub cache_ttl: Duration,
}

/// Tebex Headless API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct TebexConfig {
    /// Base URL of the Headless API
    pub api_url: String,
    /// Webstore public token (safe to expose in browser)
    pub public_token: String,
    /// Private key for authorized requests (server-side only)
    pub private_key: Option<SecretString>,
    /// Where Tebex sends the player after a completed checkout
    pub complete_url: String,
    /// Where Tebex sends the player after a cancelled checkout
    pub cancel_url: String,
}

impl std::fmt::Debug for TebexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TebexConfig")
            .field("api_url", &self.api_url)
            .field("public_token", &self.public_token)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("complete_url", &self.complete_url)
            .field("cancel_url", &self.cancel_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the Tebex private key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env
            .or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string()))?;
        let port = env.parsed("STOREFRONT_PORT", 3000_u16)?;
        let base_url = env
            .required("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let data_dir = PathBuf::from(env.or_default("STOREFRONT_DATA_DIR", "data"));
        let static_dir = PathBuf::from(
            env.or_default("STOREFRONT_STATIC_DIR", "crates/storefront/static"),
        );
        let cart_idle_ttl = Duration::from_secs(env.parsed("CART_IDLE_TTL_SECS", 1800_u64)?);

        let tebex = TebexConfig::from_env(&env, &base_url)?;
        let catalog = CatalogConfig::from_env(&env, &base_url, tebex.as_ref())?;

        Ok(Self {
            host,
            port,
            base_url,
            data_dir,
            static_dir,
            cart_idle_ttl,
            catalog,
            tebex,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CatalogConfig {
    fn from_env(
        env: &Env<'_>,
        base_url: &str,
        tebex: Option<&TebexConfig>,
    ) -> Result<Self, ConfigError> {
        let categories_url = env
            .optional("STORE_CATEGORIES_URL")
            .unwrap_or_else(|| format!("{base_url}/store-categories.json"));
        let packages_url = env.optional("STORE_PACKAGES_URL").or_else(|| {
            tebex.map(|t| {
                format!(
                    "{}/accounts/{}/packages",
                    t.api_url.trim_end_matches('/'),
                    t.public_token
                )
            })
        });

        Ok(Self {
            categories_url,
            packages_url,
            cache_ttl: Duration::from_secs(env.parsed("CATALOG_CACHE_TTL_SECS", 300_u64)?),
        })
    }
}

impl TebexConfig {
    fn from_env(env: &Env<'_>, base_url: &str) -> Result<Option<Self>, ConfigError> {
        let Some(public_token) = env.optional("TEBEX_PUBLIC_TOKEN") else {
            return Ok(None);
        };

        let private_key = match env.optional("TEBEX_PRIVATE_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "TEBEX_PRIVATE_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };

        Ok(Some(Self {
            api_url: env.or_default("TEBEX_API_URL", DEFAULT_TEBEX_API_URL),
            public_token,
            private_key,
            complete_url: format!("{base_url}/store?checkout=complete"),
            cancel_url: format!("{base_url}/store?checkout=cancel"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the lookups config loading needs.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
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
    let len = s.chars().count() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
