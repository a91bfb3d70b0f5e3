//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `FIREBASE_API_KEY` - Web API key of the Firebase project (firebase backend)
//! - `FIREBASE_PROJECT_ID` - Firebase project ID (firebase backend)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BACKEND` - `firebase` (default) or `memory`
//! - `GEMINI_API_KEY` - Generative AI key; the oracle is disabled without it
//! - `GEMINI_MODEL` - Model name (default: gemini-2.5-flash)
//! - `CART_SYNC_DEBOUNCE_MS` - Quiet period before a cart write (default: 500)
//! - `VISUAL_SEARCH_DAILY_LIMIT` - Image identifications per user per day (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! Values that look like build placeholders (`MISSING_...`, `your-...`) are
//! treated as unset, so a half-configured deployment degrades to "not
//! configured" messages instead of failing at request time.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Default generative model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Blocklist of placeholder prefixes (case-insensitive).
const PLACEHOLDER_PREFIXES: &[&str] = &["missing_", "your-", "your_", "changeme", "placeholder"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which service implementations back the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Firebase Auth + Firestore over REST.
    #[default]
    Firebase,
    /// In-process fakes for local development.
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected `firebase` or `memory`, got `{other}`")),
        }
    }
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
    /// Service implementations to use
    pub backend: Backend,
    /// Firebase project settings; `None` when not configured
    pub firebase: Option<FirebaseConfig>,
    /// Generative AI settings
    pub gemini: GeminiConfig,
    /// Quiet period before a cart change is written remotely
    pub cart_sync_debounce: Duration,
    /// Image identifications per non-admin user per UTC day
    pub visual_search_daily_limit: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key used for Identity Toolkit calls
    pub api_key: SecretString,
    /// Project ID used to address Firestore documents
    pub project_id: String,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Generative AI configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key; `None` disables the oracle
    pub api_key: Option<SecretString>,
    /// Model name
    pub model: String,
}

impl GeminiConfig {
    /// Short `AIza...kg_U` style snippet of the key for diagnostics.
    #[must_use]
    pub fn key_snippet(&self) -> String {
        self.api_key
            .as_ref()
            .map_or_else(|| key_snippet(""), |key| key_snippet(key.expose_secret()))
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
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
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let backend = parse_env("STOREFRONT_BACKEND", "firebase")?;

        let firebase = FirebaseConfig::from_env();
        if backend == Backend::Firebase && firebase.is_none() {
            tracing::warn!("Firebase is not configured; sign-in and cart sync are unavailable");
        }

        let gemini = GeminiConfig {
            api_key: get_optional_env("GEMINI_API_KEY").map(SecretString::from),
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        };

        let debounce_ms: u64 = parse_env("CART_SYNC_DEBOUNCE_MS", "500")?;
        let visual_search_daily_limit = parse_env("VISUAL_SEARCH_DAILY_LIMIT", "5")?;

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            firebase,
            gemini,
            cart_sync_debounce: Duration::from_millis(debounce_ms),
            visual_search_daily_limit,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// A configuration for in-process use with the memory backend.
    #[must_use]
    pub fn local(base_url: impl Into<String>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.into(),
            backend: Backend::Memory,
            firebase: None,
            gemini: GeminiConfig {
                api_key: None,
                model: DEFAULT_GEMINI_MODEL.to_string(),
            },
            cart_sync_debounce: Duration::from_millis(500),
            visual_search_daily_limit: 5,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl FirebaseConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            api_key: SecretString::from(get_optional_env("FIREBASE_API_KEY")?),
            project_id: get_optional_env("FIREBASE_PROJECT_ID")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, ignoring blanks and placeholders.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty() && !is_placeholder(value))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Whether a value is a build-time placeholder rather than a real setting.
fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    PLACEHOLDER_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// First four and last four characters of a key, or a marker when unusable.
fn key_snippet(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 || is_placeholder(key) {
        return "Not Available".to_string();
    }
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder("MISSING_API_KEY_IN_IDE"));
        assert!(is_placeholder("your-project-id"));
        assert!(!is_placeholder("luna-moth-gifts"));
        assert!(!is_placeholder("AIzaSyD-real-looking-key"));
    }

    #[test]
    fn test_key_snippet() {
        assert_eq!(key_snippet("AIzaSyAbcdefghkg_U"), "AIza...kg_U");
        assert_eq!(key_snippet("short"), "Not Available");
        assert_eq!(key_snippet("MISSING_API_KEY_IN_IDE"), "Not Available");
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!(" Firebase ".parse::<Backend>().unwrap(), Backend::Firebase);
        assert!("postgres".parse::<Backend>().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig::local("http://localhost:3000");
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let firebase = FirebaseConfig {
            api_key: SecretString::from("super_secret_firebase_key"),
            project_id: "luna-moth".to_string(),
        };
        let gemini = GeminiConfig {
            api_key: Some(SecretString::from("super_secret_gemini_key")),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        };

        let debug_output = format!("{firebase:?} {gemini:?}");

        assert!(debug_output.contains("luna-moth"));
        assert!(debug_output.contains(DEFAULT_GEMINI_MODEL));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret"));
    }
}
