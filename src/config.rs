use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Where the trusted keys come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceConfig {
    /// A JWKS document embedded in the configuration
    Static(String),
    /// URL of a JWKS endpoint
    Remote(String),
}

/// Configuration for the key set cache and verifier
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub(crate) key_source: KeySourceConfig,
    /// Refresh TTL for the cached key set. `None` reloads on every request.
    pub(crate) refresh_ttl: Option<Duration>,
    /// Upper bound for a single key set load
    pub(crate) fetch_timeout: Duration,
    pub(crate) clock_skew_leeway: Duration,
    /// Optional custom HTTP client for fetching JWKS
    /// If not provided, a default client with `fetch_timeout` will be created
    pub(crate) http_client: Option<Client>,
}

/// On-disk form of the configuration
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    jwk_keys: Option<KeySetDocument>,
    #[serde(default)]
    jwk_url: Option<String>,
    #[serde(default)]
    jwk_ttl: u64,
    #[serde(default)]
    jwk_fetch_timeout: Option<u64>,
    #[serde(default)]
    clock_skew_leeway: u64,
}

/// `jwk_keys` may hold the JWKS as an encoded string or inline as an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeySetDocument {
    Encoded(String),
    Inline(Map<String, Value>),
}

impl KeySetDocument {
    fn into_document(self) -> Option<String> {
        match self {
            KeySetDocument::Encoded(text) if text.trim().is_empty() => None,
            KeySetDocument::Encoded(text) => Some(text),
            KeySetDocument::Inline(object) => Some(Value::Object(object).to_string()),
        }
    }
}

impl AuthConfig {
    fn new(key_source: KeySourceConfig) -> Self {
        Self {
            key_source,
            refresh_ttl: None,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            clock_skew_leeway: Duration::ZERO,
            http_client: None,
        }
    }

    /// Trust the keys in a JWKS document
    pub fn with_static_keys(document: impl Into<String>) -> Self {
        Self::new(KeySourceConfig::Static(document.into()))
    }

    /// Trust the keys served by a JWKS endpoint
    pub fn with_remote_keys(url: impl Into<String>) -> Self {
        Self::new(KeySourceConfig::Remote(url.into()))
    }

    /// Read the JSON configuration file at `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse the JSON configuration format.
    ///
    /// # Errors
    /// Returns `Error::NoKeySource` if neither `jwk_keys` nor `jwk_url` is set, and
    /// `Error::AmbiguousKeySource` if both are.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(contents)?;

        let document = file.jwk_keys.and_then(KeySetDocument::into_document);
        let url = file.jwk_url.filter(|url| !url.trim().is_empty());

        let key_source = match (document, url) {
            (Some(document), None) => KeySourceConfig::Static(document),
            (None, Some(url)) => KeySourceConfig::Remote(url),
            (Some(_), Some(_)) => return Err(Error::AmbiguousKeySource),
            (None, None) => return Err(Error::NoKeySource),
        };

        let mut config = Self::new(key_source)
            .with_cache_ttl(Duration::from_secs(file.jwk_ttl))
            .with_clock_skew_leeway(Duration::from_secs(file.clock_skew_leeway));

        if let Some(timeout) = file.jwk_fetch_timeout {
            config = config.with_fetch_timeout(Duration::from_secs(timeout));
        }

        Ok(config)
    }

    /// Set the key set refresh TTL. A zero TTL disables caching.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Set the timeout applied to each key set load
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the grace period applied to token expiry
    pub fn with_clock_skew_leeway(mut self, leeway: Duration) -> Self {
        self.clock_skew_leeway = leeway;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn key_source(&self) -> &KeySourceConfig {
        &self.key_source
    }

    pub fn refresh_ttl(&self) -> Option<Duration> {
        self.refresh_ttl
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn clock_skew_leeway(&self) -> Duration {
        self.clock_skew_leeway
    }
}
