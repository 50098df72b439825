use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that prevent the hook from answering at all.
///
/// Everything except [`Error::StaleKeySet`] is fatal: it is raised while
/// building the configuration or the key set cache and means the process
/// cannot verify any token correctly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read configuration file: {0}")]
    ConfigRead(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("No key source configured - set either `jwk_keys` or `jwk_url`")]
    NoKeySource,
    #[error("Both `jwk_keys` and `jwk_url` are configured - set exactly one")]
    AmbiguousKeySource,
    #[error("Failed to load the initial key set: {0}")]
    KeyLoad(#[source] LoadError),
    #[error("Key set refresh failed, still serving keys loaded at {last_loaded_at}: {source}")]
    StaleKeySet {
        #[source]
        source: LoadError,
        last_loaded_at: DateTime<Utc>,
    },
    #[error("The loaded key set contains no keys")]
    NoKeysAvailable,
}

impl Error {
    /// Whether this error means the hook can never answer correctly.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::StaleKeySet { .. })
    }
}

/// Failure to produce a key set from a [`KeySetSource`](crate::KeySetSource).
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to fetch JWKS: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Failed to parse JWKS document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Key set load timed out after {0:?}")]
    Timeout(Duration),
    #[error("JWKS contains a key without a 'kid'")]
    MissingKeyId,
    #[error("JWKS contains no keys")]
    EmptyKeySet,
    #[error("JWKS contains the key id {0:?} more than once")]
    DuplicateKeyId(String),
    #[error("Key {kid:?} is not supported: {reason}")]
    UnsupportedKey { kid: String, reason: String },
    #[error("Key {kid:?} has invalid key material: {source}")]
    InvalidKeyMaterial {
        kid: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

pub(crate) fn unsupported_key(kid: &str, reason: impl Into<String>) -> LoadError {
    LoadError::UnsupportedKey {
        kid: kid.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn invalid_key_material(kid: &str, source: jsonwebtoken::errors::Error) -> LoadError {
    LoadError::InvalidKeyMaterial {
        kid: kid.to_string(),
        source,
    }
}

/// Why a single token was rejected.
///
/// This is a closed set: every rejected verification maps to exactly one
/// of these, and each has a stable string used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    MalformedToken,
    SignatureInvalid,
    KeyNotFound,
    TokenExpired,
    NoKeysAvailable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MalformedToken => "malformed-token",
            FailureReason::SignatureInvalid => "signature-invalid",
            FailureReason::KeyNotFound => "key-not-found",
            FailureReason::TokenExpired => "token-expired",
            FailureReason::NoKeysAvailable => "no-keys-available",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
