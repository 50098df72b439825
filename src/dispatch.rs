//! Request/response handling for the auth-script protocol
//!
//! The host service writes one JSON request per authentication attempt and
//! expects one JSON response back:
//!
//! ```json
//! {"accountName": "alice", "passphrase": "eyJhbGciOi..."}
//! {"accountName": "alice", "success": true, "error": ""}
//! ```
//!
//! The `passphrase` field carries the signed token. Every problem with a
//! single request, including an unreadable request, is answered with a
//! response and never aborts the process.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::config::AuthConfig;
use crate::error::FailureReason;
use crate::error::Result;
use crate::jwks_cache::KeySetCache;
use crate::verifier::VerificationResult;
use crate::verifier::Verifier;

/// Error reported for requests that could not be read
pub const INVALID_REQUEST: &str = "invalid-request";

/// One authentication attempt from the host service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    #[serde(default)]
    pub account_name: String,
    /// The signed token
    #[serde(default, rename = "passphrase", alias = "token")]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certfp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Answer to one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub account_name: String,
    pub success: bool,
    /// Empty on success, otherwise a stable reason string
    pub error: String,
}

impl AuthResponse {
    pub fn success(account_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            success: true,
            error: String::new(),
        }
    }

    pub fn failure(account_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            success: false,
            error: error.into(),
        }
    }

    pub fn from_result(account_name: impl Into<String>, result: VerificationResult) -> Self {
        match result.failure_reason() {
            None => Self::success(account_name),
            Some(reason) => Self::failure(account_name, reason.as_str()),
        }
    }
}

/// Trait for answering authentication requests
#[async_trait]
pub trait Authenticate {
    async fn authenticate(&self, request: &AuthRequest) -> AuthResponse;
}

/// Verifies request tokens against the cached key set
#[derive(Clone)]
pub struct Authenticator {
    cache: KeySetCache,
    verifier: Verifier,
}

impl Authenticator {
    pub fn new(cache: KeySetCache, verifier: Verifier) -> Self {
        Self { cache, verifier }
    }

    /// Build the key set cache and verifier from configuration.
    ///
    /// # Errors
    /// Any error here is fatal: see [`KeySetCache::from_config`].
    pub async fn from_config(config: &AuthConfig) -> Result<Self> {
        let cache = KeySetCache::from_config(config).await?;
        let verifier = Verifier::new().with_clock_skew_leeway(config.clock_skew_leeway());

        Ok(Self::new(cache, verifier))
    }

    pub fn cache(&self) -> &KeySetCache {
        &self.cache
    }

    /// Verify the request's token as of `now`
    pub async fn authenticate_at(&self, request: &AuthRequest, now: DateTime<Utc>) -> AuthResponse {
        if request.account_name.is_empty() || request.token.is_empty() {
            return AuthResponse::failure(&request.account_name, INVALID_REQUEST);
        }

        let result = match self.cache.get(now).await {
            Ok(key_set) => self.verifier.verify_str(&request.token, &key_set, now),
            Err(err) => {
                tracing::error!(error = %err, "no key set available");
                VerificationResult::rejected(FailureReason::NoKeysAvailable)
            }
        };

        tracing::info!(
            account = %request.account_name,
            success = result.is_valid(),
            reason = result.failure_reason().map(|reason| reason.as_str()),
            "authentication attempt"
        );

        AuthResponse::from_result(&request.account_name, result)
    }

    /// Handle one raw request line
    pub async fn handle_line(&self, line: &str) -> AuthResponse {
        match serde_json::from_str::<AuthRequest>(line.trim()) {
            Ok(request) => self.authenticate(&request).await,
            Err(err) => {
                tracing::warn!(error = %err, "unreadable authentication request");
                AuthResponse::failure("", INVALID_REQUEST)
            }
        }
    }
}

#[async_trait]
impl Authenticate for Authenticator {
    async fn authenticate(&self, request: &AuthRequest) -> AuthResponse {
        self.authenticate_at(request, Utc::now()).await
    }
}
