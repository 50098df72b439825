//! # jwks-auth-hook
//!
//! JWT verification against a JWKS (JSON Web Key Set) for external
//! authentication hooks, such as an IRC server's auth-script.
//!
//! The host service hands over an account name and a signed token; the
//! token is checked against a set of trusted keys and the decision is
//! reported back as a structured response.
//!
//! ## Features
//!
//! - JWT signature verification using RSA, ECDSA, Ed25519 and HMAC keys
//! - Static key sets from configuration, or JWKS fetched from a URL
//! - TTL-based key set caching that keeps serving the previous keys while a
//!   single background task refreshes them
//! - Expiration validation with optional clock-skew leeway
//! - Stable, machine-readable rejection reasons
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use jwks_auth_hook::{AuthConfig, AuthRequest, Authenticate, Authenticator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::with_remote_keys("https://auth.example.com/.well-known/jwks.json")
//!         .with_cache_ttl(Duration::from_secs(300))
//!         .with_clock_skew_leeway(Duration::from_secs(30));
//!
//!     let authenticator = Authenticator::from_config(&config).await?;
//!
//!     let request = AuthRequest {
//!         account_name: "alice".to_string(),
//!         token: "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9...".to_string(),
//!         ..Default::default()
//!     };
//!     let response = authenticator.authenticate(&request).await;
//!
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```

mod claims;
mod config;
mod dispatch;
mod error;
mod jwks_cache;
mod key_set;
mod source;
mod token;
mod verifier;

// Re-exports for public API
pub use claims::Claims;
pub use config::AuthConfig;
pub use config::KeySourceConfig;
pub use dispatch::AuthRequest;
pub use dispatch::AuthResponse;
pub use dispatch::Authenticate;
pub use dispatch::Authenticator;
pub use dispatch::INVALID_REQUEST;
pub use error::Error;
pub use error::FailureReason;
pub use error::LoadError;
pub use error::Result;
pub use jwks_cache::CacheStatus;
pub use jwks_cache::KeySetCache;
pub use key_set::Curve;
pub use key_set::Key;
pub use key_set::KeyMaterial;
pub use key_set::KeySet;
pub use source::KeySetSource;
pub use source::RemoteSource;
pub use source::StaticSource;
pub use token::MalformedToken;
pub use token::Token;
pub use verifier::VerificationResult;
pub use verifier::Verifier;
