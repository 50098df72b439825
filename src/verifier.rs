use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::crypto;

use crate::error::FailureReason;
use crate::key_set::Key;
use crate::key_set::KeySet;
use crate::token::MalformedToken;
use crate::token::Token;

/// Outcome of verifying one token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationResult {
    valid: bool,
    failure_reason: Option<FailureReason>,
}

impl VerificationResult {
    pub fn accepted() -> Self {
        Self {
            valid: true,
            failure_reason: None,
        }
    }

    pub fn rejected(reason: FailureReason) -> Self {
        Self {
            valid: false,
            failure_reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The first check that failed, `None` for accepted tokens
    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    pub fn into_result(self) -> Result<(), FailureReason> {
        match self.failure_reason {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

impl From<Result<(), FailureReason>> for VerificationResult {
    fn from(result: Result<(), FailureReason>) -> Self {
        match result {
            Ok(()) => Self::accepted(),
            Err(reason) => Self::rejected(reason),
        }
    }
}

/// Token verifier
///
/// Stateless: the same token and key set always give the same result for
/// the same `now`. Checks run in a fixed order (key selection, signature,
/// expiry) and the first failure is reported.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    clock_skew_leeway: Duration,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grace period added to the token expiry to tolerate clock drift
    pub fn with_clock_skew_leeway(mut self, leeway: Duration) -> Self {
        self.clock_skew_leeway = leeway;
        self
    }

    pub fn clock_skew_leeway(&self) -> Duration {
        self.clock_skew_leeway
    }

    pub fn parse(&self, text: &str) -> Result<Token, MalformedToken> {
        Token::parse(text)
    }

    /// Parse and verify token text in one step
    pub fn verify_str(&self, text: &str, key_set: &KeySet, now: DateTime<Utc>) -> VerificationResult {
        match self.parse(text) {
            Ok(token) => self.verify(&token, key_set, now),
            Err(err) => {
                tracing::debug!(error = %err, "rejecting malformed token");
                VerificationResult::rejected(FailureReason::MalformedToken)
            }
        }
    }

    pub fn verify(&self, token: &Token, key_set: &KeySet, now: DateTime<Utc>) -> VerificationResult {
        let result = self.check(token, key_set, now);

        if let Err(reason) = result {
            tracing::debug!(kid = ?token.key_id(), %reason, "token rejected");
        }

        result.into()
    }

    fn check(&self, token: &Token, key_set: &KeySet, now: DateTime<Utc>) -> Result<(), FailureReason> {
        if key_set.is_empty() {
            return Err(FailureReason::NoKeysAvailable);
        }

        match token.key_id() {
            Some(kid) => {
                let key = key_set.find(kid).ok_or(FailureReason::KeyNotFound)?;
                if !signature_matches(token, key) {
                    return Err(FailureReason::SignatureInvalid);
                }
            }
            None => {
                if !key_set.iter().any(|key| signature_matches(token, key)) {
                    return Err(FailureReason::SignatureInvalid);
                }
            }
        }

        if self.is_expired(token, now) {
            return Err(FailureReason::TokenExpired);
        }

        Ok(())
    }

    /// A token is expired once `now` is past its expiry plus the leeway
    fn is_expired(&self, token: &Token, now: DateTime<Utc>) -> bool {
        let leeway = i64::try_from(self.clock_skew_leeway.as_secs()).unwrap_or(i64::MAX);
        token.claims().exp.saturating_add(leeway) < now.timestamp()
    }
}

fn signature_matches(token: &Token, key: &Key) -> bool {
    let alg = token.header().alg;

    // `alg` comes from the unverified header
    if !key.accepts(alg) {
        return false;
    }

    crypto::verify(token.signature(), token.signed_input(), key.decoding_key(), alg)
        .unwrap_or(false)
}
