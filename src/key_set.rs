use std::collections::HashSet;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::jwk::EllipticCurve;
use jsonwebtoken::jwk::EllipticCurveKeyParameters;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::jwk::OctetKeyPairParameters;
use jsonwebtoken::jwk::RSAKeyParameters;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;

use crate::error::invalid_key_material;
use crate::error::unsupported_key;
use crate::error::LoadError;

/// Curves supported for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
}

/// Public key material of a signing key.
///
/// One variant per supported key type, each carrying only the fields
/// that key type needs. RSA and EC components stay in their JWK
/// base64url form.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Rsa { n: String, e: String },
    EllipticCurve { curve: Curve, x: String, y: String },
    Ed25519 { x: String },
    Symmetric { secret: Vec<u8> },
}

impl KeyMaterial {
    /// Whether a token signed with `alg` can be checked against this material
    pub fn supports(&self, alg: Algorithm) -> bool {
        use Algorithm::*;

        match self {
            KeyMaterial::Rsa { .. } => {
                matches!(alg, RS256 | RS384 | RS512 | PS256 | PS384 | PS512)
            }
            KeyMaterial::EllipticCurve { curve, .. } => match curve {
                Curve::P256 => alg == ES256,
                Curve::P384 => alg == ES384,
            },
            KeyMaterial::Ed25519 { .. } => alg == EdDSA,
            KeyMaterial::Symmetric { .. } => matches!(alg, HS256 | HS384 | HS512),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            KeyMaterial::Rsa { .. } => "RSA",
            KeyMaterial::EllipticCurve { .. } => "EC",
            KeyMaterial::Ed25519 { .. } => "OKP",
            KeyMaterial::Symmetric { .. } => "oct",
        }
    }

    fn decoding_key(&self) -> jsonwebtoken::errors::Result<DecodingKey> {
        match self {
            KeyMaterial::Rsa { n, e } => DecodingKey::from_rsa_components(n, e),
            KeyMaterial::EllipticCurve { x, y, .. } => DecodingKey::from_ec_components(x, y),
            KeyMaterial::Ed25519 { x } => DecodingKey::from_ed_components(x),
            KeyMaterial::Symmetric { secret } => Ok(DecodingKey::from_secret(secret)),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Rsa { n, e } => f.debug_struct("Rsa").field("n", n).field("e", e).finish(),
            KeyMaterial::EllipticCurve { curve, x, y } => f
                .debug_struct("EllipticCurve")
                .field("curve", curve)
                .field("x", x)
                .field("y", y)
                .finish(),
            KeyMaterial::Ed25519 { x } => f.debug_struct("Ed25519").field("x", x).finish(),
            KeyMaterial::Symmetric { .. } => f
                .debug_struct("Symmetric")
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// A single trusted signing key
///
/// The decoding key is derived when the key is constructed, so a key that
/// exists is always usable for verification.
#[derive(Clone)]
pub struct Key {
    id: String,
    algorithm: Option<Algorithm>,
    material: KeyMaterial,
    decoding_key: DecodingKey,
}

impl Key {
    /// Build a key from its parts.
    ///
    /// # Errors
    /// Returns `LoadError::UnsupportedKey` if `algorithm` cannot be used with the
    /// material, and `LoadError::InvalidKeyMaterial` if the material does not decode.
    pub fn new(
        id: impl Into<String>,
        algorithm: Option<Algorithm>,
        material: KeyMaterial,
    ) -> Result<Self, LoadError> {
        let id = id.into();

        if let Some(alg) = algorithm {
            if !material.supports(alg) {
                return Err(unsupported_key(
                    &id,
                    format!("algorithm {alg:?} cannot be used with a {} key", material.kind()),
                ));
            }
        }

        let decoding_key = material
            .decoding_key()
            .map_err(|source| invalid_key_material(&id, source))?;

        Ok(Self {
            id,
            algorithm,
            material,
            decoding_key,
        })
    }

    /// Convert a JWK into a key, rejecting key types and algorithms we cannot verify with
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, LoadError> {
        let kid = jwk.common.key_id.as_deref().ok_or(LoadError::MissingKeyId)?;

        let algorithm = jwk
            .common
            .key_algorithm
            .as_ref()
            .map(|alg| signing_algorithm(kid, alg))
            .transpose()?;

        let material = match &jwk.algorithm {
            AlgorithmParameters::RSA(RSAKeyParameters { n, e, .. }) => KeyMaterial::Rsa {
                n: n.clone(),
                e: e.clone(),
            },
            AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters { curve, x, y, .. }) => {
                let curve = match curve {
                    EllipticCurve::P256 => Curve::P256,
                    EllipticCurve::P384 => Curve::P384,
                    other => return Err(unsupported_key(kid, format!("curve {other:?}"))),
                };
                KeyMaterial::EllipticCurve {
                    curve,
                    x: x.clone(),
                    y: y.clone(),
                }
            }
            AlgorithmParameters::OctetKeyPair(OctetKeyPairParameters { curve, x, .. }) => {
                if !matches!(curve, EllipticCurve::Ed25519) {
                    return Err(unsupported_key(kid, format!("curve {curve:?}")));
                }
                KeyMaterial::Ed25519 { x: x.clone() }
            }
            AlgorithmParameters::OctetKey(params) => {
                let secret = URL_SAFE_NO_PAD
                    .decode(params.value.as_bytes())
                    .map_err(|err| unsupported_key(kid, format!("invalid 'k' encoding: {err}")))?;
                KeyMaterial::Symmetric { secret }
            }
        };

        Self::new(kid, algorithm, material)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The algorithm declared for this key, if the JWK pinned one
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Whether a token whose header names `alg` may be checked with this key.
    ///
    /// The algorithm must fit the key type, and must equal the declared
    /// algorithm when the key has one.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.material.supports(alg) && self.algorithm.map_or(true, |declared| declared == alg)
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

/// Map a JWK `alg` onto a JWS signing algorithm
fn signing_algorithm(kid: &str, alg: &KeyAlgorithm) -> Result<Algorithm, LoadError> {
    let algorithm = match alg {
        KeyAlgorithm::HS256 => Algorithm::HS256,
        KeyAlgorithm::HS384 => Algorithm::HS384,
        KeyAlgorithm::HS512 => Algorithm::HS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        other => return Err(unsupported_key(kid, format!("algorithm {other:?}"))),
    };
    Ok(algorithm)
}

/// An immutable set of trusted signing keys
///
/// Key ids are unique within a set. A set is never modified after it is
/// built; refreshing produces a new one.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Key>,
}

impl KeySet {
    /// Build a key set, rejecting duplicate key ids
    pub fn new(keys: Vec<Key>) -> Result<Self, LoadError> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key.id()) {
                return Err(LoadError::DuplicateKeyId(key.id().to_string()));
            }
        }

        Ok(Self { keys })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JWKS document (`{"keys": [...]}`)
    pub fn from_json(document: &[u8]) -> Result<Self, LoadError> {
        let jwks: JwkSet = serde_json::from_slice(document)?;
        Self::from_jwks(&jwks)
    }

    pub fn from_jwks(jwks: &JwkSet) -> Result<Self, LoadError> {
        let keys = jwks
            .keys
            .iter()
            .map(Key::from_jwk)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(keys)
    }

    pub fn find(&self, kid: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.id() == kid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
