use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Header;

use crate::claims::Claims;

/// A compact JWS split into its parts and decoded
///
/// Parsing does not check the signature. A `Token` only says the text
/// is well formed; [`Verifier`](crate::Verifier) decides whether to trust it.
#[derive(Debug, Clone)]
pub struct Token {
    header: Header,
    claims: Claims,
    signed_input: String,
    signature: String,
}

/// The token text is not a well-formed compact JWS
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed token: {0}")]
pub struct MalformedToken(String);

impl Token {
    /// Parse a compact `header.payload.signature` token
    pub fn parse(text: &str) -> Result<Self, MalformedToken> {
        let text = text.trim();
        let segments: Vec<&str> = text.split('.').collect();

        let [header_segment, payload_segment, signature_segment] = segments[..] else {
            return Err(MalformedToken(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        };

        let header_json = decode_segment("header", header_segment)?;
        let header: Header = serde_json::from_slice(&header_json)
            .map_err(|err| MalformedToken(format!("invalid header: {err}")))?;

        let payload_json = decode_segment("payload", payload_segment)?;
        let claims: Claims = serde_json::from_slice(&payload_json)
            .map_err(|err| MalformedToken(format!("invalid claims: {err}")))?;

        if decode_segment("signature", signature_segment)?.is_empty() {
            return Err(MalformedToken("empty signature".to_string()));
        }

        let signed_input_len = header_segment.len() + 1 + payload_segment.len();

        Ok(Self {
            header,
            claims,
            signed_input: text[..signed_input_len].to_string(),
            signature: signature_segment.to_string(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Key id named in the header, if any
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The `header.payload` bytes the signature covers
    pub fn signed_input(&self) -> &[u8] {
        self.signed_input.as_bytes()
    }

    /// Signature segment, still base64url encoded
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, MalformedToken> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| MalformedToken(format!("invalid {name} encoding: {err}")))
}
