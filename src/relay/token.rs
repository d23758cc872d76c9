// Signed session tokens (HS256 JWT)

use crate::relay::error::RelayError;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Compiled-in signing secret used when no deployment secret is configured.
///
/// Anyone holding the source can mint tokens against a server running with it.
pub const DEFAULT_SECRET: &str = "mudrelay-shared-secret";

/// The only algorithm tokens may advertise
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Display name chosen at handshake time
    pub name: String,
    /// Session identifier, serialized as `token` on the wire
    #[serde(rename = "token")]
    pub session_id: String,
}

/// Signs and verifies session tokens under one shared secret.
///
/// Tokens are stateless: nothing is recorded when one is issued, and a token
/// is valid exactly when its signature verifies.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for the given shared secret
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Session tokens carry no registered claims and never expire
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign `{name, token: session_id}` into a compact token
    pub fn sign(&self, name: &str, session_id: &str) -> Result<String, RelayError> {
        let claims = Claims {
            name: name.to_string(),
            session_id: session_id.to_string(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| RelayError::Signing(e.to_string()))
    }

    /// Verify a token's algorithm and signature and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, RelayError> {
        if token.is_empty() {
            return Err(RelayError::Authentication("missing token".to_string()));
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    JwtErrorKind::InvalidAlgorithm => "unexpected signing algorithm".to_string(),
                    JwtErrorKind::InvalidSignature => "invalid signature".to_string(),
                    _ => format!("malformed token: {}", e),
                };
                RelayError::Authentication(reason)
            })
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET.as_bytes())
    }
}
