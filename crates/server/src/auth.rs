//! Connection token verification.
//!
//! Tokens are HS256 JWTs issued by the lobby's identity service. They arrive in the
//! `token` query parameter of the websocket upgrade and must verify before any
//! player or connection state is created.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

/// Why a token was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token supplied")]
    Missing,

    #[error("token expired")]
    Expired,

    #[error("token claims incomplete")]
    EmptyIdentity,

    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid(err),
        }
    }
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    /// Account kind as issued (e.g. `"user"` or `"guest"`).
    pub kind: Option<String>,
}

/// Raw claims. Issuers differ on naming, so every spelling is optional here and
/// resolved in [`Claims::into_identity`].
#[derive(Debug, Deserialize)]
struct Claims {
    id: Option<String>,
    sub: Option<String>,
    name: Option<String>,
    username: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl Claims {
    /// `id` wins over `sub`, `name` over `username`. Blank values count as absent.
    fn into_identity(self) -> Result<Identity, AuthError> {
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let id = non_blank(self.id)
            .or(non_blank(self.sub))
            .ok_or(AuthError::EmptyIdentity)?;
        // A nameless token still joins; the hub falls back to a default name.
        let name = non_blank(self.name)
            .or(non_blank(self.username))
            .unwrap_or_default();
        Ok(Identity {
            id,
            name,
            kind: self.kind,
        })
    }
}

/// Verifies connection tokens against the server-held secret.
#[derive(Clone)]
pub struct TokenGate {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGate").finish_non_exhaustive()
    }
}

impl TokenGate {
    /// Create a gate for the given HMAC secret.
    pub fn new(secret: &str) -> Self {
        // `exp` is required and checked with no leeway. Audience is the lobby's concern.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify `token` and return the identity it carries.
    pub fn verify(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::Missing)?;
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        data.claims.into_identity()
    }
}
