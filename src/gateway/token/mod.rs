//! Signed token codec for access and refresh tokens.
//!
//! Tokens are HS256 JWTs with a fixed claim shape. Each [`TokenKind`] is signed
//! with its own secret, and the embedded `kind` must match the kind the caller
//! expects, so a refresh token can never pass as an access token (or the
//! reverse) even if it carries a valid signature.

pub mod generation;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ulid::Ulid;

use super::verifier::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in every token minted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub kind: TokenKind,
    #[serde(rename = "gen")]
    pub generation: u64,
    pub jti: String,
}

impl TokenClaims {
    /// Build claims for `identity` valid for `ttl_seconds` from `now`.
    #[must_use]
    pub fn new(
        kind: TokenKind,
        identity: &Identity,
        generation: u64,
        now: i64,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            sub: identity.subject_id().to_string(),
            roles: identity.roles().to_vec(),
            exp: now.saturating_add(ttl_seconds),
            iat: now,
            kind,
            generation,
            jti: Ulid::new().to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("unexpected token kind: expected {expected}, found {found}")]
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },
    #[error("failed to sign token")]
    Signing,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Encodes and decodes tokens with one independent secret per [`TokenKind`].
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenCodec {
    #[must_use]
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Sign `claims` with the secret configured for `claims.kind`.
    ///
    /// # Errors
    /// Returns [`CodecError::Signing`] if the claims cannot be serialized or signed.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, CodecError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.kind).encoding,
        )
        .map_err(|_| CodecError::Signing)
    }

    /// Mint a token of `kind` for `identity`, valid for `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns [`CodecError::Signing`] if signing fails.
    pub fn issue(
        &self,
        kind: TokenKind,
        identity: &Identity,
        generation: u64,
        ttl_seconds: i64,
    ) -> Result<(String, TokenClaims), CodecError> {
        let claims = TokenClaims::new(kind, identity, generation, Utc::now().timestamp(), ttl_seconds);
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// Verify `token` against the secret for `kind` and return its claims.
    ///
    /// # Errors
    /// Fails with `InvalidSignature`, `Expired`, `Malformed` or `WrongKind`.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, CodecError> {
        self.decode_at(token, kind, Utc::now().timestamp())
    }

    pub(crate) fn decode_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<TokenClaims, CodecError> {
        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => CodecError::InvalidSignature,
                ErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Malformed,
            })?;
        let claims = data.claims;

        if claims.kind != kind {
            return Err(CodecError::WrongKind {
                expected: kind,
                found: claims.kind,
            });
        }
        if claims.sub.trim().is_empty() || claims.jti.is_empty() {
            return Err(CodecError::Malformed);
        }
        // jsonwebtoken accepts exp == now; the token must expire strictly in the future.
        if claims.exp <= now {
            return Err(CodecError::Expired);
        }

        Ok(claims)
    }
}
