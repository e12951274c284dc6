//! Credential verification.
//!
//! A verifier pulls a token out of the request (`Authorization: Bearer` first,
//! then the cookie named after the token kind), decodes it and yields an
//! [`Identity`]. [`Identity`] has no public constructor and no `Deserialize`
//! impl: the only way to obtain one is a successful decode in this process.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::cookies::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, read_cookie};
use super::error::GatewayError;
use super::token::{TokenClaims, TokenCodec, TokenKind};

/// Gateway-verified subject and roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject_id: String,
    roles: Vec<String>,
}

impl Identity {
    pub(crate) fn new(subject_id: String, roles: Vec<String>) -> Self {
        Self { subject_id, roles }
    }

    pub(crate) fn from_claims(claims: &TokenClaims) -> Self {
        Self::new(claims.sub.clone(), claims.roles.clone())
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("no token presented")]
    MissingToken,
    #[error("token rejected")]
    InvalidToken,
}

/// Marker for the token a verifier accepts.
pub trait TokenClass: Send + Sync + 'static {
    const KIND: TokenKind;
    const COOKIE: &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct Access;

#[derive(Debug, Clone, Copy)]
pub struct Refresh;

impl TokenClass for Access {
    const KIND: TokenKind = TokenKind::Access;
    const COOKIE: &'static str = ACCESS_COOKIE_NAME;
}

impl TokenClass for Refresh {
    const KIND: TokenKind = TokenKind::Refresh;
    const COOKIE: &'static str = REFRESH_COOKIE_NAME;
}

/// Verifier for one token class. `CredentialVerifier<Access>` and
/// `CredentialVerifier<Refresh>` are distinct types.
pub struct CredentialVerifier<K: TokenClass> {
    codec: Arc<TokenCodec>,
    _class: PhantomData<K>,
}

pub type AccessVerifier = CredentialVerifier<Access>;
pub type RefreshVerifier = CredentialVerifier<Refresh>;

impl<K: TokenClass> CredentialVerifier<K> {
    #[must_use]
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            _class: PhantomData,
        }
    }

    /// Locate the presented token: Bearer header first, then the class cookie.
    #[must_use]
    pub fn extract(headers: &HeaderMap) -> Option<String> {
        extract_bearer_token(headers).or_else(|| read_cookie(headers, K::COOKIE))
    }

    /// Verify the token carried by `headers`.
    ///
    /// # Errors
    /// `MissingToken` when no token is presented, `InvalidToken` otherwise.
    pub fn verify(&self, headers: &HeaderMap) -> Result<Identity, VerifyError> {
        let token = Self::extract(headers).ok_or(VerifyError::MissingToken)?;
        self.verify_claims(&token).map(|claims| Identity::from_claims(&claims))
    }

    /// Verify a raw token and return its full claim set.
    ///
    /// # Errors
    /// Returns `InvalidToken` for any decode failure.
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        self.codec.decode(token, K::KIND).map_err(|err| {
            debug!("Rejected {} token: {err}", K::KIND);
            VerifyError::InvalidToken
        })
    }
}

impl From<VerifyError> for GatewayError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::MissingToken => Self::MissingToken,
            VerifyError::InvalidToken => Self::InvalidToken,
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::COOKIE};
    use chrono::Utc;

    const ACCESS_SECRET: &[u8] = b"access-secret-access-secret-0001";
    const REFRESH_SECRET: &[u8] = b"refresh-secret-refresh-secret-01";

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET))
    }

    fn identity() -> Identity {
        Identity::new("user-7".to_string(), vec!["USER".to_string()])
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn valid_bearer_token_yields_identity() {
        let codec = codec();
        let (token, _) = codec.issue(TokenKind::Access, &identity(), 0, 900).unwrap();
        let verifier = AccessVerifier::new(codec);
        assert_eq!(verifier.verify(&bearer(&token)), Ok(identity()));
    }

    #[test]
    fn cookie_is_used_when_no_bearer() {
        let codec = codec();
        let (token, _) = codec.issue(TokenKind::Access, &identity(), 0, 900).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; access_token={token}")).unwrap(),
        );
        let verifier = AccessVerifier::new(codec);
        assert_eq!(verifier.verify(&headers), Ok(identity()));
    }

    #[test]
    fn bearer_takes_precedence_over_cookie() {
        let codec = codec();
        let (token, _) = codec.issue(TokenKind::Access, &identity(), 0, 900).unwrap();
        let mut headers = bearer(&token);
        headers.insert(COOKIE, HeaderValue::from_static("access_token=garbage"));
        let verifier = AccessVerifier::new(codec);
        assert!(verifier.verify(&headers).is_ok());
    }

    #[test]
    fn absent_token_is_missing() {
        let verifier = AccessVerifier::new(codec());
        assert_eq!(
            verifier.verify(&HeaderMap::new()),
            Err(VerifyError::MissingToken)
        );

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(verifier.verify(&headers), Err(VerifyError::MissingToken));
    }

    #[test]
    fn expired_token_is_invalid() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims::new(TokenKind::Access, &identity(), 0, now - 120, 60);
        let token = codec.encode(&claims).unwrap();
        let verifier = AccessVerifier::new(codec);
        assert_eq!(
            verifier.verify(&bearer(&token)),
            Err(VerifyError::InvalidToken)
        );
    }

    #[test]
    fn refresh_verifier_rejects_access_tokens() {
        let codec = codec();
        let (access, _) = codec.issue(TokenKind::Access, &identity(), 0, 900).unwrap();
        let (refresh, _) = codec.issue(TokenKind::Refresh, &identity(), 5, 900).unwrap();
        let verifier = RefreshVerifier::new(codec);
        assert_eq!(
            verifier.verify_claims(&access),
            Err(VerifyError::InvalidToken)
        );
        assert_eq!(verifier.verify_claims(&refresh).unwrap().generation, 5);
    }

    #[test]
    fn refresh_verifier_reads_refresh_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("access_token=a; refresh_token=r"),
        );
        assert_eq!(RefreshVerifier::extract(&headers).as_deref(), Some("r"));
        assert_eq!(AccessVerifier::extract(&headers).as_deref(), Some("a"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bEaReR abc"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
