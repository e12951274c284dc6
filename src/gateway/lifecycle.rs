//! Token pair lifecycle: issue on login, rotate on refresh, revoke on logout.

use axum::{body::Bytes, http::HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::backend::AuthBackend;
use super::error::GatewayError;
use super::token::{TokenCodec, TokenKind, generation::GenerationStore};
use super::verifier::{Identity, RefreshVerifier};

/// Access and refresh token minted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

#[derive(Debug)]
pub struct LoginOutcome {
    /// The backend's user object, relayed to the client as-is.
    pub user: Value,
    pub identity: Identity,
    pub tokens: TokenPair,
}

pub struct TokenLifecycle {
    codec: Arc<TokenCodec>,
    verifier: RefreshVerifier,
    generations: Arc<dyn GenerationStore>,
    backend: Arc<dyn AuthBackend>,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenLifecycle {
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        generations: Arc<dyn GenerationStore>,
        backend: Arc<dyn AuthBackend>,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Self {
        Self {
            verifier: RefreshVerifier::new(Arc::clone(&codec)),
            codec,
            generations,
            backend,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    fn issue_pair(&self, identity: &Identity, generation: u64) -> Result<TokenPair, GatewayError> {
        let (access_token, access) = self
            .codec
            .issue(TokenKind::Access, identity, generation, self.access_ttl_seconds)
            .map_err(|err| GatewayError::Internal(format!("access token: {err}")))?;
        let (refresh_token, refresh) = self
            .codec
            .issue(TokenKind::Refresh, identity, generation, self.refresh_ttl_seconds)
            .map_err(|err| GatewayError::Internal(format!("refresh token: {err}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access.exp,
            refresh_expires_at: refresh.exp,
        })
    }

    /// Check credentials with the backend and start a new token chain.
    ///
    /// # Errors
    /// `BackendRejected` relays a non-2xx backend answer, `BackendUnavailable`
    /// covers transport failures and replies without a usable user id.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        payload: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Result<LoginOutcome, GatewayError> {
        let reply = self.backend.login(payload, content_type).await?;
        if !reply.status.is_success() {
            info!("Backend rejected login with status {}", reply.status);
            return Err(GatewayError::BackendRejected {
                status: reply.status,
                details: reply.body,
            });
        }

        let Some((identity, user)) = identity_from_reply(&reply.body) else {
            warn!("Backend login reply carried no user id");
            return Err(GatewayError::BackendUnavailable);
        };

        let generation = self.generations.advance(identity.subject_id()).await;
        let tokens = self.issue_pair(&identity, generation)?;
        info!(subject = identity.subject_id(), "Login succeeded");

        Ok(LoginOutcome {
            user,
            identity,
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, retiring the presented one.
    ///
    /// # Errors
    /// `MissingToken` without a token, `InvalidRefreshToken` when the token
    /// fails to decode or belongs to a retired generation.
    #[instrument(skip_all)]
    pub async fn refresh(&self, token: Option<&str>) -> Result<TokenPair, GatewayError> {
        let token = token.ok_or(GatewayError::MissingToken)?;
        let claims = self
            .verifier
            .verify_claims(token)
            .map_err(|_| GatewayError::InvalidRefreshToken)?;

        let Some(next) = self.generations.rotate(&claims.sub, claims.generation).await else {
            // A retired token came back: end the whole chain.
            warn!(subject = %claims.sub, "Refresh token reuse detected, revoking chain");
            self.generations.revoke(&claims.sub).await;
            return Err(GatewayError::InvalidRefreshToken);
        };

        self.issue_pair(&Identity::from_claims(&claims), next)
    }

    /// End the session. Never fails: local revocation happens when the token
    /// verifies, and backend errors are logged and swallowed.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: Option<&str>) {
        let Some(token) = token else {
            return;
        };

        let subject = match self.verifier.verify_claims(token) {
            Ok(claims) => {
                self.generations.revoke(&claims.sub).await;
                info!(subject = %claims.sub, "Logout revoked refresh chain");
                Some(claims.sub)
            }
            Err(_) => None,
        };

        if let Err(err) = self.backend.logout(token, subject.as_deref()).await {
            warn!("Backend logout failed: {err}");
        }
    }
}

/// Pull the subject and roles out of a successful backend login reply.
///
/// The user object is `user` or `userInfo`; its id is `userId`, `id` or `sub`.
/// Roles come from a top-level `roles` array, falling back to the user object.
pub(crate) fn identity_from_reply(body: &Value) -> Option<(Identity, Value)> {
    let user = body
        .get("user")
        .or_else(|| body.get("userInfo"))
        .filter(|user| user.is_object())?;

    let subject_id = ["userId", "id", "sub"]
        .iter()
        .find_map(|key| match user.get(*key)? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })?;

    let roles = body
        .get("roles")
        .or_else(|| user.get("roles"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some((Identity::new(subject_id, roles), user.clone()))
}
