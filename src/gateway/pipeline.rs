//! Request pipeline.
//!
//! A [`RequestContext`] is passed by value through each [`Stage`]. A stage
//! either returns the (possibly enriched) context or a terminal
//! [`GatewayError`], which ends the request before anything reaches the backend.

use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::GatewayError;
use super::forwarder::FORWARDED_FOR_HEADER;
use super::rate_limit::{RateDecision, RateLimiter};
use super::routes::Route;
use super::verifier::{AccessVerifier, Identity};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client: String,
    pub route: Route,
    pub identity: Option<Identity>,
}

impl RequestContext {
    #[must_use]
    pub fn new(client: String, route: Route) -> Self {
        Self {
            client,
            route,
            identity: None,
        }
    }
}

pub trait Stage: Send + Sync {
    /// # Errors
    /// Returns the error that terminates the request.
    fn apply(&self, ctx: RequestContext, headers: &HeaderMap)
    -> Result<RequestContext, GatewayError>;
}

pub struct RateLimitStage {
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitStage {
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn apply(
        &self,
        ctx: RequestContext,
        _headers: &HeaderMap,
    ) -> Result<RequestContext, GatewayError> {
        let Some(class) = ctx.route.rate_class() else {
            return Ok(ctx);
        };

        match self.limiter.check(&ctx.client, class) {
            RateDecision::Allow => Ok(ctx),
            RateDecision::Deny { retry_after } => {
                warn!(client = %ctx.client, ?class, "Rate limit exceeded");
                // Round up so clients never retry inside the window.
                let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Err(GatewayError::RateLimited {
                    retry_after: seconds.max(1),
                })
            }
        }
    }
}

pub struct AccessStage {
    verifier: AccessVerifier,
}

impl AccessStage {
    #[must_use]
    pub fn new(verifier: AccessVerifier) -> Self {
        Self { verifier }
    }
}

impl Stage for AccessStage {
    fn apply(
        &self,
        mut ctx: RequestContext,
        headers: &HeaderMap,
    ) -> Result<RequestContext, GatewayError> {
        if !ctx.route.requires_identity() {
            return Ok(ctx);
        }
        let identity = self.verifier.verify(headers)?;
        debug!(subject = identity.subject_id(), "Access token verified");
        ctx.identity = Some(identity);
        Ok(ctx)
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Rate limiting first, then access verification.
    #[must_use]
    pub fn standard(limiter: Arc<dyn RateLimiter>, verifier: AccessVerifier) -> Self {
        Self::new(vec![
            Box::new(RateLimitStage::new(limiter)),
            Box::new(AccessStage::new(verifier)),
        ])
    }

    /// Run every stage in order, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first stage error.
    pub fn run(
        &self,
        ctx: RequestContext,
        headers: &HeaderMap,
    ) -> Result<RequestContext, GatewayError> {
        self.stages
            .iter()
            .try_fold(ctx, |ctx, stage| stage.apply(ctx, headers))
    }
}

/// Key used for rate limiting and `X-Forwarded-For`.
///
/// Forwarding headers are only honoured when the gateway sits behind a trusted
/// proxy; otherwise a client could pick its own bucket.
#[must_use]
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::config::RatePolicy;
    use crate::gateway::routes::AuthEndpoint;
    use crate::gateway::token::{TokenCodec, TokenKind};
    use crate::gateway::rate_limit::{FixedWindowLimiter, NoopRateLimiter};
    use axum::http::{HeaderValue, header::AUTHORIZATION};
    use std::time::Duration;

    fn pipeline(codec: Arc<TokenCodec>) -> Pipeline {
        Pipeline::standard(
            Arc::new(FixedWindowLimiter::new(
                RatePolicy::new(2, Duration::from_secs(60)),
                RatePolicy::new(1, Duration::from_secs(60)),
            )),
            AccessVerifier::new(codec),
        )
    }

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            b"access-secret-access-secret-0001",
            b"refresh-secret-refresh-secret-01",
        ))
    }

    #[test]
    fn protected_route_gains_identity() {
        let codec = codec();
        let identity = Identity::new("u-1".to_string(), vec!["USER".to_string()]);
        let (token, _) = codec.issue(TokenKind::Access, &identity, 0, 900).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let ctx = pipeline(codec)
            .run(RequestContext::new("c".to_string(), Route::Protected), &headers)
            .unwrap();
        assert_eq!(ctx.identity, Some(identity));
    }

    #[test]
    fn protected_route_without_token_stops() {
        let result = pipeline(codec()).run(
            RequestContext::new("c".to_string(), Route::Protected),
            &HeaderMap::new(),
        );
        assert!(matches!(result, Err(GatewayError::MissingToken)));
    }

    #[test]
    fn rate_limit_runs_before_verification() {
        let pipeline = pipeline(codec());
        let ctx = || RequestContext::new("c".to_string(), Route::Protected);
        // Invalid credentials still consume the general budget.
        for _ in 0..2 {
            assert!(matches!(
                pipeline.run(ctx(), &HeaderMap::new()),
                Err(GatewayError::MissingToken)
            ));
        }
        assert!(matches!(
            pipeline.run(ctx(), &HeaderMap::new()),
            Err(GatewayError::RateLimited { retry_after: 60 })
        ));
    }

    #[test]
    fn auth_routes_skip_verification_and_use_auth_budget() {
        let pipeline = pipeline(codec());
        let ctx = || RequestContext::new("c".to_string(), Route::Auth(AuthEndpoint::Login));
        let first = pipeline.run(ctx(), &HeaderMap::new()).unwrap();
        assert!(first.identity.is_none());
        assert!(matches!(
            pipeline.run(ctx(), &HeaderMap::new()),
            Err(GatewayError::RateLimited { .. })
        ));
    }

    #[test]
    fn health_is_never_limited() {
        let pipeline = pipeline(codec());
        for _ in 0..10 {
            assert!(
                pipeline
                    .run(RequestContext::new("c".to_string(), Route::Health), &HeaderMap::new())
                    .is_ok()
            );
        }
    }

    #[test]
    fn limiter_is_swappable() {
        let pipeline =
            Pipeline::standard(Arc::new(NoopRateLimiter), AccessVerifier::new(codec()));
        let ctx = || RequestContext::new("c".to_string(), Route::Auth(AuthEndpoint::Login));
        for _ in 0..10 {
            assert!(pipeline.run(ctx(), &HeaderMap::new()).is_ok());
        }
    }

    #[test]
    fn client_key_trusts_forwarding_headers_only_when_configured() {
        let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );

        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.5");
        assert_eq!(client_key(&headers, Some(peer), false), "192.0.2.10");

        let mut real_ip = HeaderMap::new();
        real_ip.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&real_ip, None, true), "198.51.100.2");
        assert_eq!(client_key(&HeaderMap::new(), None, false), "unknown");
    }
}
