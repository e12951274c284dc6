//! Gateway error taxonomy and its wire representation.
//!
//! Every rejection leaves the gateway as `{ "error": kind, "message": text }`
//! so clients can tell "you are not allowed" (401/403/429) apart from "the
//! system is broken" (5xx). Internal detail is logged, never rendered.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Access token required")]
    MissingToken,
    #[error("Invalid or expired access token")]
    InvalidToken,
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("Too many requests, please try again later")]
    RateLimited { retry_after: u64 },
    #[error("Gateway service unavailable")]
    BackendUnavailable,
    #[error("Backend rejected the request")]
    BackendRejected { status: StatusCode, details: Value },
    #[error("Route not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Internal server error")]
    Internal(String),
}

/// Structured error body returned for every gateway-level failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl GatewayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken | Self::InvalidRefreshToken => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendUnavailable => StatusCode::BAD_GATEWAY,
            Self::BackendRejected { status, .. } => *status,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::RateLimited { .. } => "rate_limited",
            Self::BackendUnavailable => "backend_unavailable",
            Self::BackendRejected { .. } => "backend_rejected",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Internal(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            details: match self {
                Self::BackendRejected { details, .. } if !details.is_null() => {
                    Some(details.clone())
                }
                _ => None,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::Internal(reason) = &self {
            tracing::error!("Internal gateway error: {reason}");
        }

        let mut response = (self.status(), Json(self.body())).into_response();
        if let Self::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn render(error: GatewayError) -> (StatusCode, Value, Response) {
        let response = error.into_response();
        let status = response.status();
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        (status, value, Response::from_parts(parts, axum::body::Body::empty()))
    }

    #[tokio::test]
    async fn auth_failures_map_to_401_and_403() {
        let (status, body, _) = render(GatewayError::MissingToken).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_token");

        let (status, body, _) = render(GatewayError::InvalidToken).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "invalid_token");

        let (status, body, _) = render(GatewayError::InvalidRefreshToken).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "invalid_refresh_token");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let (status, body, response) = render(GatewayError::RateLimited { retry_after: 42 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "rate_limited");
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("42")
        );
    }

    #[tokio::test]
    async fn internal_detail_is_not_rendered() {
        let (status, body, _) =
            render(GatewayError::Internal("secret stack detail".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("secret stack detail"));
    }

    #[tokio::test]
    async fn backend_rejection_relays_status_and_details() {
        let (status, body, _) = render(GatewayError::BackendRejected {
            status: StatusCode::UNAUTHORIZED,
            details: json!({"error": "Bad credentials"}),
        })
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "backend_rejected");
        assert_eq!(body["details"]["error"], "Bad credentials");
    }

    #[tokio::test]
    async fn backend_unavailable_is_a_gateway_error() {
        let (status, body, _) = render(GatewayError::BackendUnavailable).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "backend_unavailable");
    }
}
