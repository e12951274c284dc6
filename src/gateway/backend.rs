//! Backend collaborators.
//!
//! [`ProxyTransport`] relays protected requests, [`AuthBackend`] owns the
//! credential check behind login and logout. [`HttpBackend`] implements both
//! over a single `reqwest` client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use reqwest::redirect::Policy;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::config::GatewayConfig;
use super::error::GatewayError;
use super::forwarder::{USER_ID_HEADER, is_hop_by_hop};
use crate::APP_USER_AGENT;

/// A request that already crossed the trust boundary.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path plus optional query, e.g. `/api/items?page=2`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Send `request` to the backend and return its response for relaying.
    async fn send(&self, request: OutboundRequest) -> Result<Response, GatewayError>;
}

/// Status and JSON body of a backend auth call.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Relay the opaque credentials payload to the backend login endpoint.
    async fn login(
        &self,
        payload: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Result<BackendReply, GatewayError>;

    /// Tell the backend a session ended.
    async fn logout(
        &self,
        refresh_token: &str,
        subject_id: Option<&str>,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    /// Whole-call deadline for login and logout.
    auth_timeout: Duration,
    base_url: String,
    login_url: String,
    logout_url: String,
}

impl HttpBackend {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        // Proxied bodies are streamed: bound the connect and each read, not the call.
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(config.backend_timeout())
            .read_timeout(config.backend_timeout())
            .redirect(Policy::none())
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            auth_timeout: config.backend_timeout(),
            base_url: config.backend_url().as_str().trim_end_matches('/').to_string(),
            login_url: config.backend_auth_url("login"),
            logout_url: config.backend_auth_url("logout"),
        })
    }

    fn unavailable(err: &reqwest::Error) -> GatewayError {
        warn!("Backend request failed: {err}");
        GatewayError::BackendUnavailable
    }
}

// Non-JSON bodies are kept as a string so they can still be relayed as details.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl ProxyTransport for HttpBackend {
    async fn send(&self, request: OutboundRequest) -> Result<Response, GatewayError> {
        let url = format!("{}{}", self.base_url, request.path_and_query);
        debug!("Proxying {} {url}", request.method);

        let upstream = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| Self::unavailable(&err))?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if !is_hop_by_hop(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|err| GatewayError::Internal(format!("failed to build response: {err}")))
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(
        &self,
        payload: Bytes,
        content_type: Option<HeaderValue>,
    ) -> Result<BackendReply, GatewayError> {
        let content_type =
            content_type.unwrap_or_else(|| HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(&self.login_url)
            .timeout(self.auth_timeout)
            .header(CONTENT_TYPE, content_type)
            .body(payload)
            .send()
            .await
            .map_err(|err| Self::unavailable(&err))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| Self::unavailable(&err))?;

        Ok(BackendReply {
            status,
            body: parse_body(&bytes),
        })
    }

    async fn logout(
        &self,
        refresh_token: &str,
        subject_id: Option<&str>,
    ) -> Result<(), GatewayError> {
        let mut request = self
            .client
            .post(&self.logout_url)
            .timeout(self.auth_timeout)
            .json(&json!({ "refreshToken": refresh_token }));
        if let Some(subject_id) = subject_id {
            request = request.header(USER_ID_HEADER, subject_id);
        }

        let response = request.send().await.map_err(|err| Self::unavailable(&err))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::BackendRejected {
                status,
                details: Value::Null,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn parse_body_handles_json_text_and_empty() {
        assert_eq!(parse_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(parse_body(b"plain failure"), json!("plain failure"));
        assert_eq!(parse_body(b""), Value::Null);
    }

    #[test]
    fn http_backend_derives_endpoint_urls() {
        let config = GatewayConfig::new(
            "http://backend:8081/",
            SecretString::from("access-secret-access-secret-0001".to_string()),
            SecretString::from("refresh-secret-refresh-secret-01".to_string()),
        )
        .unwrap()
        .with_backend_auth_path("/v1/auth".to_string());
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://backend:8081");
        assert_eq!(backend.login_url, "http://backend:8081/v1/auth/login");
        assert_eq!(backend.logout_url, "http://backend:8081/v1/auth/logout");
        assert_eq!(backend.auth_timeout, config.backend_timeout());
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let config = GatewayConfig::new(
            "http://127.0.0.1:9",
            SecretString::from("access-secret-access-secret-0001".to_string()),
            SecretString::from("refresh-secret-refresh-secret-01".to_string()),
        )
        .unwrap();
        let backend = HttpBackend::new(&config).unwrap();
        let result = backend.login(Bytes::from_static(b"{}"), None).await;
        assert!(matches!(result, Err(GatewayError::BackendUnavailable)));
    }

    #[tokio::test]
    async fn unreachable_backend_fails_proxied_request() {
        let config = GatewayConfig::new(
            "http://127.0.0.1:9",
            SecretString::from("access-secret-access-secret-0001".to_string()),
            SecretString::from("refresh-secret-refresh-secret-01".to_string()),
        )
        .unwrap()
        .with_backend_timeout(Duration::from_secs(2));
        let backend = HttpBackend::new(&config).unwrap();
        let result = backend
            .send(OutboundRequest {
                method: Method::GET,
                path_and_query: "/api/items?page=2".to_string(),
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
            .await;
        assert!(matches!(result, Err(GatewayError::BackendUnavailable)));
    }
}
