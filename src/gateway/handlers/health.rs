use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    name: String,
    version: String,
    build: String,
    timestamp: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses (
        (status = 200, description = "Gateway is up", body = Health),
    ),
    tag = "health"
)]
pub async fn health(method: Method) -> Response {
    let health = Health {
        status: "ok".to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: GIT_COMMIT_HASH.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let short_hash = health.build.get(0..7).unwrap_or_default();
    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    if method == Method::HEAD {
        (StatusCode::OK, headers, Body::empty()).into_response()
    } else {
        (StatusCode::OK, headers, Json(&health)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[tokio::test]
    async fn health_reports_build_info() {
        let response = health(Method::GET).await;
        assert_eq!(response.status(), StatusCode::OK);

        let x_app = response.headers().get("X-App").unwrap().to_str().unwrap();
        assert!(x_app.starts_with(concat!(
            env!("CARGO_PKG_NAME"),
            ":",
            env!("CARGO_PKG_VERSION"),
            ":"
        )));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["build"], GIT_COMMIT_HASH);
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn head_has_no_body() {
        let response = health(Method::HEAD).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
