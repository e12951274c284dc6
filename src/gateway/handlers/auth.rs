//! Login, refresh and logout endpoints.
//!
//! Only gateway-minted tokens reach the client, always as `HttpOnly` cookies.
//! Refresh failures and every logout clear both cookies.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use utoipa::ToSchema;

use super::read_body;
use crate::gateway::{
    cookies::{clear_cookie_set, write_cookie_set},
    error::{ErrorBody, GatewayError},
    lifecycle::TokenPair,
    state::GatewayState,
    verifier::RefreshVerifier,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(value_type = Object)]
    pub user: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

/// Optional JSON body accepted by refresh and logout.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

fn ok_with_cookies(headers: HeaderMap) -> Response {
    (StatusCode::OK, headers, Json(OkResponse { ok: true })).into_response()
}

fn cookie_headers(state: &GatewayState, pair: &TokenPair) -> Result<HeaderMap, GatewayError> {
    let lifecycle = state.lifecycle();
    let mut headers = HeaderMap::new();
    write_cookie_set(
        &mut headers,
        pair,
        lifecycle.access_ttl_seconds(),
        lifecycle.refresh_ttl_seconds(),
        state.config().secure_cookies(),
    )
    .map_err(|err| GatewayError::Internal(format!("failed to build cookie: {err}")))?;
    Ok(headers)
}

/// Refresh token from the Bearer header, the `refresh_token` cookie or the
/// JSON body, in that order.
async fn presented_refresh_token(
    state: &GatewayState,
    request: Request,
) -> Result<Option<String>, GatewayError> {
    if let Some(token) = RefreshVerifier::extract(request.headers()) {
        return Ok(Some(token));
    }

    let body = read_body(request.into_body(), state.config().max_body_bytes()).await?;
    if body.is_empty() {
        return Ok(None);
    }
    let parsed: RefreshRequest = serde_json::from_slice(&body).unwrap_or_else(|err| {
        debug!("Ignoring unparsable refresh body: {err}");
        RefreshRequest::default()
    });
    Ok(parsed.refresh_token.filter(|token| !token.trim().is_empty()))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    responses (
        (status = 200, description = "Credentials relayed to the backend were accepted; access and refresh cookies set", body = LoginResponse),
        (status = 401, description = "Backend rejected the credentials", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = ErrorBody),
        (status = 502, description = "Backend unreachable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(state: &GatewayState, request: Request) -> Response {
    let content_type = request.headers().get(CONTENT_TYPE).cloned();
    let payload = match read_body(request.into_body(), state.config().max_body_bytes()).await {
        Ok(payload) => payload,
        Err(err) => return err.into_response(),
    };

    let outcome = match state.lifecycle().login(payload, content_type).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    match cookie_headers(state, &outcome.tokens) {
        Ok(headers) => (
            StatusCode::OK,
            headers,
            Json(LoginResponse { user: outcome.user }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body(content = RefreshRequest, description = "Used only when no header or cookie token is present"),
    responses (
        (status = 200, description = "Token pair rotated; cookies replaced", body = OkResponse),
        (status = 401, description = "No refresh token presented", body = ErrorBody),
        (status = 403, description = "Invalid, expired or reused refresh token", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(state: &GatewayState, request: Request) -> Response {
    let secure = state.config().secure_cookies();
    let rotated = match presented_refresh_token(state, request).await {
        Ok(token) => state.lifecycle().refresh(token.as_deref()).await,
        Err(err) => Err(err),
    };

    match rotated.and_then(|pair| cookie_headers(state, &pair)) {
        Ok(headers) => ok_with_cookies(headers),
        Err(err) => {
            let mut response = err.into_response();
            clear_cookie_set(response.headers_mut(), secure);
            response
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body(content = RefreshRequest, description = "Used only when no header or cookie token is present"),
    responses (
        (status = 200, description = "Logged out; cookies cleared", body = OkResponse)
    ),
    tag = "auth"
)]
pub async fn logout(state: &GatewayState, request: Request) -> Response {
    // Logout always succeeds, even with an oversized or unreadable body.
    let token = presented_refresh_token(state, request)
        .await
        .unwrap_or_else(|err| {
            debug!("Logout without readable token: {err}");
            None
        });
    state.lifecycle().logout(token.as_deref()).await;

    let mut headers = HeaderMap::new();
    clear_cookie_set(&mut headers, state.config().secure_cookies());
    ok_with_cookies(headers)
}
