//! The gateway service: routing, credential checks and backend relaying.

pub mod backend;
pub mod config;
pub mod cookies;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod lifecycle;
pub mod openapi;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod token;
pub mod verifier;

use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

pub use config::GatewayConfig;
pub use state::GatewayState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the gateway router around `state`.
///
/// All paths go through a single dispatcher so that classification, not the
/// router, decides what is public, auth or protected.
///
/// # Errors
/// Returns an error if the configured frontend origin is invalid.
pub fn router(state: Arc<GatewayState>) -> Result<Router> {
    let cors = state
        .config()
        .frontend_origin()
        .map(|origin| -> Result<CorsLayer> {
            Ok(CorsLayer::new()
                .allow_headers([CONTENT_TYPE, AUTHORIZATION])
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_origin(AllowOrigin::exact(frontend_origin(origin)?))
                .allow_credentials(true))
        })
        .transpose()?;

    let mut app = Router::new().fallback(handlers::dispatch);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    Ok(app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID_HEADER),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID_HEADER,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: GatewayConfig) -> Result<()> {
    let state = Arc::new(GatewayState::new(config).context("Failed to build gateway state")?);
    info!("Relaying to backend {}", state.config().backend_url());

    let app = router(state)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Gracefully shutdown");
        }
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let route = routes::classify(request.method(), request.uri().path())
        .map_or("unmatched", |route| route.name());

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = route,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend origin: {frontend_base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_drops_path() {
        let origin = frontend_origin("https://app.example.com:8443/login").unwrap();
        assert_eq!(origin, "https://app.example.com:8443");
        assert!(frontend_origin("not a url").is_err());
    }
}
