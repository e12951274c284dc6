//! Request dispatch.
//!
//! Every request lands in [`dispatch`], which classifies the path, runs the
//! pipeline and hands the resulting context to the matching endpoint.

pub mod auth;
pub mod health;
pub mod proxy;

use axum::{
    Extension,
    body::{Body, Bytes, to_bytes},
    extract::{ConnectInfo, Request},
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;

use super::{
    error::GatewayError,
    pipeline::{RequestContext, client_key},
    routes::{AuthEndpoint, Route, classify},
    state::GatewayState,
};

/// Buffer a request body, failing once it exceeds `limit` bytes.
pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    to_bytes(body, limit).await.map_err(|err| {
        debug!("Failed to read request body: {err}");
        GatewayError::PayloadTooLarge
    })
}

pub async fn dispatch(Extension(state): Extension<Arc<GatewayState>>, request: Request) -> Response {
    let route = match classify(request.method(), request.uri().path()) {
        Ok(route) => route,
        Err(err) => return err.into_response(),
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer, state.config().trust_forwarded_for());

    let ctx = match state
        .pipeline()
        .run(RequestContext::new(client, route), request.headers())
    {
        Ok(ctx) => ctx,
        Err(err) => return err.into_response(),
    };

    match ctx.route {
        Route::Health => health::health(request.method().clone()).await,
        Route::Auth(AuthEndpoint::Login) => auth::login(&state, request).await,
        Route::Auth(AuthEndpoint::Refresh) => auth::refresh(&state, request).await,
        Route::Auth(AuthEndpoint::Logout) => auth::logout(&state, request).await,
        Route::Auth(AuthEndpoint::Passthrough) | Route::Protected => {
            proxy::forward(&state, ctx, request)
                .await
                .unwrap_or_else(IntoResponse::into_response)
        }
    }
}
