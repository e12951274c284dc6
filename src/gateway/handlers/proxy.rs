use axum::{extract::Request, response::Response};
use tracing::instrument;

use super::read_body;
use crate::gateway::{
    backend::OutboundRequest, error::GatewayError, forwarder::forward_headers,
    pipeline::RequestContext, state::GatewayState,
};

/// Relay a request that passed the pipeline to the backend.
///
/// Headers are rebuilt by the forwarder; the body is buffered up to the
/// configured limit and the backend response is streamed back.
///
/// # Errors
/// `PayloadTooLarge` over the body limit, `BackendUnavailable` when the
/// backend cannot be reached.
#[instrument(skip_all, fields(client = %ctx.client))]
pub async fn forward(
    state: &GatewayState,
    ctx: RequestContext,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    let headers = forward_headers(&parts.headers, ctx.identity.as_ref(), &ctx.client)?;
    let body = read_body(body, state.config().max_body_bytes()).await?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    state
        .transport()
        .send(OutboundRequest {
            method: parts.method,
            path_and_query,
            headers,
            body,
        })
        .await
}
