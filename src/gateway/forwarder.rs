//! Trust-boundary header rewriting.
//!
//! Outbound headers are built into a fresh map: client-origin identity and
//! credential headers are dropped first, then gateway-asserted identity is
//! injected from the verified [`Identity`] only.

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{AUTHORIZATION, CONNECTION, COOKIE, HOST},
};

use super::cookies::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, without_cookies};
use super::error::GatewayError;
use super::verifier::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Hop-by-hop headers apply to a single connection and are never relayed.
pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    let name = name.as_str();
    HOP_BY_HOP.contains(&name) || name.starts_with("proxy-")
}

fn is_client_identity(name: &HeaderName) -> bool {
    name == AUTHORIZATION || name.as_str().starts_with("x-user-")
}

/// Build the header map sent to the backend.
///
/// # Errors
/// Returns [`GatewayError::Internal`] if an identity value cannot be encoded
/// as a header value.
pub fn forward_headers(
    inbound: &HeaderMap,
    identity: Option<&Identity>,
    client: &str,
) -> Result<HeaderMap, GatewayError> {
    // Headers named in `Connection` are hop-by-hop for this request too.
    let connection_listed: Vec<String> = inbound
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut outbound = HeaderMap::with_capacity(inbound.len() + 3);
    for (name, value) in inbound {
        if name == HOST
            || is_hop_by_hop(name)
            || is_client_identity(name)
            || connection_listed.iter().any(|listed| listed == name.as_str())
        {
            continue;
        }

        if name == COOKIE {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            if let Some(kept) = without_cookies(raw, &[ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME])
                && let Ok(kept) = HeaderValue::from_str(&kept)
            {
                outbound.append(COOKIE, kept);
            }
            continue;
        }

        outbound.append(name.clone(), value.clone());
    }

    let forwarded_for = match inbound
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(prior) if !prior.trim().is_empty() => format!("{}, {client}", prior.trim()),
        _ => client.to_string(),
    };
    outbound.insert(
        FORWARDED_FOR_HEADER,
        HeaderValue::from_str(&forwarded_for)
            .map_err(|err| GatewayError::Internal(format!("invalid x-forwarded-for: {err}")))?,
    );

    if let Some(identity) = identity {
        outbound.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(identity.subject_id())
                .map_err(|err| GatewayError::Internal(format!("invalid subject id: {err}")))?,
        );
        outbound.insert(
            USER_ROLES_HEADER,
            HeaderValue::from_str(&identity.roles().join(","))
                .map_err(|err| GatewayError::Internal(format!("invalid roles: {err}")))?,
        );
    }

    Ok(outbound)
}
