//! # Umbral (Edge Authentication Gateway)
//!
//! `umbral` sits between untrusted clients and an internal backend. Every
//! request is classified, rate limited and, on protected routes, verified
//! before anything is relayed.
//!
//! ## Tokens
//!
//! The gateway mints its own HS256 access and refresh tokens, each kind signed
//! with a separate secret, and hands them to browsers only as `HttpOnly`
//! cookies. Refresh tokens carry a per-subject generation: refreshing rotates
//! it, logout and login supersede it, and presenting a retired refresh token
//! revokes the whole chain.
//!
//! ## Trust boundary
//!
//! The backend never sees client-supplied `Authorization` or `X-User-*`
//! headers. Identity is asserted by the gateway alone, through `X-User-Id` and
//! `X-User-Roles`, and only after verification in this process.
//!
//! ## Routes
//!
//! - `GET /health`: public, not rate limited.
//! - `POST /auth/{login,refresh,logout}` (also under `/api/auth`): strict rate limit.
//! - `/api/auth/*`: relayed without identity under the strict rate limit.
//! - `/api/*`: requires a valid access token.

pub mod cli;
pub mod gateway;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
