//! Route classification.
//!
//! Classification is done on the raw request path before any auth logic runs.
//! Paths with dot segments, empty segments or percent-encoded separators are
//! rejected outright, so `/api/../auth/login` can never be read as both a
//! protected and an auth route.

use axum::http::Method;

use super::error::GatewayError;
use super::rate_limit::RateClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Login,
    Refresh,
    Logout,
    /// Any other `/api/auth/*` path, relayed without identity.
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/health`, the only public route.
    Health,
    Auth(AuthEndpoint),
    Protected,
}

impl Route {
    /// Limiter class for the route; `None` means unlimited.
    #[must_use]
    pub fn rate_class(self) -> Option<RateClass> {
        match self {
            Self::Health => None,
            Self::Auth(_) => Some(RateClass::Auth),
            Self::Protected => Some(RateClass::General),
        }
    }

    #[must_use]
    pub fn requires_identity(self) -> bool {
        matches!(self, Self::Protected)
    }

    /// Route template used in spans.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Auth(AuthEndpoint::Login) => "/auth/login",
            Self::Auth(AuthEndpoint::Refresh) => "/auth/refresh",
            Self::Auth(AuthEndpoint::Logout) => "/auth/logout",
            Self::Auth(AuthEndpoint::Passthrough) => "/api/auth/*",
            Self::Protected => "/api/*",
        }
    }
}

fn is_normalized(path: &str) -> bool {
    if !path.starts_with('/') || path.contains('\\') {
        return false;
    }
    let lowered = path.to_ascii_lowercase();
    if lowered.contains("%2e") || lowered.contains("%2f") || lowered.contains("%5c") {
        return false;
    }
    let trimmed = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    trimmed
        .split('/')
        .skip(1)
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

fn auth_endpoint(name: &str) -> Option<AuthEndpoint> {
    match name {
        "login" => Some(AuthEndpoint::Login),
        "refresh" => Some(AuthEndpoint::Refresh),
        "logout" => Some(AuthEndpoint::Logout),
        _ => None,
    }
}

/// Classify a request.
///
/// # Errors
/// `NotFound` for unknown or non-normalized paths, `MethodNotAllowed` when
/// the path is known but the method is not accepted there.
pub fn classify(method: &Method, path: &str) -> Result<Route, GatewayError> {
    if !is_normalized(path) {
        return Err(GatewayError::NotFound);
    }
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };

    if path == "/health" {
        return if method == Method::GET || method == Method::HEAD {
            Ok(Route::Health)
        } else {
            Err(GatewayError::MethodNotAllowed)
        };
    }

    let named = path
        .strip_prefix("/api/auth/")
        .or_else(|| path.strip_prefix("/auth/"))
        .and_then(auth_endpoint);
    if let Some(endpoint) = named {
        return if method == Method::POST {
            Ok(Route::Auth(endpoint))
        } else {
            Err(GatewayError::MethodNotAllowed)
        };
    }

    if path == "/api/auth" || path.starts_with("/api/auth/") {
        return Ok(Route::Auth(AuthEndpoint::Passthrough));
    }

    if path == "/api" || path.starts_with("/api/") {
        return Ok(Route::Protected);
    }

    Err(GatewayError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: Method, path: &str) -> Result<Route, GatewayError> {
        classify(&method, path)
    }

    #[test]
    fn classifies_known_routes() {
        assert!(matches!(route(Method::GET, "/health"), Ok(Route::Health)));
        assert!(matches!(route(Method::HEAD, "/health"), Ok(Route::Health)));
        assert!(matches!(
            route(Method::POST, "/auth/login"),
            Ok(Route::Auth(AuthEndpoint::Login))
        ));
        assert!(matches!(
            route(Method::POST, "/api/auth/refresh"),
            Ok(Route::Auth(AuthEndpoint::Refresh))
        ));
        assert!(matches!(
            route(Method::POST, "/auth/logout"),
            Ok(Route::Auth(AuthEndpoint::Logout))
        ));
        assert!(matches!(
            route(Method::POST, "/api/auth/register"),
            Ok(Route::Auth(AuthEndpoint::Passthrough))
        ));
        assert!(matches!(route(Method::GET, "/api"), Ok(Route::Protected)));
        assert!(matches!(
            route(Method::DELETE, "/api/items/42"),
            Ok(Route::Protected)
        ));
        assert!(matches!(route(Method::GET, "/api/items/"), Ok(Route::Protected)));
    }

    #[test]
    fn wrong_methods_are_rejected() {
        assert!(matches!(
            route(Method::POST, "/health"),
            Err(GatewayError::MethodNotAllowed)
        ));
        assert!(matches!(
            route(Method::GET, "/auth/login"),
            Err(GatewayError::MethodNotAllowed)
        ));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        for path in ["/", "/apix", "/auth/register", "/auth", "/static/app.js", ""] {
            assert!(
                matches!(route(Method::GET, path), Err(GatewayError::NotFound)),
                "{path}"
            );
        }
    }

    #[test]
    fn traversal_is_not_found() {
        for path in [
            "/api/../auth/login",
            "/api/./items",
            "/api//items",
            "/api/%2e%2e/health",
            "/api/%2E/items",
            "/api/a%2fb",
            "/api\\items",
        ] {
            assert!(
                matches!(route(Method::GET, path), Err(GatewayError::NotFound)),
                "{path}"
            );
        }
    }

    #[test]
    fn rate_classes_follow_route() {
        assert_eq!(Route::Health.rate_class(), None);
        assert_eq!(
            Route::Auth(AuthEndpoint::Passthrough).rate_class(),
            Some(RateClass::Auth)
        );
        assert_eq!(Route::Protected.rate_class(), Some(RateClass::General));
        assert!(Route::Protected.requires_identity());
        assert!(!Route::Auth(AuthEndpoint::Login).requires_identity());
    }
}
