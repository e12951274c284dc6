//! Token cookies: building `Set-Cookie` values and reading the `Cookie` header.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};

use super::lifecycle::TokenPair;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Build a `HttpOnly`, `SameSite=Lax` cookie; `Secure` only in production.
pub(crate) fn token_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Append both token cookies for a freshly issued pair.
pub(crate) fn write_cookie_set(
    headers: &mut HeaderMap,
    pair: &TokenPair,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    secure: bool,
) -> Result<(), InvalidHeaderValue> {
    headers.append(
        SET_COOKIE,
        token_cookie(
            ACCESS_COOKIE_NAME,
            &pair.access_token,
            access_ttl_seconds,
            secure,
        )?,
    );
    headers.append(
        SET_COOKIE,
        token_cookie(
            REFRESH_COOKIE_NAME,
            &pair.refresh_token,
            refresh_ttl_seconds,
            secure,
        )?,
    );
    Ok(())
}

/// Append expired, empty token cookies so the browser drops both.
pub(crate) fn clear_cookie_set(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(cookie) = token_cookie(name, "", 0, secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }
}

/// Find a cookie value by name across all `Cookie` headers.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// Rebuild a `Cookie` header without the named cookies.
///
/// Returns `None` when nothing is left to send.
pub(crate) fn without_cookies(value: &str, names: &[&str]) -> Option<String> {
    let kept: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key).trim();
            !names.contains(&key)
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_cookie_has_security_attributes() {
        let cookie = token_cookie(ACCESS_COOKIE_NAME, "abc", 900, false).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert_eq!(
            cookie,
            "access_token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=900"
        );

        let secure = token_cookie(REFRESH_COOKIE_NAME, "xyz", 604_800, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("Max-Age=604800; Secure"));
    }

    #[test]
    fn clear_cookie_set_expires_both() {
        let mut headers = HeaderMap::new();
        clear_cookie_set(&mut headers, false);
        let cookies: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=;")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=;")));
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[test]
    fn read_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=tok123; refresh_token=ref"),
        );
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE_NAME).as_deref(), Some("tok123"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE_NAME).as_deref(), Some("ref"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn read_cookie_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token=; other=1"));
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE_NAME), None);
    }

    #[test]
    fn without_cookies_drops_credentials_only() {
        let value = "theme=dark; access_token=a; lang=en; refresh_token=r";
        assert_eq!(
            without_cookies(value, &[ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME]).as_deref(),
            Some("theme=dark; lang=en")
        );
        assert_eq!(
            without_cookies("access_token=a", &[ACCESS_COOKIE_NAME]),
            None
        );
    }
}
