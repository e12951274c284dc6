//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an [`Action`], here always the gateway server
//! with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, backend, limits, tokens};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3000);

    let backend_opts = backend::Options::parse(matches)?;
    let token_opts = tokens::Options::parse(matches)?;
    let limit_opts = limits::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        backend_url: backend_opts.url,
        backend_auth_path: backend_opts.auth_path,
        backend_timeout_seconds: backend_opts.timeout_seconds,
        access_token_secret: token_opts.access_secret,
        refresh_token_secret: token_opts.refresh_secret,
        access_token_ttl_seconds: token_opts.access_ttl_seconds,
        refresh_token_ttl_seconds: token_opts.refresh_ttl_seconds,
        environment: token_opts.environment,
        rate_limit_window_seconds: limit_opts.window_seconds,
        rate_limit_general_max: limit_opts.general_max,
        rate_limit_auth_max: limit_opts.auth_max,
        trust_forwarded_for: backend_opts.trust_forwarded_for,
        max_body_bytes: backend_opts.max_body_bytes,
        frontend_origin: backend_opts.frontend_origin,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::Environment;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_args() {
        temp_env::with_vars(
            [
                ("UMBRAL_BACKEND_URL", Some("http://backend:8081")),
                (
                    "UMBRAL_ACCESS_TOKEN_SECRET",
                    Some("access-secret-access-secret-0001"),
                ),
                (
                    "UMBRAL_REFRESH_TOKEN_SECRET",
                    Some("refresh-secret-refresh-secret-01"),
                ),
                ("UMBRAL_ENV", Some("prod")),
                ("UMBRAL_FRONTEND_ORIGIN", Some("")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["umbral"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.backend_url, "http://backend:8081");
                    assert_eq!(args.environment, Environment::Production);
                    assert_eq!(
                        args.access_token_secret.expose_secret(),
                        "access-secret-access-secret-0001"
                    );
                    assert_eq!(args.frontend_origin, None);
                    assert_eq!(args.rate_limit_auth_max, 5);
                }
            },
        );
    }

    #[test]
    fn empty_backend_url_is_rejected() {
        temp_env::with_vars(
            [
                ("UMBRAL_BACKEND_URL", Some(" ")),
                (
                    "UMBRAL_ACCESS_TOKEN_SECRET",
                    Some("access-secret-access-secret-0001"),
                ),
                (
                    "UMBRAL_REFRESH_TOKEN_SECRET",
                    Some("refresh-secret-refresh-secret-01"),
                ),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["umbral"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --backend-url")
                    );
                }
            },
        );
    }
}
