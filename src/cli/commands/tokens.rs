use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::gateway::config::Environment;

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_ENVIRONMENT: &str = "environment";

#[derive(Debug)]
pub struct Options {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub environment: Environment,
}

impl Options {
    /// # Errors
    /// Returns an error if a secret is missing or the environment is unknown.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_secret = |id: &str| -> anyhow::Result<SecretString> {
            matches
                .get_one::<String>(id)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone()))
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let environment = matches
            .get_one::<String>(ARG_ENVIRONMENT)
            .map_or("development", String::as_str)
            .parse::<Environment>()
            .context("invalid --environment")?;

        Ok(Self {
            access_secret: read_secret(ARG_ACCESS_TOKEN_SECRET)?,
            refresh_secret: read_secret(ARG_REFRESH_TOKEN_SECRET)?,
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::gateway::config::DEFAULT_ACCESS_TOKEN_TTL_SECONDS),
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::gateway::config::DEFAULT_REFRESH_TOKEN_TTL_SECONDS),
            environment,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HMAC secret for access tokens (at least 32 bytes)")
                .env("UMBRAL_ACCESS_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("HMAC secret for refresh tokens (at least 32 bytes, distinct from the access secret)")
                .env("UMBRAL_REFRESH_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token and cookie lifetime in seconds")
                .env("UMBRAL_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token and cookie lifetime in seconds")
                .env("UMBRAL_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment; production marks cookies Secure")
                .env("UMBRAL_ENV")
                .default_value("development")
                .value_parser(["development", "production", "dev", "prod"]),
        )
}
