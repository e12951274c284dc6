use clap::{Arg, ArgAction, ArgMatches, Command, builder::BoolishValueParser};

use crate::gateway::config::{
    DEFAULT_BACKEND_AUTH_PATH, DEFAULT_BACKEND_TIMEOUT_SECONDS, DEFAULT_MAX_BODY_BYTES,
};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_AUTH_PATH: &str = "backend-auth-path";
pub const ARG_BACKEND_TIMEOUT_SECONDS: &str = "backend-timeout-seconds";
pub const ARG_MAX_BODY_BYTES: &str = "max-body-bytes";
pub const ARG_TRUST_FORWARDED_FOR: &str = "trust-forwarded-for";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub auth_path: String,
    pub timeout_seconds: u64,
    pub max_body_bytes: usize,
    pub trust_forwarded_for: bool,
    pub frontend_origin: Option<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if the backend URL is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = match matches.get_one::<String>(ARG_BACKEND_URL).cloned() {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_BACKEND_URL}"),
        };

        Ok(Self {
            url,
            auth_path: matches
                .get_one::<String>(ARG_BACKEND_AUTH_PATH)
                .cloned()
                .unwrap_or_else(|| DEFAULT_BACKEND_AUTH_PATH.to_string()),
            timeout_seconds: matches
                .get_one::<u64>(ARG_BACKEND_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECONDS),
            max_body_bytes: matches
                .get_one::<usize>(ARG_MAX_BODY_BYTES)
                .copied()
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            trust_forwarded_for: matches.get_flag(ARG_TRUST_FORWARDED_FOR),
            // Env vars set to "" come through as empty strings.
            frontend_origin: matches
                .get_one::<String>(ARG_FRONTEND_ORIGIN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Base URL of the backend service, example: http://backend:8081")
                .env("UMBRAL_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_AUTH_PATH)
                .long(ARG_BACKEND_AUTH_PATH)
                .help("Backend path holding the login and logout endpoints")
                .env("UMBRAL_BACKEND_AUTH_PATH")
                .default_value(DEFAULT_BACKEND_AUTH_PATH),
        )
        .arg(
            Arg::new(ARG_BACKEND_TIMEOUT_SECONDS)
                .long(ARG_BACKEND_TIMEOUT_SECONDS)
                .help("Timeout for backend requests in seconds")
                .env("UMBRAL_BACKEND_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MAX_BODY_BYTES)
                .long(ARG_MAX_BODY_BYTES)
                .help("Largest request body relayed to the backend, in bytes")
                .env("UMBRAL_MAX_BODY_BYTES")
                .default_value("10485760")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_TRUST_FORWARDED_FOR)
                .long(ARG_TRUST_FORWARDED_FOR)
                .help("Use X-Forwarded-For / X-Real-IP as the client address (only behind a trusted proxy)")
                .env("UMBRAL_TRUST_FORWARDED_FOR")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Browser origin allowed to call the gateway with credentials (enables CORS)")
                .env("UMBRAL_FRONTEND_ORIGIN"),
        )
}
