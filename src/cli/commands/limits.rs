use clap::{Arg, ArgMatches, Command};

use crate::gateway::config::{
    DEFAULT_RATE_LIMIT_AUTH_MAX, DEFAULT_RATE_LIMIT_GENERAL_MAX, DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
};

pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_RATE_LIMIT_GENERAL_MAX: &str = "rate-limit-general-max";
pub const ARG_RATE_LIMIT_AUTH_MAX: &str = "rate-limit-auth-max";

#[derive(Debug)]
pub struct Options {
    pub window_seconds: u64,
    pub general_max: u32,
    pub auth_max: u32,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            window_seconds: matches
                .get_one::<u64>(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            general_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_GENERAL_MAX)
                .copied()
                .unwrap_or(DEFAULT_RATE_LIMIT_GENERAL_MAX),
            auth_max: matches
                .get_one::<u32>(ARG_RATE_LIMIT_AUTH_MAX)
                .copied()
                .unwrap_or(DEFAULT_RATE_LIMIT_AUTH_MAX),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Rate limit window in seconds")
                .env("UMBRAL_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_GENERAL_MAX)
                .long(ARG_RATE_LIMIT_GENERAL_MAX)
                .help("Requests per window per client on protected routes")
                .env("UMBRAL_RATE_LIMIT_GENERAL_MAX")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_AUTH_MAX)
                .long(ARG_RATE_LIMIT_AUTH_MAX)
                .help("Requests per window per client on authentication routes")
                .env("UMBRAL_RATE_LIMIT_AUTH_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}
