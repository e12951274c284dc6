use crate::gateway::{
    self,
    config::{Environment, GatewayConfig, RatePolicy},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub backend_auth_path: String,
    pub backend_timeout_seconds: u64,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub environment: Environment,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_general_max: u32,
    pub rate_limit_auth_max: u32,
    pub trust_forwarded_for: bool,
    pub max_body_bytes: usize,
    pub frontend_origin: Option<String>,
}

impl Args {
    /// Build and validate the gateway configuration.
    ///
    /// # Errors
    /// Returns an error if any value is rejected by [`GatewayConfig::validate`].
    pub fn gateway_config(self) -> Result<GatewayConfig> {
        let window = Duration::from_secs(self.rate_limit_window_seconds);
        let config = GatewayConfig::new(
            &self.backend_url,
            self.access_token_secret,
            self.refresh_token_secret,
        )?
        .with_backend_auth_path(self.backend_auth_path)
        .with_backend_timeout(Duration::from_secs(self.backend_timeout_seconds))
        .with_access_token_ttl_seconds(self.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(self.refresh_token_ttl_seconds)
        .with_environment(self.environment)
        .with_general_policy(RatePolicy::new(self.rate_limit_general_max, window))
        .with_auth_policy(RatePolicy::new(self.rate_limit_auth_max, window))
        .with_trust_forwarded_for(self.trust_forwarded_for)
        .with_max_body_bytes(self.max_body_bytes)
        .with_frontend_origin(self.frontend_origin);

        config.validate().context("Invalid gateway configuration")?;
        Ok(config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let config = args.gateway_config()?;

    debug!("Gateway configuration: {config:?}");

    gateway::new(port, config).await
}
