use anyhow::Result;
use secrecy::ExposeSecret;
use std::sync::Arc;

use super::backend::{AuthBackend, HttpBackend, ProxyTransport};
use super::config::GatewayConfig;
use super::lifecycle::TokenLifecycle;
use super::pipeline::Pipeline;
use super::rate_limit::{FixedWindowLimiter, RateLimiter};
use super::token::{
    TokenCodec,
    generation::{GenerationStore, MemoryGenerationStore},
};
use super::verifier::AccessVerifier;

/// Shared, read-mostly state behind every request.
pub struct GatewayState {
    config: GatewayConfig,
    pipeline: Pipeline,
    lifecycle: TokenLifecycle,
    transport: Arc<dyn ProxyTransport>,
}

impl GatewayState {
    /// Build state with the HTTP backend, an in-process limiter and an
    /// in-process generation store.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&config)?);
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.general_policy(),
            config.auth_policy(),
        ));
        Self::with_collaborators(
            config,
            backend.clone(),
            backend,
            limiter,
            Arc::new(MemoryGenerationStore::new()),
        )
    }

    /// Build state around caller-provided collaborators.
    ///
    /// # Errors
    /// Returns an error if the config is invalid.
    pub fn with_collaborators(
        config: GatewayConfig,
        transport: Arc<dyn ProxyTransport>,
        auth_backend: Arc<dyn AuthBackend>,
        limiter: Arc<dyn RateLimiter>,
        generations: Arc<dyn GenerationStore>,
    ) -> Result<Self> {
        config.validate()?;

        let codec = Arc::new(TokenCodec::new(
            config.access_secret().expose_secret().as_bytes(),
            config.refresh_secret().expose_secret().as_bytes(),
        ));
        let pipeline = Pipeline::standard(
            limiter,
            AccessVerifier::new(Arc::clone(&codec)),
        );
        let lifecycle = TokenLifecycle::new(
            codec,
            generations,
            auth_backend,
            config.access_token_ttl_seconds(),
            config.refresh_token_ttl_seconds(),
        );

        Ok(Self {
            config,
            pipeline,
            lifecycle,
            transport,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn transport(&self) -> &dyn ProxyTransport {
        self.transport.as_ref()
    }
}
