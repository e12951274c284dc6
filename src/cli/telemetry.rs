//! Logging and optional OTLP trace export.
//!
//! Export is enabled by `OTEL_EXPORTER_OTLP_ENDPOINT`. Endpoint, headers and
//! timeout are read from the standard `OTEL_EXPORTER_OTLP_*` variables by the
//! exporter itself; `OTEL_SERVICE_NAME` and `OTEL_RESOURCE_ATTRIBUTES` extend
//! the resource.

use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{SdkTracer, SdkTracerProvider},
};
use std::env::var_os;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

static PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

fn filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

fn otlp_tracer() -> Result<SdkTracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(env!("CARGO_PKG_NAME"))
                .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
    let _ = PROVIDER.set(provider);

    Ok(tracer)
}

/// Install the global subscriber. `level` defaults to `ERROR`; `RUST_LOG`
/// directives take precedence.
///
/// # Errors
/// Returns an error if the exporter or the subscriber cannot be installed.
pub fn init(level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .pretty();
    let filter = filter(level.unwrap_or(Level::ERROR))?;
    let registry = Registry::default().with(fmt_layer).with(filter);

    if var_os(OTLP_ENDPOINT_ENV).is_some() {
        let otel_layer = tracing_opentelemetry::layer().with_tracer(otlp_tracer()?);
        tracing::subscriber::set_global_default(registry.with(otel_layer))?;
    } else {
        tracing::subscriber::set_global_default(registry)?;
    }

    Ok(())
}

/// Flush pending spans. Does nothing when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = PROVIDER.get() {
        debug!("Flushing trace exporter");
        let _ = provider.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn filter_uses_requested_level() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = filter(Level::INFO).unwrap();
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        });
    }

    #[test]
    fn rust_log_overrides_level() {
        temp_env::with_var("RUST_LOG", Some("debug"), || {
            let filter = filter(Level::ERROR).unwrap();
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        });
    }

    #[test]
    fn shutdown_without_exporter_is_a_noop() {
        shutdown_tracer();
    }
}
