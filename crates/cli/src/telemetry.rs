//! Tracing subscriber and optional OpenTelemetry export.

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::TelemetryConfig;

/// Keeps the span exporter alive until [`Telemetry::shutdown`].
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

fn otlp_provider(endpoint: &str, service_name: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("building OTLP span exporter")?;
    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build())
}

impl Telemetry {
    /// Installs the global subscriber: `RUST_LOG` filter (default `info`),
    /// JSON events on stderr, and span export when an OTLP endpoint is set.
    pub fn init(config: &TelemetryConfig) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let provider = config
            .otlp_endpoint
            .as_deref()
            .map(|endpoint| otlp_provider(endpoint, &config.service_name))
            .transpose()?;
        let otel = provider.as_ref().map(|p| {
            tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone()))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(otel)
            .try_init()
            .context("installing tracing subscriber")?;
        Ok(Self { provider })
    }

    /// Flushes pending spans.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush telemetry: {e}");
            }
        }
    }
}
