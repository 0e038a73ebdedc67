//! Tracing setup, with optional OpenTelemetry export.

use crate::config::{LoggingSettings, OtlpProtocol, TelemetrySettings};
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the tracer provider alive.
///
/// When dropped, flushes pending spans and shuts the provider down.
pub struct TelemetryGuard {
    provider: TracerProvider,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}

/// Build an OTLP tracer provider, or `None` when telemetry is disabled.
pub fn init_telemetry(
    settings: &TelemetrySettings,
) -> Result<Option<TracerProvider>, Box<dyn std::error::Error>> {
    if !settings.enabled {
        return Ok(None);
    }

    let exporter = match settings.protocol {
        OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(settings.otlp_endpoint.as_str())
            .build()?,
        OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(settings.otlp_endpoint.as_str())
            .build()?,
    };

    let resource = Resource::new(vec![
        KeyValue::new("service.name", settings.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(Some(provider))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. With telemetry disabled this is
/// plain `common::logging`; otherwise spans are also exported over OTLP.
pub fn setup_tracing(
    logging: &LoggingSettings,
    telemetry: &TelemetrySettings,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    let level = logging.level_or_default();
    let json = logging.is_json();

    let Some(provider) = init_telemetry(telemetry)? else {
        common::logging::init_with_level(level, json);
        tracing::info!("Tracing initialized without OpenTelemetry");
        return Ok(None);
    };

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(telemetry.service_name.clone()));
    let registry = tracing_subscriber::registry()
        .with(common::logging::env_filter(level))
        .with(otel_layer);

    if json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }

    tracing::info!(
        service_name = %telemetry.service_name,
        otlp_endpoint = %telemetry.otlp_endpoint,
        "Tracing initialized with OpenTelemetry export"
    );
    Ok(Some(TelemetryGuard { provider }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_telemetry_disabled() {
        let result = init_telemetry(&TelemetrySettings::default());
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_telemetry_http_disabled() {
        let settings = TelemetrySettings {
            protocol: OtlpProtocol::Http,
            otlp_endpoint: "http://localhost:4318/v1/traces".to_string(),
            ..Default::default()
        };
        assert!(init_telemetry(&settings).unwrap().is_none());
    }
}
