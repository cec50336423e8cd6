//! OpenTelemetry span pipeline for the binary.
//!
//! Spans are batched to an OTLP collector when one is configured. Without a
//! collector the provider has no processors: spans still carry ids for
//! `traceparent` propagation and are dropped when they end.

use std::sync::Arc;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};

use crate::config::TracingConfig;
use crate::error::{Result, TelemetryError};
use crate::tags::ApplicationIdentity;
use crate::tracer::{NoopTracer, OtelTracer, Tracer};

const TRACER_NAME: &str = "request-telemetry";

/// The tracer handed to `Instrumentation` plus the provider that owns its
/// export pipeline.
pub struct SpanPipeline {
    tracer: Arc<dyn Tracer>,
    provider: Option<TracerProvider>,
}

impl SpanPipeline {
    pub fn tracer(&self) -> Arc<dyn Tracer> {
        self.tracer.clone()
    }

    /// Flush pending spans and stop the exporter.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Span pipeline shutdown failed");
            }
        }
    }
}

/// Build the span pipeline. Must run inside a Tokio runtime when an OTLP
/// endpoint is configured.
pub fn init(config: &TracingConfig, identity: &ApplicationIdentity) -> Result<SpanPipeline> {
    if !config.enabled {
        tracing::info!("Tracing disabled");
        return Ok(SpanPipeline {
            tracer: Arc::new(NoopTracer),
            provider: None,
        });
    }

    let resource = Resource::new(vec![
        KeyValue::new("service.name", identity.service.clone()),
        KeyValue::new("service.namespace", identity.application.clone()),
    ]);
    let mut builder = TracerProvider::builder().with_resource(resource);

    match &config.otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
            builder = builder.with_batch_exporter(exporter, runtime::Tokio);
            tracing::info!(endpoint = %endpoint, "Exporting spans over OTLP");
        }
        None => tracing::warn!("No OTLP endpoint configured, spans are not exported"),
    }

    let provider = builder.build();
    Ok(SpanPipeline {
        tracer: Arc::new(OtelTracer::new(provider.tracer(TRACER_NAME))),
        provider: Some(provider),
    })
}
