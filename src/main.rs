use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use request_telemetry::config;
use request_telemetry::http::HttpServer;
use request_telemetry::lifecycle::{shutdown_signal, Shutdown};
use request_telemetry::observability::{exporter, logging, spans, GaugePublisher};
use request_telemetry::sink::{MetricsSink, PointSender, RecorderSink};
use request_telemetry::Instrumentation;

/// Demo service instrumented with request telemetry.
#[derive(Parser, Debug)]
#[command(name = "request-telemetry", version, about)]
struct Args {
    /// Path to a TOML config file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> request_telemetry::Result<()> {
    let args = Args::parse();

    let mut config = config::load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "request-telemetry starting");

    if config.exporter.enabled {
        exporter::install(&config.exporter, config.reporting.interval())?;
    }

    let span_pipeline = spans::init(&config.tracing, &config.application)?;

    let recorder = Arc::new(RecorderSink::new(&config.application));
    let sink: Arc<dyn MetricsSink> = recorder.clone();

    let instrumentation = Arc::new(
        Instrumentation::builder(config.application.clone())
            .source(config.reporting.resolved_source())
            .context(config.reporting.context.clone())
            .tracer(span_pipeline.tracer())
            .sink(sink)
            .build(),
    );
    instrumentation.start();

    let heartbeat = config.heartbeat.enabled.then(|| {
        let sender: Arc<dyn PointSender> = recorder.clone();
        let reporter = instrumentation
            .heartbeat(sender, &config.heartbeat.component)
            .with_schedule(config.heartbeat.warmup(), config.heartbeat.period());
        reporter.start();
        reporter
    });

    let shutdown = Shutdown::new();
    let publisher = GaugePublisher::new(recorder.clone(), config.reporting.interval())
        .spawn(shutdown.subscribe());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&instrumentation, config.server.upstream.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
        Ok(Ok(())) => {}
    }
    instrumentation.stop();
    if let Some(heartbeat) = heartbeat {
        heartbeat.stop();
    }
    if let Err(e) = publisher.await {
        tracing::warn!(error = %e, "Gauge publisher task failed");
    }
    span_pipeline.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}
