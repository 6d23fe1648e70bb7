// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over the configured level. JSON output is
/// meant for production, the human-readable format for development.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer().with_target(false).with_filter(env_filter).boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, json = json, "Logging initialized");

    Ok(())
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - scraper_task_runs_total: runs per task and outcome
/// - mqtt_messages_published_total: messages accepted by the MQTT client
/// - mqtt_publish_failures_total: publishes that failed
/// - registered_sensors: sensors announced to the broker
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "scraper_task_runs_total",
        "Total number of scraper task runs by outcome"
    );
    describe_counter!(
        "mqtt_messages_published_total",
        "Total number of messages published to the MQTT broker"
    );
    describe_counter!(
        "mqtt_publish_failures_total",
        "Total number of failed MQTT publishes"
    );
    describe_gauge!(
        "registered_sensors",
        "Number of sensors announced to the broker"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Update the registered sensor gauge
#[inline]
pub fn set_registered_sensors(count: usize) {
    gauge!("registered_sensors").set(count as f64);
}
