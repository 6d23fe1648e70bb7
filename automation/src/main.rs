// Home automation binary entry point

use anyhow::Context;
use common::bootstrap::{
    init_messager, init_mqtt_client, setup_healthcheck_variable, setup_train_disruption_tasks,
};
use common::config::Settings;
use common::health::HealthCheckRegistry;
use common::telemetry::{init_logging, init_metrics, set_registered_sensors};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_logging(
        &settings.observability.log_level,
        settings.observability.json_logs,
    )?;

    info!(
        mqtt_host = %settings.mqtt.host,
        mqtt_port = settings.mqtt.port,
        routes = settings.routes.len(),
        "Starting home automation"
    );

    if let Some(port) = settings.observability.metrics_port {
        init_metrics(port)?;
    }

    let mqtt = init_mqtt_client(&settings.mqtt).await?;
    let messager = init_messager(&mqtt);
    let health = HealthCheckRegistry::new();

    let train_scheduler = setup_train_disruption_tasks(&settings, &messager, &health).await?;
    let healthcheck_scheduler = setup_healthcheck_variable(
        &messager,
        &health,
        settings.scheduler.healthcheck_interval(),
        &settings.mqtt.discovery_prefix,
    )
    .await?;

    // Every route sensor plus the health check variable
    set_registered_sensors(settings.routes.len() + 1);
    info!("All sensors registered");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let admin_config = settings.admin.clone();
    let admin_health = health.clone();
    let mut admin = tokio::spawn(async move {
        common::admin::serve(&admin_config, admin_health, async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
    });

    let admin_exited = tokio::select! {
        _ = shutdown_signal() => false,
        result = &mut admin => {
            log_admin_exit(result);
            true
        }
    };

    info!("Initiating graceful shutdown");
    let _ = shutdown_tx.send(true);

    train_scheduler.shutdown().await;
    healthcheck_scheduler.shutdown().await;

    if !admin_exited {
        log_admin_exit(admin.await);
    }

    if let Err(e) = mqtt.disconnect().await {
        warn!(error = %e, "Failed to disconnect from MQTT broker");
    }

    info!("Home automation stopped");
    Ok(())
}

fn log_admin_exit(result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Admin server exited"),
        Ok(Err(e)) => error!(error = %format!("{:#}", e), "Admin server failed"),
        Err(e) => error!(error = %e, "Admin server task panicked"),
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                futures::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
