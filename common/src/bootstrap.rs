// Bootstrap utilities wiring sensors, tasks and health checks together

use crate::broker::{MessagePublisher, MqttClient, MqttMessagePublisher};
use crate::config::{MqttConfig, Settings};
use crate::health::HealthCheckRegistry;
use crate::integrations::trains::{http_client, TrainRoute};
use crate::messager::Messager;
use crate::scheduler::{ScraperTask, TaskScheduler};
use crate::sensor::{BinarySensor, Publishable};
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Sensor carrying the aggregate health of every registered check
pub const HEALTHCHECK_SENSOR: &str = "automation-health-check";

/// Prefix of the sensor name derived from a route name
pub const TRAIN_ROUTE_PREFIX: &str = "train-route-";

const TRAIN_DEVICE_CLASS: &str = "motion";
const HEALTHCHECK_DEVICE_CLASS: &str = "none";
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect to the MQTT broker
///
/// Registrations publish immediately, so this must complete first.
#[tracing::instrument(skip(config))]
pub async fn init_mqtt_client(config: &MqttConfig) -> Result<MqttClient> {
    let client = MqttClient::connect(config.clone())
        .await
        .context("Failed to connect to MQTT broker")?;

    info!("MQTT client initialized");
    Ok(client)
}

/// Build the messager over a connected client
pub fn init_messager(client: &MqttClient) -> Messager {
    let publisher = Arc::new(MqttMessagePublisher::new(client)) as Arc<dyn MessagePublisher>;
    Messager::new(publisher)
}

/// Register a binary sensor, then poll `producer` into it on `scheduler`
///
/// The task is registered as a health check under the sensor name. The name
/// is claimed first, so a duplicate fails before anything is announced or
/// scheduled.
pub async fn start_binary_sensor_task<F, Fut>(
    messager: &Messager,
    scheduler: &TaskScheduler,
    health: &HealthCheckRegistry,
    sensor: BinarySensor,
    period: Duration,
    producer: F,
) -> Result<Arc<ScraperTask>>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    let name = sensor.name().to_string();
    let task = ScraperTask::new(name.clone());

    health
        .register(name.clone(), task.clone())
        .await
        .with_context(|| format!("Failed to register health check for sensor {}", name))?;

    let sender = match messager.register(sensor).await {
        Ok(sender) => sender,
        Err(e) => {
            health.unregister(&name).await;
            return Err(e).with_context(|| format!("Failed to register sensor {}", name));
        }
    };

    task.start(scheduler, period, move || {
        let sender = sender.clone();
        let value = producer();
        async move {
            let value = value.await?;
            sender.send(value).await?;
            anyhow::Ok(())
        }
    })
    .await;

    Ok(task)
}

/// Start one disruption sensor per configured route
#[tracing::instrument(skip_all, fields(routes = settings.routes.len()))]
pub async fn setup_train_disruption_tasks(
    settings: &Settings,
    messager: &Messager,
    health: &HealthCheckRegistry,
) -> Result<TaskScheduler> {
    let scheduler = TaskScheduler::new("train-disruption");
    let client = http_client(SCRAPE_TIMEOUT).context("Failed to create HTTP client")?;

    for route_config in &settings.routes {
        let name = format!("{}{}", TRAIN_ROUTE_PREFIX, route_config.name);
        let route = Arc::new(TrainRoute::with_client(
            client.clone(),
            &route_config.from,
            &route_config.to,
        ));
        let url = route.url().to_string();
        let sensor = BinarySensor::new(&name, TRAIN_DEVICE_CLASS)
            .with_discovery_prefix(&settings.mqtt.discovery_prefix);

        start_binary_sensor_task(
            messager,
            &scheduler,
            health,
            sensor,
            settings.scheduler.train_ping_period(),
            move || {
                let route = Arc::clone(&route);
                async move { anyhow::Ok(route.is_service_disrupted().await?) }
            },
        )
        .await?;

        info!(sensor = %name, url = %url, "Train route monitored");
    }

    Ok(scheduler)
}

/// Publish whether every health check passes, on a fixed delay
///
/// The first update happens one interval after startup.
#[tracing::instrument(skip(messager, health))]
pub async fn setup_healthcheck_variable(
    messager: &Messager,
    health: &HealthCheckRegistry,
    interval: Duration,
    discovery_prefix: &str,
) -> Result<TaskScheduler> {
    let scheduler = TaskScheduler::new("healthcheck");
    let sensor = BinarySensor::new(HEALTHCHECK_SENSOR, HEALTHCHECK_DEVICE_CLASS)
        .with_discovery_prefix(discovery_prefix);
    let sender = messager
        .register(sensor)
        .await
        .context("Failed to register health check sensor")?;

    let health = health.clone();
    scheduler
        .schedule_with_fixed_delay(HEALTHCHECK_SENSOR, interval, interval, move || {
            let sender = sender.clone();
            let health = health.clone();
            async move {
                let healthy = health.all_healthy().await;
                sender
                    .send(healthy)
                    .await
                    .context("Could not update healthcheck variable")?;
                anyhow::Ok(())
            }
        })
        .await;

    Ok(scheduler)
}
