// MQTT client connection and event loop driver

use crate::config::MqttConfig;
use crate::errors::PublishError;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, Transport};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Capacity of the request channel between publishers and the event loop
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Pause between polls while the connection is down
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connected MQTT client
///
/// The rumqttc event loop must be polled for requests to reach the broker, so
/// connecting spawns a background task that owns it for the client's lifetime.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: JoinHandle<()>,
}

impl MqttClient {
    /// Connect to the broker and wait for it to accept the session
    #[instrument(skip(config), fields(host = %config.host, port = config.port, tls = config.tls))]
    pub async fn connect(config: MqttConfig) -> Result<Self, PublishError> {
        info!("Connecting to MQTT broker");

        let (client, mut event_loop) =
            AsyncClient::new(mqtt_options(&config), REQUEST_CHANNEL_CAPACITY);

        let connect_timeout = Duration::from_secs(config.connect_timeout_seconds);
        tokio::time::timeout(connect_timeout, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| {
                PublishError::Timeout(format!("No CONNACK received after {:?}", connect_timeout))
            })??;

        info!("Connected to MQTT broker successfully");

        let event_loop = tokio::spawn(drive_event_loop(event_loop));

        Ok(Self { client, event_loop })
    }

    /// Get the underlying client handle
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Send DISCONNECT and stop driving the event loop
    #[instrument(skip(self))]
    pub async fn disconnect(self) -> Result<(), PublishError> {
        info!("Disconnecting from MQTT broker");

        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| PublishError::Connection(format!("Failed to disconnect: {}", e)));

        // Give the event loop a moment to flush the DISCONNECT packet
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.event_loop.abort();

        result
    }
}

/// Build rumqttc options from configuration
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds));

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    if config.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    options
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), PublishError> {
    loop {
        match event_loop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(PublishError::Connection(format!(
                        "Broker refused connection: {:?}",
                        ack.code
                    )))
                };
            }
            event => trace!(?event, "Waiting for CONNACK"),
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "Reconnected to MQTT broker");
            }
            Ok(event) => trace!(?event, "MQTT event"),
            Err(e) => {
                // Polling again reconnects
                warn!(error = %e, "MQTT connection error");
                tokio::time::sleep(RECONNECT_DELAY).await;
                debug!("Retrying MQTT connection");
            }
        }
    }
}
