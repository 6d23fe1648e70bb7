// Message publisher implementation for MQTT

use crate::broker::mqtt::MqttClient;
use crate::errors::PublishError;
use metrics::counter;
use rumqttc::{AsyncClient, QoS};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Publish capability the rest of the crate depends on
#[async_trait::async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a payload, asking the broker to retain it when `retained` is set
    async fn publish(&self, topic: &str, payload: Vec<u8>, retained: bool)
        -> Result<(), PublishError>;
}

/// MQTT-based publisher, cheap to share between senders
#[derive(Clone)]
pub struct MqttMessagePublisher {
    client: AsyncClient,
    qos: QoS,
    publish_timeout: Duration,
}

impl MqttMessagePublisher {
    /// Create a publisher over an already connected client
    pub fn new(client: &MqttClient) -> Self {
        Self {
            client: client.client().clone(),
            qos: QoS::AtLeastOnce,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait::async_trait]
impl MessagePublisher for MqttMessagePublisher {
    #[instrument(skip(self, payload), fields(payload_bytes = payload.len()))]
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retained: bool,
    ) -> Result<(), PublishError> {
        let request = self.client.publish(topic, self.qos, retained, payload);

        let result = match tokio::time::timeout(self.publish_timeout, request).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PublishError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(PublishError::Timeout(format!(
                "Publish to '{}' not accepted after {:?}",
                topic, self.publish_timeout
            ))),
        };

        match &result {
            Ok(()) => {
                debug!("Message published");
                counter!("mqtt_messages_published_total", "retained" => retained.to_string())
                    .increment(1);
            }
            Err(e) => {
                warn!(error = %e, "Publish failed");
                counter!("mqtt_publish_failures_total").increment(1);
            }
        }

        result
    }
}
