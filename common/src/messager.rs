// Sensor registration and state publishing

use crate::broker::MessagePublisher;
use crate::errors::{PublishError, RegistrationError};
use crate::message::Message;
use crate::sensor::Publishable;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Announces sensors to the broker and hands out typed senders for them
///
/// Holds nothing but the shared publisher: every registration is independent
/// and nothing is remembered about previously registered sensors.
#[derive(Clone)]
pub struct Messager {
    publisher: Arc<dyn MessagePublisher>,
}

impl Messager {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }

    /// Publish the sensor's retained configuration and return its sender
    ///
    /// Fails if the configuration could not be published; nothing is retried.
    #[instrument(skip(self, sensor), fields(sensor = %sensor.name(), kind = %sensor.kind()))]
    pub async fn register<P>(&self, sensor: P) -> Result<SensorSender<P>, RegistrationError>
    where
        P: Publishable + 'static,
    {
        let config = sensor.configuration_message();

        send_message(self.publisher.as_ref(), &config, true)
            .await
            .map_err(|source| RegistrationError::ConfigurationNotPublished {
                name: sensor.name().to_string(),
                source,
            })?;

        info!(topic = %config.topic(), "Sensor registered");

        Ok(SensorSender {
            sensor: Arc::new(sensor),
            publisher: Arc::clone(&self.publisher),
        })
    }
}

/// Publishes state updates for one registered sensor
pub struct SensorSender<P> {
    sensor: Arc<P>,
    publisher: Arc<dyn MessagePublisher>,
}

impl<P> Clone for SensorSender<P> {
    fn clone(&self) -> Self {
        Self {
            sensor: Arc::clone(&self.sensor),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<P: Publishable> SensorSender<P> {
    /// Publish one value on the sensor's state topic (not retained)
    pub async fn send(&self, value: P::Value) -> Result<(), PublishError> {
        let message = self.sensor.serialize(value);
        send_message(self.publisher.as_ref(), &message, false).await
    }
}

async fn send_message(
    publisher: &dyn MessagePublisher,
    message: &Message,
    retained: bool,
) -> Result<(), PublishError> {
    debug!(topic = %message.topic(), retained, "Sending message");
    publisher
        .publish(message.topic(), message.payload(), retained)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{BinarySensor, NumericSensor};
    use tokio::sync::Mutex;

    /// Mock publisher that records every publish
    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, String, bool)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &str,
            payload: Vec<u8>,
            retained: bool,
        ) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Disconnected);
            }
            let body = String::from_utf8(payload).unwrap();
            self.published
                .lock()
                .await
                .push((topic.to_string(), body, retained));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_publishes_retained_configuration_only() {
        let publisher = Arc::new(RecordingPublisher::default());
        let messager = Messager::new(publisher.clone());

        let sensor = BinarySensor::new("train-route-X", "motion");
        let expected = sensor.configuration_message();
        let _sender = messager.register(sensor).await.unwrap();

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, expected.topic());
        assert_eq!(published[0].1, expected.body());
        assert!(published[0].2, "configuration must be retained");
    }

    #[tokio::test]
    async fn test_sender_publishes_transient_state() {
        let publisher = Arc::new(RecordingPublisher::default());
        let messager = Messager::new(publisher.clone());

        let sender = messager
            .register(BinarySensor::new("train-route-X", "motion"))
            .await
            .unwrap();
        sender.send(true).await.unwrap();
        sender.clone().send(false).await.unwrap();

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 3);
        for (index, body) in [(1, "ON"), (2, "OFF")] {
            assert_eq!(
                published[index].0,
                "homeassistant/binary_sensor/train-route-X/state"
            );
            assert_eq!(published[index].1, body);
            assert!(!published[index].2, "state must not be retained");
        }
    }

    #[tokio::test]
    async fn test_registration_failure_is_returned() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let messager = Messager::new(publisher);

        let result = messager
            .register(BinarySensor::new("train-route-X", "motion"))
            .await;
        match result {
            Err(RegistrationError::ConfigurationNotPublished { name, source }) => {
                assert_eq!(name, "train-route-X");
                assert!(matches!(source, PublishError::Disconnected));
            }
            Ok(_) => panic!("registration should fail"),
        }
    }

    #[tokio::test]
    async fn test_numeric_sensor_through_messager() {
        let publisher = Arc::new(RecordingPublisher::default());
        let messager = Messager::new(publisher.clone());

        let sender = messager
            .register(NumericSensor::new("living-room", "temperature").with_unit("°C"))
            .await
            .unwrap();
        sender.send(19.5).await.unwrap();

        let published = publisher.published.lock().await;
        assert_eq!(published[0].0, "homeassistant/sensor/living-room/config");
        assert_eq!(published[1].0, "homeassistant/sensor/living-room/state");
        assert_eq!(published[1].1, "19.5");
    }
}
