// Broker module for MQTT integration

pub mod mqtt;
pub mod publisher;

pub use mqtt::MqttClient;
pub use publisher::{MessagePublisher, MqttMessagePublisher};
