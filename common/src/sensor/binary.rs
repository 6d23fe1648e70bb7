// Binary sensor: boolean state reported as ON/OFF

use super::{discovery_document, render_document, Publishable, SensorKind};
use super::DEFAULT_DISCOVERY_PREFIX;
use crate::message::Message;

const ON: &str = "ON";
const OFF: &str = "OFF";

/// Boolean sensor published under `<prefix>/binary_sensor/<name>/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySensor {
    name: String,
    device_class: String,
    discovery_prefix: String,
}

impl BinarySensor {
    pub fn new(name: impl Into<String>, device_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_class: device_class.into(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }

    /// Publish under a different discovery prefix
    pub fn with_discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_prefix = prefix.into();
        self
    }
}

impl Publishable for BinarySensor {
    type Value = bool;

    fn name(&self) -> &str {
        &self.name
    }

    fn device_class(&self) -> &str {
        &self.device_class
    }

    fn kind(&self) -> SensorKind {
        SensorKind::BinarySensor
    }

    fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    fn configuration_message(&self) -> Message {
        Message::new(
            self.config_topic(),
            render_document(&discovery_document(self)),
        )
    }

    fn serialize(&self, value: bool) -> Message {
        Message::new(self.state_topic(), if value { ON } else { OFF })
    }
}
