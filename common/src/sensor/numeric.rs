// Numeric sensor

use super::{discovery_document, render_document, Publishable, SensorKind};
use super::DEFAULT_DISCOVERY_PREFIX;
use crate::message::Message;
use serde_json::Value;

/// Numeric sensor published under `<prefix>/sensor/<name>/...`
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSensor {
    name: String,
    device_class: String,
    unit_of_measurement: Option<String>,
    discovery_prefix: String,
}

impl NumericSensor {
    pub fn new(name: impl Into<String>, device_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_class: device_class.into(),
            unit_of_measurement: None,
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    pub fn with_discovery_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.discovery_prefix = prefix.into();
        self
    }
}

impl Publishable for NumericSensor {
    type Value = f64;

    fn name(&self) -> &str {
        &self.name
    }

    fn device_class(&self) -> &str {
        &self.device_class
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Sensor
    }

    fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    fn configuration_message(&self) -> Message {
        let mut document = discovery_document(self);
        if let (Some(unit), Value::Object(fields)) = (&self.unit_of_measurement, &mut document) {
            fields.insert(
                "unit_of_measurement".to_string(),
                Value::String(unit.clone()),
            );
        }
        Message::new(self.config_topic(), render_document(&document))
    }

    fn serialize(&self, value: f64) -> Message {
        Message::new(self.state_topic(), value.to_string())
    }
}
