// Sensor publication for the Home Assistant MQTT discovery protocol
//
// A sensor declares itself once with a retained configuration message and
// then reports values on its state topic. Both topics are derived from the
// sensor name, so names must be unique per broker.

pub mod binary;
pub mod numeric;

pub use binary::BinarySensor;
pub use numeric::NumericSensor;

use crate::message::Message;
use serde_json::{json, Value};
use std::fmt;

/// Topic prefix Home Assistant listens on for discovery
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Discovery component kinds this crate can publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Two-state sensor reported as `ON`/`OFF`
    BinarySensor,
    /// Numeric sensor
    Sensor,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::BinarySensor => "binary_sensor",
            SensorKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can be announced to and updated on the broker
///
/// Implementations only build messages; publishing is done by
/// [`Messager`](crate::messager::Messager).
pub trait Publishable: Send + Sync {
    /// Value type reported on the state topic
    type Value: Send;

    /// Unique sensor name, also used to derive topics and the unique id
    fn name(&self) -> &str;

    fn device_class(&self) -> &str;

    fn kind(&self) -> SensorKind;

    fn discovery_prefix(&self) -> &str {
        DEFAULT_DISCOVERY_PREFIX
    }

    /// Declaration published once, retained, when the sensor is registered
    fn configuration_message(&self) -> Message;

    /// State update for a single value
    fn serialize(&self, value: Self::Value) -> Message;

    fn config_topic(&self) -> String {
        topic(self.discovery_prefix(), self.kind(), self.name(), "config")
    }

    fn state_topic(&self) -> String {
        topic(self.discovery_prefix(), self.kind(), self.name(), "state")
    }
}

/// `<prefix>/<kind>/<name>/<suffix>`
pub fn topic(prefix: &str, kind: SensorKind, name: &str, suffix: &str) -> String {
    format!("{}/{}/{}/{}", prefix, kind, name, suffix)
}

/// Base discovery document shared by every sensor kind
pub(crate) fn discovery_document<P: Publishable + ?Sized>(sensor: &P) -> Value {
    json!({
        "name": sensor.name(),
        "device_class": sensor.device_class(),
        "state_topic": sensor.state_topic(),
        "unique_id": sensor.name(),
    })
}

/// Render a discovery document as the configuration message body
pub(crate) fn render_document(document: &Value) -> String {
    format!("{:#}", document)
}
