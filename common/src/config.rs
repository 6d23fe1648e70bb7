// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

fn default_mqtt_port() -> u16 {
    8883
}

fn default_client_id() -> String {
    "home-automation-app".to_string()
}

fn default_tls() -> bool {
    true
}

fn default_keep_alive_seconds() -> u64 {
    30
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

fn default_discovery_prefix() -> String {
    crate::sensor::DEFAULT_DISCOVERY_PREFIX.to_string()
}

/// A monitored train route between two station codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub train_ping_period_seconds: u64,
    pub healthcheck_interval_seconds: u64,
}

impl SchedulerConfig {
    pub fn train_ping_period(&self) -> Duration {
        Duration::from_secs(self.train_ping_period_seconds)
    }

    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            train_ping_period_seconds: 15 * 60,
            healthcheck_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default = "default_json_logs")]
    pub json_logs: bool,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_json_logs() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_port: None,
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: file → local file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Secrets such as APP__MQTT__PASSWORD come from the environment
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.mqtt.host.is_empty() {
            return Err("MQTT host cannot be empty".to_string());
        }
        if self.mqtt.port == 0 {
            return Err("MQTT port must be greater than 0".to_string());
        }
        if self.mqtt.client_id.is_empty() {
            return Err("MQTT client_id cannot be empty".to_string());
        }
        if self.mqtt.keep_alive_seconds < 5 {
            return Err("MQTT keep_alive_seconds must be at least 5".to_string());
        }
        if self.mqtt.discovery_prefix.is_empty() {
            return Err("MQTT discovery_prefix cannot be empty".to_string());
        }

        // Route names become sensor names, which must be unique
        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.name.is_empty() || route.from.is_empty() || route.to.is_empty() {
                return Err(format!(
                    "Route '{}' must have a name, from and to station",
                    route.name
                ));
            }
            if !seen.insert(route.name.as_str()) {
                return Err(format!("Duplicate route name: {}", route.name));
            }
        }

        if self.scheduler.train_ping_period_seconds == 0 {
            return Err("Scheduler train_ping_period_seconds must be greater than 0".to_string());
        }
        if self.scheduler.healthcheck_interval_seconds == 0 {
            return Err(
                "Scheduler healthcheck_interval_seconds must be greater than 0".to_string(),
            );
        }

        if self.admin.port == 0 {
            return Err("Admin port must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
            tls: default_tls(),
            keep_alive_seconds: default_keep_alive_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            discovery_prefix: default_discovery_prefix(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            routes: Vec::new(),
            scheduler: SchedulerConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.mqtt.client_id, "home-automation-app");
        assert_eq!(settings.mqtt.discovery_prefix, "homeassistant");
        assert_eq!(settings.scheduler.train_ping_period(), Duration::from_secs(900));
        assert_eq!(settings.scheduler.healthcheck_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_validation_catches_empty_host() {
        let mut settings = Settings::default();
        settings.mqtt.host = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_period() {
        let mut settings = Settings::default();
        settings.scheduler.train_ping_period_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_duplicate_route_names() {
        let mut settings = Settings::default();
        let route = RouteConfig {
            name: "commute".to_string(),
            from: "PAD".to_string(),
            to: "RDG".to_string(),
        };
        settings.routes = vec![route.clone(), route];
        let err = settings.validate().unwrap_err();
        assert!(err.contains("commute"));
    }

    #[test]
    fn test_load_from_path_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
[mqtt]
host = "broker.local"
port = 1883
tls = false

[[routes]]
name = "commute"
from = "PAD"
to = "RDG"

[scheduler]
train_ping_period_seconds = 600
healthcheck_interval_seconds = 60
"#
        )
        .unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.mqtt.host, "broker.local");
        assert_eq!(settings.mqtt.port, 1883);
        assert!(!settings.mqtt.tls);
        assert_eq!(settings.mqtt.client_id, "home-automation-app");
        assert_eq!(settings.routes.len(), 1);
        assert_eq!(settings.routes[0].from, "PAD");
        assert_eq!(settings.scheduler.train_ping_period_seconds, 600);
        assert_eq!(settings.admin.port, 8081);
        assert!(settings.validate().is_ok());
    }
}
