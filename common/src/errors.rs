// Error handling framework

use thiserror::Error;

/// Broker transport errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to connect to broker: {0}")]
    Connection(String),

    #[error("Failed to publish to '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Broker operation timeout: {0}")]
    Timeout(String),

    #[error("Broker client is disconnected")]
    Disconnected,
}

/// Sensor registration errors
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Failed to announce sensor '{name}': {source}")]
    ConfigurationNotPublished {
        name: String,
        #[source]
        source: PublishError,
    },
}

/// Health check registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HealthError {
    #[error("Health check already registered: {0}")]
    DuplicateName(String),
}

/// Signal producer errors
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    HttpRequestFailed(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Page layout not recognised: {0}")]
    UnexpectedLayout(String),
}

impl From<rumqttc::ConnectionError> for PublishError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        PublishError::Connection(err.to_string())
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::HttpRequestFailed(err.to_string())
    }
}
