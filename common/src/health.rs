// Health checks and their registry

use crate::errors::HealthError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Outcome of a single health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn unhealthy(message: impl Into<String>) -> Self {
        HealthStatus::Unhealthy(message.into())
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Unhealthy(message) => Some(message),
        }
    }
}

/// Anything that can report its health synchronously
pub trait HealthCheck: Send + Sync {
    /// Must not block or trigger work
    fn check(&self) -> HealthStatus;
}

/// Serializable view of a health status for the admin endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: Option<String>,
}

impl From<&HealthStatus> for HealthReport {
    fn from(status: &HealthStatus) -> Self {
        Self {
            healthy: status.is_healthy(),
            message: status.message().map(str::to_string),
        }
    }
}

/// Named collection of health checks
#[derive(Clone, Default)]
pub struct HealthCheckRegistry {
    checks: Arc<RwLock<BTreeMap<String, Arc<dyn HealthCheck>>>>,
}

impl HealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check under a unique name
    pub async fn register(
        &self,
        name: impl Into<String>,
        check: Arc<dyn HealthCheck>,
    ) -> Result<(), HealthError> {
        let name = name.into();
        let mut checks = self.checks.write().await;
        if checks.contains_key(&name) {
            return Err(HealthError::DuplicateName(name));
        }
        info!(health_check = %name, "Registered health check");
        checks.insert(name, check);
        Ok(())
    }

    /// Remove a check, returning whether it was registered
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.checks.write().await.remove(name).is_some();
        if removed {
            info!(health_check = %name, "Unregistered health check");
        }
        removed
    }

    pub async fn names(&self) -> Vec<String> {
        self.checks.read().await.keys().cloned().collect()
    }

    /// Run every registered check
    pub async fn run_health_checks(&self) -> BTreeMap<String, HealthStatus> {
        let checks = self.checks.read().await;
        checks
            .iter()
            .map(|(name, check)| {
                let status = check.check();
                debug!(health_check = %name, healthy = status.is_healthy(), "Ran health check");
                (name.clone(), status)
            })
            .collect()
    }

    /// True when every registered check is healthy (vacuously true when empty)
    pub async fn all_healthy(&self) -> bool {
        self.run_health_checks()
            .await
            .values()
            .all(HealthStatus::is_healthy)
    }
}
