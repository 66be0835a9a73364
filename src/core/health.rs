use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentHealth,
    /// Sources currently tripped in the circuit-breaker registry.
    pub disabled_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub price_feed: bool,
    pub executors: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, bool>,
}

impl ComponentHealth {
    pub fn get(&self, key: &str) -> Option<bool> {
        match key {
            "price_feed" => Some(self.price_feed),
            "executors" => Some(self.executors),
            _ => self.extra.get(key).copied(),
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    status: Arc<RwLock<ComponentHealth>>,
    disabled_sources: Arc<RwLock<Vec<String>>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            status: Arc::new(RwLock::new(ComponentHealth {
                price_feed: false,
                executors: false,
                extra: HashMap::new(),
            })),
            disabled_sources: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn get_status(&self) -> HealthStatus {
        let components = self.status.read().await.clone();
        let disabled_sources = self.disabled_sources.read().await.clone();

        HealthStatus {
            status: if components.price_feed && disabled_sources.is_empty() {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            disabled_sources,
        }
    }

    pub async fn update_component(&self, component: &str, healthy: bool) {
        let mut status = self.status.write().await;
        match component {
            "price_feed" => status.price_feed = healthy,
            "executors" => status.executors = healthy,
            _ => {
                status.extra.insert(component.to_string(), healthy);
            }
        }
    }

    pub async fn set_disabled_sources(&self, sources: Vec<String>) {
        *self.disabled_sources.write().await = sources;
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
