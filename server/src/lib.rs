use funnel_ledger::{Funnel, FunnelConfig, Memory};
use std::sync::Arc;

mod api;
pub use api::Api;

mod config;
pub use config::{parse_origins, ServerConfig};

mod metrics;
pub use metrics::{FunnelMetrics, FunnelMetricsSnapshot};

mod store;
pub use store::{Backend, RedisStore};

/// Shared state behind every HTTP handler.
pub struct Server {
    funnel: Funnel<Backend>,
    config: ServerConfig,
    metrics: FunnelMetrics,
}

impl Server {
    pub fn new(backend: Backend, funnel_config: FunnelConfig, config: ServerConfig) -> Self {
        Self {
            funnel: Funnel::new(backend, funnel_config),
            config,
            metrics: FunnelMetrics::default(),
        }
    }

    /// Server backed by the in-memory store.
    pub fn in_memory(funnel_config: FunnelConfig, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self::new(
            Backend::Memory(Memory::new()),
            funnel_config,
            config,
        ))
    }

    pub fn funnel(&self) -> &Funnel<Backend> {
        &self.funnel
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &FunnelMetrics {
        &self.metrics
    }
}
