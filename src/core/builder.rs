use std::sync::Arc;

use crate::{
    config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    supervision::{InstanceFactory, SupervisorProvider, WatchdogProvider},
};

use super::orchestrator::MountOrchestrator;

/// Builder for constructing a [`MountOrchestrator`] with optional features.
pub struct MountOrchestratorBuilder<F: InstanceFactory> {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    provider: Option<Arc<dyn SupervisorProvider<F>>>,
}

impl<F: InstanceFactory> MountOrchestratorBuilder<F> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            provider: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (epoch lifecycle, crashes, reported
    /// errors) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the supervisor provider consulted on every mount.
    ///
    /// Defaults to a [`WatchdogProvider`] built from the builder's config.
    pub fn with_supervisor(mut self, provider: impl SupervisorProvider<F>) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Builds and returns the orchestrator.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Event bus for broadcasting
    /// - Subscriber workers and the bus listener feeding them
    /// - Slot coordinator
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<MountOrchestrator<F>> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(WatchdogProvider::new(self.cfg.clone())));

        MountOrchestrator::new_internal(self.cfg, bus, subs, provider)
    }
}
