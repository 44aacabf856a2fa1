//! # MountOrchestrator: caller-facing façade.
//!
//! The [`MountOrchestrator`] owns the event bus, a [`SubscriberSet`], the
//! [`SlotCoordinator`] and a [`SupervisorProvider`]. Each `start` wires one
//! epoch of the coordinator to one crash supervisor adapter.
//!
//! ## High-level architecture
//! ```text
//! start(slot, factory, config, observers)
//!   └─► coordinator.acquire(slot, Binding)      → MountHandle
//!          └─► (after previous epoch released) Binding::mount
//!                 └─► provider → adapter → create → on_ready
//!
//! Per-slot phase:
//!   Idle → Acquiring → Ready → (Restarting → Ready)* → Releasing → Idle
//!
//! Event flow:
//!   epoch drivers / bindings ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                      ┌────────┼────────┐
//!                                                                      ▼        ▼        ▼
//!                                                                  [queue]  [queue]  [queue]
//! ```
//!
//! ## Rules
//! - Nothing is returned as an error from `start`; failures arrive through `on_error`
//!   (or are logged when there is no `on_error`).
//! - `on_ready` fires once per distinct instance: after the first mount and after each restart.
//! - Teardown goes through the supervisor; `on_after_teardown` receives the last known instance.
//!
//! ## Example
//! ```rust,ignore
//! let orchestrator = MountOrchestrator::builder(Config::default())
//!     .with_subscribers(vec![Arc::new(LogWriter::default())])
//!     .build();
//!
//! let handle = orchestrator.start(
//!     "editor-1".to_string(),
//!     Arc::new(Editors),
//!     settings,
//!     Observers::new()
//!         .on_ready(|editor| reconciler.attach(editor))
//!         .on_error(|err| eprintln!("{:?}: {}", err.phase, err.error)),
//! );
//! // ...
//! handle.release();
//! handle.released().await;
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::binding::{Binding, Observers};
use crate::core::builder::MountOrchestratorBuilder;
use crate::events::Bus;
use crate::slot::{EpochState, SlotCoordinator, SlotHandle};
use crate::subscribers::SubscriberSet;
use crate::supervision::{InstanceFactory, SupervisorProvider};

/// Orchestrator-level phase of one slot epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountPhase {
    /// Not mounted: before the mount started, or after teardown.
    Idle,
    /// Creating the instance.
    Acquiring,
    /// An instance is available.
    Ready,
    /// The supervisor is recreating a crashed instance.
    Restarting,
    /// Teardown requested or running.
    Releasing,
}

/// Caller-side handle of one `start`.
pub struct MountHandle<M: ?Sized> {
    epoch: SlotHandle<M>,
    phase: watch::Receiver<MountPhase>,
}

impl<M: ?Sized + Send + Sync + 'static> MountHandle<M> {
    /// Current phase. `Idle` once the epoch fully released.
    pub fn phase(&self) -> MountPhase {
        if self.epoch.state() == EpochState::Released {
            return MountPhase::Idle;
        }
        *self.phase.borrow()
    }

    /// Abandons the slot; teardown runs once the mount settled. Idempotent.
    pub fn release(&self) {
        self.epoch.release();
    }

    /// The currently published instance (updated on restarts).
    pub fn current_instance(&self) -> Option<Arc<M>> {
        self.epoch.current_instance()
    }

    /// Waits for the first instance; `None` if the epoch ends without one.
    pub async fn ready(&self) -> Option<Arc<M>> {
        self.epoch.ready().await
    }

    /// Waits until teardown finished and the slot is free.
    pub async fn released(&self) {
        self.epoch.released().await;
    }

    /// The underlying slot epoch.
    pub fn epoch(&self) -> &SlotHandle<M> {
        &self.epoch
    }
}

/// Wires slot epochs to crash supervisors and fans out runtime events.
pub struct MountOrchestrator<F: InstanceFactory> {
    cfg: Config,
    bus: Bus,
    coordinator: Arc<SlotCoordinator<F::Slot, F::Instance>>,
    provider: Arc<dyn SupervisorProvider<F>>,
    listener: CancellationToken,
    fanout: Mutex<Option<JoinHandle<()>>>,
}

impl<F: InstanceFactory> MountOrchestrator<F> {
    /// Returns a builder with the given configuration.
    pub fn builder(cfg: Config) -> MountOrchestratorBuilder<F> {
        MountOrchestratorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        provider: Arc<dyn SupervisorProvider<F>>,
    ) -> Arc<Self> {
        let listener = CancellationToken::new();
        let fanout = subscriber_listener(bus.subscribe(), subs, listener.clone());
        Arc::new(Self {
            cfg,
            coordinator: SlotCoordinator::new(bus.clone()),
            bus,
            provider,
            listener,
            fanout: Mutex::new(Some(fanout)),
        })
    }

    /// Mounts a new instance into `slot`.
    ///
    /// Returns immediately. The mount waits until every earlier `start` on the
    /// same slot has been torn down.
    pub fn start(
        &self,
        slot: F::Slot,
        factory: Arc<F>,
        config: F::Config,
        observers: Observers<F::Instance>,
    ) -> MountHandle<F::Instance> {
        let (phase_tx, phase_rx) = watch::channel(MountPhase::Acquiring);
        let binding = Binding::new(
            slot.clone(),
            config,
            factory,
            Arc::clone(&self.provider),
            observers,
            phase_tx,
            self.bus.clone(),
        );
        let epoch = self.coordinator.acquire(slot, binding);
        MountHandle {
            epoch,
            phase: phase_rx,
        }
    }

    /// Event bus every runtime event is published to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns true while any epoch of `slot` is queued, mounted or tearing down.
    pub fn is_busy(&self, slot: &F::Slot) -> bool {
        self.coordinator.is_busy(slot)
    }

    /// Number of slots with an unreleased epoch.
    pub fn active_slots(&self) -> usize {
        self.coordinator.active_slots()
    }

    /// Stops the subscriber fan-out and waits for subscribers to drain their queues.
    ///
    /// Mounted slots are not released; events published afterwards only reach
    /// direct bus subscribers.
    pub async fn shutdown(&self) {
        self.listener.cancel();
        let fanout = self
            .fanout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(fanout) = fanout {
            let _ = fanout.await;
        }
    }
}

/// Forwards bus events to the subscriber set until cancelled, then drains what is queued.
fn subscriber_listener(
    mut rx: broadcast::Receiver<crate::events::Event>,
    set: SubscriberSet,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = stop.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(ev);
                    }
                    break;
                }
                event = rx.recv() => event,
            };
            match event {
                Ok(ev) => set.emit(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fan-out lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    })
}

impl<F: InstanceFactory> Drop for MountOrchestrator<F> {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}
