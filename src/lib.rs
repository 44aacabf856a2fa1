//! # slotvisor
//!
//! **Slotvisor** coordinates the lifecycle of long-lived, crash-prone async
//! instances that live in named *slots*.
//!
//! Each slot holds at most one mounted instance at a time. A new mount on a
//! slot waits until the previous instance was fully torn down; a crash
//! supervisor may recreate the instance underneath a mount without the
//! caller tearing anything down. A separate reconciler keeps the set of
//! *roots* inside every live instance equal to a desired set.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  start(slot, factory, config, observers)          set_desired(roots) / attach(store)
//!        │                                                   │
//!        ▼                                                   ▼
//! ┌──────────────────────────────────┐            ┌─────────────────────┐
//! │ MountOrchestrator                │            │ RootSetReconciler   │
//! │  - Bus (broadcast events)        │            │  compute_plan       │
//! │  - SubscriberSet (fan-out)       │            │  apply_plan (1 tx)  │
//! │  - SupervisorProvider            │            └──────────┬──────────┘
//! └──────┬───────────────────────────┘                       │
//!        ▼                                                   ▼
//! ┌──────────────────────────────────┐            ┌─────────────────────┐
//! │ SlotCoordinator                  │            │ RootStore           │
//! │  epoch N waits for epoch N-1     │            │ (the live instance) │
//! │  mount → ReadyQueue → teardown   │            └─────────────────────┘
//! └──────┬───────────────────────────┘
//!        ▼
//! ┌──────────────────────────────────┐
//! │ CrashSupervisor adapter          │
//! │  Solo(Watchdog) / Shared(items)  │
//! │  Error{will_retry} / Restarted   │
//! └──────────────────────────────────┘
//!
//! Every layer publishes Event ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                             ┌─────────┼─────────┐
//!                                                             ▼         ▼         ▼
//!                                                          worker1   worker2   workerN
//! ```
//!
//! ### Epoch lifecycle
//! ```text
//! acquire(slot) ──► EpochQueued
//!   ├─► await previous epoch released
//!   ├─► release already requested? ─► skip mount
//!   ├─► MountStarting, mount()
//!   │       ├─ Err/panic ─► MountFailed, ready() resolves None
//!   │       └─ Ok(inst)  ─► released meanwhile? ─► MountDiscarded
//!   │                       else publish ─► Mounted, run_when_ready callbacks
//!   ├─► (hot_swap(inst') relabels the published instance, HotSwapped)
//!   ├─► await release()
//!   ├─► TeardownStarting, teardown(last instance)
//!   │       └─ Err/panic ─► TeardownFailed (logged, not propagated)
//!   └─► Released; the next epoch of the slot may mount
//! ```
//!
//! ## Features
//! | Area               | Description                                                         | Key types / traits                                 |
//! |--------------------|---------------------------------------------------------------------|----------------------------------------------------|
//! | **Orchestration**  | Start, observe and release supervised mounts.                        | [`MountOrchestrator`], [`MountHandle`], [`Observers`] |
//! | **Slots**          | Serialize mount/teardown per slot, queue ready callbacks.            | [`SlotCoordinator`], [`SlotHandle`], [`Lifecycle`] |
//! | **Supervision**    | Uniform view over solo and shared crash supervisors.                 | [`CrashSupervisor`], [`Watchdog`], [`SharedWatchdog`] |
//! | **Reconciliation** | Keep a live instance's roots equal to a desired set.                 | [`RootSetReconciler`], [`RootStore`], [`compute_plan`] |
//! | **Policies**       | Restart, backoff and crash-rate limits for the watchdogs.            | [`RestartPolicy`], [`BackoffPolicy`], [`CrashWindow`] |
//! | **Subscriber API** | Hook into runtime events (logging, metrics, custom subscribers).     | [`Subscribe`], [`Event`]                           |
//! | **Errors**         | Typed errors per layer, one caller-visible error shape.              | [`ReportedError`], [`SlotError`]                   |
//! | **Configuration**  | Centralize runtime settings.                                         | [`Config`]                                         |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use slotvisor::{Config, InstanceError, InstanceFactory, MountOrchestrator, Observers};
//!
//! struct Editors;
//!
//! #[async_trait]
//! impl InstanceFactory for Editors {
//!     type Slot = String;
//!     type Config = String;
//!     type Instance = String;
//!
//!     async fn create(&self, slot: &String, config: &String) -> Result<Arc<String>, InstanceError> {
//!         Ok(Arc::new(format!("{slot}:{config}")))
//!     }
//!
//!     async fn destroy(&self, _instance: Arc<String>) -> Result<(), InstanceError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let orchestrator = MountOrchestrator::builder(Config::default()).build();
//!
//!     let handle = orchestrator.start(
//!         "main".to_string(),
//!         Arc::new(Editors),
//!         "dark-theme".to_string(),
//!         Observers::new().on_ready(|editor| println!("ready: {editor}")),
//!     );
//!     let editor = handle.ready().await.expect("mounted");
//!     assert_eq!(editor.as_str(), "main:dark-theme");
//!
//!     handle.release();
//!     handle.released().await;
//!     assert!(!orchestrator.is_busy(&"main".to_string()));
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod reconcile;
mod slot;
mod subscribers;
mod supervision;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    ErrorObserver, InstanceCallback, MountHandle, MountOrchestrator, MountOrchestratorBuilder,
    MountPhase, Observers,
};
pub use error::{
    ErrorPhase, InstanceError, MountError, ReconcileError, ReportedError, RootError, SlotError,
    SupervisorError, TeardownError,
};
pub use events::{Bus, Event, EventKind, PlanCounts};
pub use policies::{BackoffPolicy, CrashWindow, JitterPolicy, RestartPolicy};
pub use reconcile::{
    ApplyOutcome, MemoryRoots, PassOutcome, ReconciliationPlan, RootDescriptor, RootSetReconciler,
    RootStore, RootWriter, TransactionBody, apply_plan, compute_plan,
};
pub use slot::{
    EpochState, Lifecycle, LifecycleFn, Publish, ReadyCallback, ReadyQueue, SlotCoordinator,
    SlotHandle,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use supervision::{
    CrashSupervisor, ErrorCallback, InstanceFactory, SharedSupervisor, SharedWatchdog,
    SoloSupervisor, SupervisorEvent, SupervisorEvents, SupervisorFn, SupervisorHandle,
    SupervisorProvider, SupervisorState, Watchdog, WatchdogProvider,
};

// Optional: expose a tracing-backed logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
