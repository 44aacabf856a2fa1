//! # Crash supervisor contracts.
//!
//! Two structurally different supervisor shapes exist:
//!
//! - [`SoloSupervisor`]: owns exactly one instance, created through the factory
//!   it was constructed with.
//! - [`SharedSupervisor`]: a registry of many instances, each addressed by an
//!   item id chosen by the caller.
//!
//! Both publish [`SupervisorEvent`]s on a broadcast channel. Shared
//! supervisors tag every event with the item id; solo supervisors leave it empty.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{InstanceError, SupervisorError};
use crate::supervision::InstanceFactory;

/// Lifecycle state reported by a supervisor for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Creation in progress (or not started yet).
    Initializing,
    /// The instance is live.
    Ready,
    /// The instance crashed; a restart is pending.
    Crashed,
    /// The instance crashed and will not be restarted.
    CrashedPermanently,
    /// The supervisor was destroyed.
    Destroyed,
}

impl SupervisorState {
    /// Returns the state name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Initializing => "initializing",
            SupervisorState::Ready => "ready",
            SupervisorState::Crashed => "crashed",
            SupervisorState::CrashedPermanently => "crashed_permanently",
            SupervisorState::Destroyed => "destroyed",
        }
    }
}

/// Out-of-band signal published by a supervisor.
pub enum SupervisorEvent<M: ?Sized> {
    /// The instance failed.
    Error {
        /// Item id (shared supervisors only).
        item: Option<Arc<str>>,
        /// What went wrong.
        error: InstanceError,
        /// Whether the supervisor will recreate the instance on its own.
        will_retry: bool,
    },
    /// The supervisor recreated the instance on its own.
    Restarted {
        /// Item id (shared supervisors only).
        item: Option<Arc<str>>,
        /// The replacement instance.
        instance: Arc<M>,
    },
}

impl<M: ?Sized> SupervisorEvent<M> {
    /// Item id the event refers to, if any.
    pub fn item(&self) -> Option<&str> {
        match self {
            SupervisorEvent::Error { item, .. } | SupervisorEvent::Restarted { item, .. } => {
                item.as_deref()
            }
        }
    }
}

impl<M: ?Sized> Clone for SupervisorEvent<M> {
    fn clone(&self) -> Self {
        match self {
            SupervisorEvent::Error {
                item,
                error,
                will_retry,
            } => SupervisorEvent::Error {
                item: item.clone(),
                error: error.clone(),
                will_retry: *will_retry,
            },
            SupervisorEvent::Restarted { item, instance } => SupervisorEvent::Restarted {
                item: item.clone(),
                instance: Arc::clone(instance),
            },
        }
    }
}

impl<M: ?Sized> std::fmt::Debug for SupervisorEvent<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorEvent::Error {
                item,
                error,
                will_retry,
            } => f
                .debug_struct("Error")
                .field("item", item)
                .field("error", error)
                .field("will_retry", will_retry)
                .finish(),
            SupervisorEvent::Restarted { item, .. } => {
                f.debug_struct("Restarted").field("item", item).finish_non_exhaustive()
            }
        }
    }
}

/// # Supervisor owning a single instance.
#[async_trait]
pub trait SoloSupervisor<F: InstanceFactory>: Send + Sync + 'static {
    /// Creates the instance and starts supervising it.
    async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError>;

    /// Stops supervising and destroys the current instance, if any.
    async fn destroy(&self) -> Result<(), SupervisorError>;

    /// Current supervisor state.
    fn state(&self) -> SupervisorState;

    /// The live instance, if any.
    fn instance(&self) -> Option<Arc<F::Instance>>;

    /// Subscribes to error/restart signals.
    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent<F::Instance>>;
}

/// # Supervisor owning many instances keyed by item id.
#[async_trait]
pub trait SharedSupervisor<F: InstanceFactory>: Send + Sync + 'static {
    /// Registers item `id` and creates its instance through `factory`.
    async fn add_item(
        &self,
        id: &str,
        factory: Arc<F>,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError>;

    /// Unregisters item `id` and destroys its instance.
    async fn remove_item(&self, id: &str) -> Result<(), SupervisorError>;

    /// The live instance of item `id`, if any.
    fn item(&self, id: &str) -> Option<Arc<F::Instance>>;

    /// Subscribes to error/restart signals of **all** items.
    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent<F::Instance>>;
}
