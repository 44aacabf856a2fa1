//! # Slot epochs and their handles.
//!
//! An epoch is one attempt to occupy a slot, from `acquire` through full
//! teardown. Its state is shared between the caller's [`SlotHandle`] and the
//! coordinator's driver task.
//!
//! ## State machine
//! ```text
//! Pending ──mount ok, not released──► Mounted ──release()──► Releasing ──teardown──► Released
//!    │                                                          ▲
//!    ├──mount ok, release() already called──────────────────────┘
//!    └──mount failed / skipped───────────────────────────────────────────────────► Released
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::slot::ready::ReadyQueue;

/// Lifecycle state of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochState {
    /// Waiting for the previous epoch, or mounting.
    Pending,
    /// The instance is published.
    Mounted,
    /// Teardown is running.
    Releasing,
    /// Fully released; the slot is free for the next epoch.
    Released,
}

pub(crate) struct Epoch<M: ?Sized> {
    pub(crate) id: u64,
    pub(crate) slot: Arc<str>,
    pub(crate) state: watch::Sender<EpochState>,
    pub(crate) ready: ReadyQueue<M>,
    release_requested: AtomicBool,
    pub(crate) release: CancellationToken,
    pub(crate) released: CancellationToken,
    pub(crate) bus: Bus,
}

impl<M: ?Sized + Send + Sync + 'static> Epoch<M> {
    pub(crate) fn new(id: u64, slot: Arc<str>, bus: Bus) -> Self {
        let (state, _) = watch::channel(EpochState::Pending);
        Self {
            id,
            slot,
            state,
            ready: ReadyQueue::new(),
            release_requested: AtomicBool::new(false),
            release: CancellationToken::new(),
            released: CancellationToken::new(),
            bus,
        }
    }

    pub(crate) fn set_state(&self, state: EpochState) {
        self.state.send_replace(state);
    }

    pub(crate) fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_slot(Arc::clone(&self.slot))
            .with_epoch(self.id)
    }

    pub(crate) fn is_release_requested(&self) -> bool {
        self.release_requested.load(Ordering::Acquire)
    }
}

/// Caller-side handle of one slot epoch.
///
/// Cheap to clone; all clones refer to the same epoch.
pub struct SlotHandle<M: ?Sized> {
    pub(crate) epoch: Arc<Epoch<M>>,
}

impl<M: ?Sized> Clone for SlotHandle<M> {
    fn clone(&self) -> Self {
        Self {
            epoch: Arc::clone(&self.epoch),
        }
    }
}

impl<M: ?Sized + Send + Sync + 'static> SlotHandle<M> {
    /// Epoch id, unique within its coordinator.
    pub fn id(&self) -> u64 {
        self.epoch.id
    }

    /// The slot identity rendered with `Debug`.
    pub fn slot_label(&self) -> &str {
        &self.epoch.slot
    }

    /// Current epoch state.
    pub fn state(&self) -> EpochState {
        *self.epoch.state.borrow()
    }

    /// Abandons the slot. Idempotent.
    ///
    /// Ready callbacks that have not fired yet are dropped. If the mount has
    /// not resolved yet, its instance will be torn down instead of published;
    /// if the mount has not started yet, it is skipped.
    pub fn release(&self) {
        if self.epoch.release_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.epoch.ready.close();
        self.epoch.release.cancel();
        self.epoch.bus.publish(self.epoch.event(EventKind::ReleaseRequested));
    }

    /// Returns true once [`release`](Self::release) was called.
    pub fn is_release_requested(&self) -> bool {
        self.epoch.is_release_requested()
    }

    /// The published instance, if any. `None` before ready and after release.
    pub fn current_instance(&self) -> Option<Arc<M>> {
        self.epoch.ready.current()
    }

    /// Runs `cb` once with the instance: now if published, on first publish
    /// otherwise. Silently dropped if the epoch is released before becoming ready.
    pub fn run_when_ready<F>(&self, cb: F)
    where
        F: FnOnce(Arc<M>) + Send + 'static,
    {
        self.epoch.ready.run_when_ready(cb);
    }

    /// Relabels the published instance without running teardown or mount.
    ///
    /// Only for instances an external supervisor already recreated on its own.
    /// Still-pending ready callbacks fire against `instance`. Returns `false`
    /// and does nothing once release was requested.
    pub fn hot_swap(&self, instance: Arc<M>) -> bool {
        if self.epoch.is_release_requested() {
            return false;
        }
        if let Some(current) = self.epoch.ready.current() {
            if Arc::ptr_eq(&current, &instance) {
                return true;
            }
        }
        if !self.epoch.ready.replace(instance) {
            return false;
        }
        self.epoch.bus.publish(self.epoch.event(EventKind::HotSwapped));
        true
    }

    /// Waits for the first published instance; `None` if the epoch ends without one.
    pub async fn ready(&self) -> Option<Arc<M>> {
        self.epoch.ready.wait().await
    }

    /// Waits until the epoch is fully released.
    pub async fn released(&self) {
        self.epoch.released.cancelled().await;
    }

    /// Returns a receiver observing state transitions.
    pub fn watch_state(&self) -> watch::Receiver<EpochState> {
        self.epoch.state.subscribe()
    }
}
