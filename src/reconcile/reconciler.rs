//! # Dirty-flag driven reconciliation.
//!
//! [`RootSetReconciler`] owns the desired roots and the currently attached
//! store (the live instance). Every desired change and every newly attached
//! store marks it dirty; a pass runs only when it is dirty **and** both inputs
//! are present.
//!
//! ```text
//! set_desired(..) ─┐                      ┌─► dirty = false   (same lock as the read)
//!                  ├─► dirty = true ─► pass ─► snapshot store ─► compute_plan ─► apply_plan
//! attach(store) ───┘        ▲                                                      │
//!                           └──── set_desired during apply schedules another pass ◄┘
//! ```
//!
//! ## Rules
//! - Passes are serialized per reconciler (async mutex).
//! - Consistency conflicts are suppressed and reported as `ReconcileConflict` events.
//! - Store errors abort the pass, are published as `ReconcileFailed`, and are
//!   returned from [`pass`](RootSetReconciler::pass).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ReconcileError;
use crate::events::{Bus, Event, EventKind};
use crate::reconcile::{ApplyOutcome, RootDescriptor, RootStore, apply_plan, compute_plan};

type Roots<S> = Vec<RootDescriptor<<S as RootStore>::Data, <S as RootStore>::Attr>>;

/// Result of one [`RootSetReconciler::pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing changed since the last pass.
    Clean,
    /// Dirty, but no desired roots or no store yet.
    Waiting,
    /// A plan was computed and applied (possibly empty).
    Applied(ApplyOutcome),
}

/// Inputs and the dirty flag live under one lock: a pass clears the flag in
/// the same critical section that reads `desired`.
struct Inputs<S: RootStore + ?Sized> {
    desired: Option<Arc<Roots<S>>>,
    store: Option<Arc<S>>,
    dirty: bool,
}

/// Reconciles a desired root set into whichever store is currently attached.
pub struct RootSetReconciler<S: RootStore + ?Sized> {
    inputs: Mutex<Inputs<S>>,
    passes: AtomicU32,
    serial: tokio::sync::Mutex<()>,
    wake: Notify,
    bus: Option<Bus>,
}

impl<S: RootStore + ?Sized> Default for RootSetReconciler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RootStore + ?Sized> RootSetReconciler<S> {
    /// Creates a reconciler without event publishing.
    pub fn new() -> Self {
        Self {
            inputs: Mutex::new(Inputs {
                desired: None,
                store: None,
                dirty: false,
            }),
            passes: AtomicU32::new(0),
            serial: tokio::sync::Mutex::new(()),
            wake: Notify::new(),
            bus: None,
        }
    }

    /// Publishes pass outcomes into `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inputs<S>> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }

    /// Replaces the desired roots and marks the reconciler dirty.
    pub fn set_desired(&self, roots: Roots<S>) {
        {
            let mut inputs = self.lock();
            inputs.desired = Some(Arc::new(roots));
            inputs.dirty = true;
        }
        self.wake.notify_one();
    }

    /// Attaches a (new) store and marks the reconciler dirty.
    ///
    /// Attaching the store that is already attached is a no-op.
    pub fn attach(&self, store: Arc<S>) {
        {
            let mut inputs = self.lock();
            if inputs
                .store
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &store))
            {
                return;
            }
            inputs.store = Some(store);
            inputs.dirty = true;
        }
        self.wake.notify_one();
    }

    /// Detaches the current store; passes wait until another is attached.
    pub fn detach(&self) -> Option<Arc<S>> {
        self.lock().store.take()
    }

    /// Returns true if a pass is due.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Number of passes that computed a plan.
    pub fn passes(&self) -> u32 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Runs one reconciliation pass if dirty.
    pub async fn pass(&self) -> Result<PassOutcome, ReconcileError> {
        let _serial = self.serial.lock().await;
        let (desired, store) = {
            let mut inputs = self.lock();
            if !inputs.dirty {
                return Ok(PassOutcome::Clean);
            }
            let (desired, store) = match (&inputs.desired, &inputs.store) {
                (Some(desired), Some(store)) => (Arc::clone(desired), Arc::clone(store)),
                _ => return Ok(PassOutcome::Waiting),
            };
            inputs.dirty = false;
            (desired, store)
        };
        let n = self.passes.fetch_add(1, Ordering::Relaxed) + 1;

        let result = store
            .snapshot()
            .map_err(ReconcileError::from)
            .and_then(|actual| compute_plan(desired.as_slice(), &actual))
            .and_then(|plan| apply_plan(&plan, desired.as_slice(), &*store));

        match result {
            Ok(outcome) => {
                for root in &outcome.conflicts {
                    self.publish(
                        Event::new(EventKind::ReconcileConflict)
                            .with_item(root.as_str())
                            .with_reason("data push refused; local state kept")
                            .with_attempt(n),
                    );
                }
                tracing::debug!(
                    pass = n,
                    plan = %outcome.counts,
                    conflicts = outcome.conflicts.len(),
                    "reconciliation applied"
                );
                self.publish(
                    Event::new(EventKind::ReconcileApplied)
                        .with_plan(outcome.counts)
                        .with_attempt(n),
                );
                Ok(PassOutcome::Applied(outcome))
            }
            Err(err) => {
                tracing::warn!(
                    pass = n,
                    error = %err,
                    label = err.as_label(),
                    "reconciliation aborted"
                );
                self.publish(
                    Event::new(EventKind::ReconcileFailed)
                        .with_reason(err.to_string())
                        .with_attempt(n),
                );
                Err(err)
            }
        }
    }

    /// Runs passes whenever the reconciler becomes dirty, until `token` is cancelled.
    ///
    /// Failed passes are logged and wait for the next change.
    pub async fn run(&self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = self.wake.notified() => {}
            }
            while self.is_dirty() && !token.is_cancelled() {
                match self.pass().await {
                    Ok(PassOutcome::Applied(_)) => {}
                    Ok(PassOutcome::Clean | PassOutcome::Waiting) | Err(_) => break,
                }
            }
        }
    }
}
