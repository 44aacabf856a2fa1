//! # Runtime events emitted by the coordinator, orchestrator and reconciler.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Epoch events**: slot lifecycle (queued, mounting, mounted, releasing, released)
//! - **Supervision events**: out-of-band crashes and restarts of mounted instances
//! - **Reconciliation events**: applied plans, suppressed conflicts, aborted passes
//! - **Subscriber events**: fan-out overflow and panics
//!
//! The [`Event`] struct carries the metadata: timestamps, slot label, epoch id,
//! error reason, phase, and plan counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use slotvisor::{ErrorPhase, Event, EventKind};
//!
//! let ev = Event::new(EventKind::MountFailed)
//!     .with_slot("editor-1")
//!     .with_epoch(3)
//!     .with_reason("boom")
//!     .with_phase(ErrorPhase::Initialization);
//!
//! assert_eq!(ev.kind, EventKind::MountFailed);
//! assert_eq!(ev.slot.as_deref(), Some("editor-1"));
//! assert_eq!(ev.epoch, Some(3));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::error::ErrorPhase;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `item`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `item`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Epoch events ===
    /// A new epoch was queued behind the slot's previous epoch.
    ///
    /// Sets: `slot`, `epoch`
    EpochQueued,

    /// The epoch's mount body is about to run (the previous epoch has released).
    ///
    /// Sets: `slot`, `epoch`
    MountStarting,

    /// The mount produced an instance and it was published.
    ///
    /// Sets: `slot`, `epoch`
    Mounted,

    /// The mount failed or panicked; the epoch ends without an instance.
    ///
    /// Sets: `slot`, `epoch`, `reason`
    MountFailed,

    /// The mount produced an instance after release was requested; it goes
    /// straight to teardown without being published.
    ///
    /// Sets: `slot`, `epoch`
    MountDiscarded,

    /// `release()` was called on the epoch.
    ///
    /// Sets: `slot`, `epoch`
    ReleaseRequested,

    /// Teardown of the epoch's last known instance is starting.
    ///
    /// Sets: `slot`, `epoch`
    TeardownStarting,

    /// Teardown failed or panicked (the slot is released anyway).
    ///
    /// Sets: `slot`, `epoch`, `reason`
    TeardownFailed,

    /// The epoch fully released; the next queued epoch may mount.
    ///
    /// Sets: `slot`, `epoch`
    Released,

    /// The published instance was replaced without running teardown/mount.
    ///
    /// Sets: `slot`, `epoch`
    HotSwapped,

    // === Supervision events ===
    /// The supervisor reported an error for a mounted instance.
    ///
    /// Sets: `slot`, `epoch`, `reason`, `will_retry`
    InstanceCrashed,

    /// The supervisor recreated the instance on its own.
    ///
    /// Sets: `slot`, `epoch`
    InstanceRestarted,

    /// An error was delivered through the orchestrator's error channel.
    ///
    /// Sets: `slot`, `reason`, `phase`, `will_retry`
    ErrorReported,

    // === Reconciliation events ===
    /// A reconciliation plan was applied (possibly empty).
    ///
    /// Sets: `plan`, `attempt` (pass number)
    ReconcileApplied,

    /// A data push was rejected by the store and suppressed.
    ///
    /// Sets: `item`: root name, `reason`
    ReconcileConflict,

    /// A reconciliation pass aborted.
    ///
    /// Sets: `reason`, `attempt` (pass number)
    ReconcileFailed,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) used by log output.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::EpochQueued => "epoch-queued",
            EventKind::MountStarting => "mount-starting",
            EventKind::Mounted => "mounted",
            EventKind::MountFailed => "mount-failed",
            EventKind::MountDiscarded => "mount-discarded",
            EventKind::ReleaseRequested => "release-requested",
            EventKind::TeardownStarting => "teardown-starting",
            EventKind::TeardownFailed => "teardown-failed",
            EventKind::Released => "released",
            EventKind::HotSwapped => "hot-swapped",
            EventKind::InstanceCrashed => "instance-crashed",
            EventKind::InstanceRestarted => "instance-restarted",
            EventKind::ErrorReported => "error-reported",
            EventKind::ReconcileApplied => "reconcile-applied",
            EventKind::ReconcileConflict => "reconcile-conflict",
            EventKind::ReconcileFailed => "reconcile-failed",
        }
    }
}

/// Per-class counts of an applied reconciliation plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    /// Roots created.
    pub added: u32,
    /// Roots detached.
    pub removed: u32,
    /// Roots whose data was pushed.
    pub data_changed: u32,
    /// Roots whose attributes were replaced.
    pub attributes_changed: u32,
}

impl PlanCounts {
    /// Returns true if nothing was changed.
    pub fn is_empty(&self) -> bool {
        self.added == 0
            && self.removed == 0
            && self.data_changed == 0
            && self.attributes_changed == 0
    }
}

impl fmt::Display for PlanCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} -{} ~data={} ~attrs={}",
            self.added, self.removed, self.data_changed, self.attributes_changed
        )
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Slot label (the slot identity rendered with `Debug`).
    pub slot: Option<Arc<str>>,
    /// Epoch id (unique per coordinator).
    pub epoch: Option<u64>,
    /// Secondary subject: subscriber name or root name.
    pub item: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Phase of a reported error.
    pub phase: Option<ErrorPhase>,
    /// Whether the supervisor will restart on its own.
    pub will_retry: Option<bool>,
    /// Pass number (reconciliation).
    pub attempt: Option<u32>,
    /// Applied plan counts (reconciliation).
    pub plan: Option<PlanCounts>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            epoch: None,
            item: None,
            reason: None,
            phase: None,
            will_retry: None,
            attempt: None,
            plan: None,
        }
    }

    /// Attaches a slot label.
    #[inline]
    pub fn with_slot(mut self, slot: impl Into<Arc<str>>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Attaches an epoch id.
    #[inline]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Attaches a secondary subject (subscriber or root name).
    #[inline]
    pub fn with_item(mut self, item: impl Into<Arc<str>>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an error phase.
    #[inline]
    pub fn with_phase(mut self, phase: ErrorPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attaches the supervisor's retry intent.
    #[inline]
    pub fn with_will_retry(mut self, will_retry: bool) -> Self {
        self.will_retry = Some(will_retry);
        self
    }

    /// Attaches a pass/attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches applied plan counts.
    #[inline]
    pub fn with_plan(mut self, plan: PlanCounts) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_item(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_item(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::EpochQueued);
        let b = Event::new(EventKind::MountStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn plan_counts_render_compactly() {
        let counts = PlanCounts {
            added: 1,
            removed: 2,
            data_changed: 0,
            attributes_changed: 3,
        };
        assert_eq!(counts.to_string(), "+1 -2 ~data=0 ~attrs=3");
        assert!(!counts.is_empty());
        assert!(PlanCounts::default().is_empty());
    }
}
