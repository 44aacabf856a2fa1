//! # Observers of slot and epoch events.
//!
//! A [`Subscribe`] implementation sees every event the orchestrator, the slot
//! coordinator and the reconciler put on the bus: epochs being queued, mounted,
//! hot-swapped and released, instances crashing and restarting, reconciliation
//! passes applied or aborted.
//!
//! Delivery happens off the mount path. Each subscriber owns a bounded queue
//! drained by its own task, so a subscriber that stalls on an epoch's
//! `Released` event never delays the next epoch of that slot.
//!
//! - Order per subscriber matches bus order; there is no ordering across subscribers.
//! - A full queue drops the event for that subscriber and publishes `SubscriberOverflow`.
//! - A panic in `on_event` is reported as `SubscriberPanicked`; later events still arrive.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use slotvisor::{Event, EventKind, Subscribe};
//!
//! struct TeardownAlerts;
//!
//! #[async_trait]
//! impl Subscribe for TeardownAlerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TeardownFailed) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "teardown-alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receives slot lifecycle, supervision and reconciliation events.
///
/// Runs on its own task; blocking here stalls only this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event, after the publisher has moved on.
    async fn on_event(&self, event: &Event);

    /// Name carried in the `item` field of overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered before this subscriber starts dropping; at least 1.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
