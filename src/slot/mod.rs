//! # Slot coordination primitives.
//!
//! - [`SlotCoordinator`] sequences epochs per slot: one live instance at a time.
//! - [`SlotHandle`] is the caller's view of one epoch (ready, release, hot swap).
//! - [`Lifecycle`] / [`LifecycleFn`] produce and tear down instances.
//! - [`ReadyQueue`] is the once-ready callback cell backing every epoch.

mod coordinator;
mod epoch;
mod lifecycle;
mod ready;

pub use coordinator::SlotCoordinator;
pub use epoch::{EpochState, SlotHandle};
pub use lifecycle::{Lifecycle, LifecycleFn};
pub use ready::{Publish, ReadyCallback, ReadyQueue};
