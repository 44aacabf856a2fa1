//! # Event subscribers for the slotvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used by the orchestrator to deliver [`Bus`](crate::events::Bus) events.
//!
//! ## Architecture
//! ```text
//! Epoch driver ── publish(Event) ──► Bus ──► orchestrator listener ──► SubscriberSet
//!                                                                   ┌─────────┼─────────┐
//!                                                                   ▼         ▼         ▼
//!                                                               LogWriter  Metrics   Custom
//! ```

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
