//! # Crash supervision.
//!
//! - [`InstanceFactory`] builds and destroys managed instances.
//! - [`SoloSupervisor`] / [`SharedSupervisor`] are the two supervisor shapes.
//! - [`CrashSupervisor`] is the one interface the orchestrator talks to,
//!   obtained from [`SupervisorHandle::into_adapter`].
//! - [`Watchdog`] / [`SharedWatchdog`] are ready-made supervisors of each shape.
//! - [`SupervisorProvider`] picks the supervisor for each mount.

mod adapter;
mod factory;
mod provider;
mod shared;
mod supervised;
mod supervisor;
mod watchdog;

pub use adapter::{CrashSupervisor, ErrorCallback, SupervisorEvents, SupervisorHandle};
pub use factory::InstanceFactory;
pub use provider::{SupervisorFn, SupervisorProvider, WatchdogProvider};
pub use shared::SharedWatchdog;
pub use supervisor::{SharedSupervisor, SoloSupervisor, SupervisorEvent, SupervisorState};
pub use watchdog::Watchdog;
