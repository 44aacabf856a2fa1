//! Orchestration core.
//!
//! The public API from this module is [`MountOrchestrator`], which wires slot
//! epochs to crash supervisors, reports errors through one channel, and fans
//! runtime events out to subscribers.
//!
//! Internal modules:
//! - [`orchestrator`]: the façade, its handles and phases;
//! - [`binding`]: the per-start lifecycle gluing an epoch to its supervisor adapter;
//! - [`builder`]: builder for the orchestrator.

mod binding;
mod builder;
mod orchestrator;

pub use binding::{ErrorObserver, InstanceCallback, Observers};
pub use builder::MountOrchestratorBuilder;
pub use orchestrator::{MountHandle, MountOrchestrator, MountPhase};
