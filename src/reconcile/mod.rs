//! # Multi-root reconciliation.
//!
//! - [`RootDescriptor`] describes one keyed root.
//! - [`RootStore`] / [`RootWriter`] are the instance-side read and transactional write contracts.
//! - [`compute_plan`] / [`apply_plan`] diff and apply.
//! - [`RootSetReconciler`] drives passes from desired-state changes and new instances.
//! - [`MemoryRoots`] is a reference in-memory store.

mod memory;
mod plan;
mod reconciler;
mod root;
mod store;

pub use memory::MemoryRoots;
pub use plan::{ApplyOutcome, ReconciliationPlan, apply_plan, compute_plan};
pub use reconciler::{PassOutcome, RootSetReconciler};
pub use root::RootDescriptor;
pub use store::{RootStore, RootWriter, TransactionBody};
