//! # Instance factory.
//!
//! An [`InstanceFactory`] knows how to build and destroy one kind of managed
//! instance. Supervisors call it for the first creation and again for every
//! restart, so `create` must be safe to call after a previous failure.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::InstanceError;

/// # Builds and destroys managed instances.
///
/// The associated types fix the whole pipeline: the orchestrator's slot key is
/// [`Slot`](InstanceFactory::Slot), the per-start configuration is
/// [`Config`](InstanceFactory::Config), and handles hand out
/// `Arc<`[`Instance`](InstanceFactory::Instance)`>`.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use slotvisor::{InstanceError, InstanceFactory};
///
/// struct Editors;
///
/// #[async_trait]
/// impl InstanceFactory for Editors {
///     type Slot = String;
///     type Config = String;
///     type Instance = String;
///
///     async fn create(&self, slot: &String, config: &String) -> Result<Arc<String>, InstanceError> {
///         Ok(Arc::new(format!("{slot}:{config}")))
///     }
///
///     async fn destroy(&self, _instance: Arc<String>) -> Result<(), InstanceError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait InstanceFactory: Send + Sync + 'static {
    /// Slot identity the instance is mounted into.
    type Slot: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static;
    /// Creation parameters; kept by supervisors for restarts.
    type Config: Clone + Send + Sync + 'static;
    /// The managed instance.
    type Instance: ?Sized + Send + Sync + 'static;

    /// Creates a fresh instance for `slot`.
    async fn create(
        &self,
        slot: &Self::Slot,
        config: &Self::Config,
    ) -> Result<Arc<Self::Instance>, InstanceError>;

    /// Destroys an instance created by this factory.
    async fn destroy(&self, instance: Arc<Self::Instance>) -> Result<(), InstanceError>;
}
