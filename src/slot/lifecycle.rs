//! # Slot lifecycle callbacks.
//!
//! A [`Lifecycle`] tells the [`SlotCoordinator`](crate::SlotCoordinator) how to
//! produce an instance for a slot and how to tear it down. [`LifecycleFn`] is
//! the closure-backed implementation.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use slotvisor::{LifecycleFn, MountError, SlotHandle, TeardownError};
//!
//! let lifecycle = LifecycleFn::new(
//!     |_handle: SlotHandle<String>| async move {
//!         Ok::<_, MountError>(Arc::new(String::from("instance")))
//!     },
//!     |_instance: Arc<String>| async move { Ok::<_, TeardownError>(()) },
//! );
//! # let _ = lifecycle;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MountError, TeardownError};
use crate::slot::SlotHandle;

/// # Mount/unmount callbacks of one slot epoch.
///
/// `mount` runs at most once per epoch, only after the previous epoch of the
/// same slot fully released. `unmount` runs at most once, only if `mount`
/// produced an instance, and receives the epoch's **last known** instance
/// (which differs from the mounted one after a hot swap).
#[async_trait]
pub trait Lifecycle<M: ?Sized + Send + Sync + 'static>: Send + Sync + 'static {
    /// Produces the instance.
    ///
    /// `handle` is the epoch's own handle (the one `acquire` returned), so the
    /// mount body can wire out-of-band replacements to [`SlotHandle::hot_swap`].
    /// Errors and panics are caught by the coordinator.
    async fn mount(&self, handle: &SlotHandle<M>) -> Result<Arc<M>, MountError>;

    /// Tears the instance down. Errors and panics are caught by the coordinator.
    async fn unmount(&self, instance: Arc<M>) -> Result<(), TeardownError>;
}

/// Closure-backed lifecycle.
///
/// Each call creates a fresh future; share state between calls through `Arc`s
/// captured by the closures.
pub struct LifecycleFn<Mf, Uf> {
    mount: Mf,
    unmount: Uf,
}

impl<Mf, Uf> LifecycleFn<Mf, Uf> {
    /// Creates a lifecycle from a mount closure and an unmount closure.
    pub fn new(mount: Mf, unmount: Uf) -> Self {
        Self { mount, unmount }
    }
}

#[async_trait]
impl<M, Mf, MFut, Uf, UFut> Lifecycle<M> for LifecycleFn<Mf, Uf>
where
    M: ?Sized + Send + Sync + 'static,
    Mf: Fn(SlotHandle<M>) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = Result<Arc<M>, MountError>> + Send + 'static,
    Uf: Fn(Arc<M>) -> UFut + Send + Sync + 'static,
    UFut: Future<Output = Result<(), TeardownError>> + Send + 'static,
{
    async fn mount(&self, handle: &SlotHandle<M>) -> Result<Arc<M>, MountError> {
        (self.mount)(handle.clone()).await
    }

    async fn unmount(&self, instance: Arc<M>) -> Result<(), TeardownError> {
        (self.unmount)(instance).await
    }
}
