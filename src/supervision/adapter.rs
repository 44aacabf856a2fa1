//! # Uniform adapter over solo and shared supervisors.
//!
//! [`SupervisorHandle`] names the two supervisor shapes; [`SupervisorHandle::into_adapter`]
//! turns either into an `Arc<dyn CrashSupervisor>`. Nothing outside this module
//! matches on the shape.
//!
//! ```text
//! Solo(sup)   ──► SoloAdapter   create → sup.create
//!                               destroy → sup.destroy (only while Ready/Crashed)
//!                               events  → all
//!
//! Shared(sup) ──► SharedAdapter id = "slot-item-N" (private, never reused)
//!                               create → sup.add_item(id, ..)
//!                               destroy → sup.remove_item(id) (unknown id: no-op)
//!                               events  → item == id only
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::{InstanceError, SupervisorError};
use crate::supervision::{
    InstanceFactory, SharedSupervisor, SoloSupervisor, SupervisorEvent, SupervisorState,
};

/// Source of private shared-supervisor item ids.
static NEXT_ITEM: AtomicU64 = AtomicU64::new(1);

/// Callback receiving `(error, will_retry)` for the adapter's own instance.
pub type ErrorCallback = Box<dyn Fn(&InstanceError, bool) + Send + Sync + 'static>;

/// One of the two supervisor shapes.
pub enum SupervisorHandle<F: InstanceFactory> {
    /// Supervisor owning exactly one instance.
    Solo(Arc<dyn SoloSupervisor<F>>),
    /// Registry supervisor owning many items.
    Shared(Arc<dyn SharedSupervisor<F>>),
}

impl<F: InstanceFactory> SupervisorHandle<F> {
    /// Wraps the supervisor into the uniform adapter interface.
    ///
    /// `factory` is what shared supervisors build the adapter's item with; solo
    /// supervisors already own theirs.
    pub fn into_adapter(self, factory: Arc<F>) -> Arc<dyn CrashSupervisor<F>> {
        match self {
            SupervisorHandle::Solo(supervisor) => Arc::new(SoloAdapter { supervisor }),
            SupervisorHandle::Shared(supervisor) => {
                let n = NEXT_ITEM.fetch_add(1, Ordering::Relaxed);
                Arc::new(SharedAdapter {
                    supervisor,
                    factory,
                    id: Arc::from(format!("slot-item-{n}")),
                })
            }
        }
    }
}

/// # Uniform crash supervisor interface for one instance.
#[async_trait]
pub trait CrashSupervisor<F: InstanceFactory>: Send + Sync + 'static {
    /// Creates the instance.
    async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError>;

    /// Destroys the instance.
    async fn destroy(&self) -> Result<(), SupervisorError>;

    /// The supervisor's live instance for this adapter, if any.
    fn current_instance(&self) -> Option<Arc<F::Instance>>;

    /// Error and restart signals for this adapter's own instance.
    fn subscribe(&self) -> SupervisorEvents<F::Instance>;

    /// Calls `cb` for every error of this adapter's own instance until the
    /// returned token is cancelled. Must be called from within a tokio runtime.
    fn on_error(&self, cb: ErrorCallback) -> CancellationToken {
        let token = CancellationToken::new();
        let stop = token.clone();
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = stop.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Some(SupervisorEvent::Error {
                        error, will_retry, ..
                    }) => cb(&error, will_retry),
                    Some(SupervisorEvent::Restarted { .. }) => {}
                    None => break,
                }
            }
        });
        token
    }
}

/// Supervisor event stream filtered to one instance.
pub struct SupervisorEvents<M: ?Sized> {
    rx: broadcast::Receiver<SupervisorEvent<M>>,
    item: Option<Arc<str>>,
}

impl<M: ?Sized + Send + Sync + 'static> SupervisorEvents<M> {
    fn new(rx: broadcast::Receiver<SupervisorEvent<M>>, item: Option<Arc<str>>) -> Self {
        Self { rx, item }
    }

    /// Next event for this instance; `None` once the supervisor is gone.
    ///
    /// Lagged receivers skip the lost events.
    pub async fn recv(&mut self) -> Option<SupervisorEvent<M>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    let ours = match &self.item {
                        Some(id) => event.item() == Some(&**id),
                        None => true,
                    };
                    if ours {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        skipped,
                        item = self.item.as_deref(),
                        "supervisor events lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct SoloAdapter<F: InstanceFactory> {
    supervisor: Arc<dyn SoloSupervisor<F>>,
}

#[async_trait]
impl<F: InstanceFactory> CrashSupervisor<F> for SoloAdapter<F> {
    async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError> {
        self.supervisor.create(slot, config).await
    }

    async fn destroy(&self) -> Result<(), SupervisorError> {
        match self.supervisor.state() {
            SupervisorState::Ready | SupervisorState::Crashed => self.supervisor.destroy().await,
            state => {
                tracing::debug!(
                    state = state.as_str(),
                    "solo supervisor not live; destroy skipped"
                );
                Ok(())
            }
        }
    }

    fn current_instance(&self) -> Option<Arc<F::Instance>> {
        self.supervisor.instance()
    }

    fn subscribe(&self) -> SupervisorEvents<F::Instance> {
        SupervisorEvents::new(self.supervisor.subscribe(), None)
    }
}

struct SharedAdapter<F: InstanceFactory> {
    supervisor: Arc<dyn SharedSupervisor<F>>,
    factory: Arc<F>,
    id: Arc<str>,
}

#[async_trait]
impl<F: InstanceFactory> CrashSupervisor<F> for SharedAdapter<F> {
    async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError> {
        self.supervisor
            .add_item(&self.id, Arc::clone(&self.factory), slot, config)
            .await
    }

    async fn destroy(&self) -> Result<(), SupervisorError> {
        match self.supervisor.remove_item(&self.id).await {
            Err(SupervisorError::UnknownItem { .. }) => {
                tracing::debug!(item = %self.id, "shared item not registered; destroy skipped");
                Ok(())
            }
            other => other,
        }
    }

    fn current_instance(&self) -> Option<Arc<F::Instance>> {
        self.supervisor.item(&self.id)
    }

    fn subscribe(&self) -> SupervisorEvents<F::Instance> {
        SupervisorEvents::new(self.supervisor.subscribe(), Some(Arc::clone(&self.id)))
    }
}
