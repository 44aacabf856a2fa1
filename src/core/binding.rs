//! # Per-start glue between an epoch and its crash supervisor.
//!
//! A [`Binding`] is the [`Lifecycle`] the orchestrator hands to the slot
//! coordinator for one `start` call.
//!
//! ```text
//! mount(handle)
//!   ├─ provider.provide(factory).into_adapter(factory)
//!   ├─ adapter.subscribe()                     (before create: no restart is missed)
//!   ├─ adapter.create(slot, config)
//!   │     Err/panic → report(Initialization), epoch ends without instance
//!   ├─ handle.run_when_ready(notify_ready)     (on_ready once the epoch publishes)
//!   └─ spawn listener:
//!         Error{will_retry}  → phase Restarting (if retrying), report(Runtime)
//!         Restarted{inst}    → handle.hot_swap(inst), notify_ready(inst)
//!
//! unmount(last)
//!   ├─ phase Releasing, stop listener
//!   ├─ adapter.destroy()   Err → TeardownError (logged by the coordinator)
//!   └─ on_after_teardown(last), phase Idle
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::orchestrator::MountPhase;
use crate::error::{
    ErrorPhase, MountError, ReportedError, SlotError, TeardownError, panic_message,
};
use crate::events::{Bus, Event, EventKind};
use crate::slot::{Lifecycle, SlotHandle};
use crate::supervision::{
    CrashSupervisor, InstanceFactory, SupervisorEvent, SupervisorEvents, SupervisorProvider,
};

/// Callback receiving an instance.
pub type InstanceCallback<M> = Arc<dyn Fn(Arc<M>) + Send + Sync + 'static>;

/// Callback receiving a reported error.
pub type ErrorObserver = Arc<dyn Fn(ReportedError) + Send + Sync + 'static>;

/// Caller callbacks of one `start`.
///
/// Every observer is optional. Without `on_error`, errors are logged.
pub struct Observers<M: ?Sized> {
    on_ready: Option<InstanceCallback<M>>,
    on_error: Option<ErrorObserver>,
    on_after_teardown: Option<InstanceCallback<M>>,
}

impl<M: ?Sized> Default for Observers<M> {
    fn default() -> Self {
        Self {
            on_ready: None,
            on_error: None,
            on_after_teardown: None,
        }
    }
}

impl<M: ?Sized> Clone for Observers<M> {
    fn clone(&self) -> Self {
        Self {
            on_ready: self.on_ready.clone(),
            on_error: self.on_error.clone(),
            on_after_teardown: self.on_after_teardown.clone(),
        }
    }
}

impl<M: ?Sized> Observers<M> {
    /// No observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per distinct instance made available (initial mount and every restart).
    pub fn on_ready(mut self, f: impl Fn(Arc<M>) + Send + Sync + 'static) -> Self {
        self.on_ready = Some(Arc::new(f));
        self
    }

    /// Called for every initialization or runtime error.
    pub fn on_error(mut self, f: impl Fn(ReportedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called with the last known instance after a successful teardown.
    pub fn on_after_teardown(mut self, f: impl Fn(Arc<M>) + Send + Sync + 'static) -> Self {
        self.on_after_teardown = Some(Arc::new(f));
        self
    }
}

/// State shared by the lifecycle and its listener task.
struct Shared<F: InstanceFactory> {
    slot: F::Slot,
    label: Arc<str>,
    config: F::Config,
    factory: Arc<F>,
    provider: Arc<dyn SupervisorProvider<F>>,
    observers: Observers<F::Instance>,
    phase: watch::Sender<MountPhase>,
    bus: Bus,
    adapter: Mutex<Option<Arc<dyn CrashSupervisor<F>>>>,
    last_ready: Mutex<Option<Weak<F::Instance>>>,
    listener: CancellationToken,
}

impl<F: InstanceFactory> Shared<F> {
    fn adapter(&self) -> MutexGuard<'_, Option<Arc<dyn CrashSupervisor<F>>>> {
        self.adapter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: MountPhase) {
        self.phase.send_replace(phase);
    }

    /// Fires `on_ready` unless this exact instance was already announced.
    fn notify_ready(&self, instance: Arc<F::Instance>) {
        {
            let mut last = self.last_ready.lock().unwrap_or_else(PoisonError::into_inner);
            let fresh = Arc::downgrade(&instance);
            if last.as_ref().is_some_and(|seen| Weak::ptr_eq(seen, &fresh)) {
                return;
            }
            *last = Some(fresh);
        }
        self.set_phase(MountPhase::Ready);
        if let Some(cb) = &self.observers.on_ready {
            cb(instance);
        }
    }

    /// Delivers an error through the single error channel.
    fn report(&self, error: SlotError, phase: ErrorPhase, will_retry: bool) {
        self.bus.publish(
            Event::new(EventKind::ErrorReported)
                .with_slot(Arc::clone(&self.label))
                .with_reason(error.to_string())
                .with_phase(phase)
                .with_will_retry(will_retry),
        );
        let reported = ReportedError {
            error: Arc::new(error),
            phase,
            will_retry,
        };
        match &self.observers.on_error {
            Some(cb) => cb(reported),
            None => tracing::error!(
                slot = %self.label,
                phase = phase.as_str(),
                will_retry,
                error = %reported.error,
                label = reported.error.as_label(),
                "slot error without on_error observer"
            ),
        }
    }

    async fn listen(
        self: Arc<Self>,
        handle: SlotHandle<F::Instance>,
        mut events: SupervisorEvents<F::Instance>,
    ) {
        loop {
            let event = tokio::select! {
                _ = self.listener.cancelled() => return,
                event = events.recv() => event,
            };
            match event {
                Some(SupervisorEvent::Error {
                    error, will_retry, ..
                }) => {
                    if will_retry {
                        self.set_phase(MountPhase::Restarting);
                    }
                    self.bus.publish(
                        Event::new(EventKind::InstanceCrashed)
                            .with_slot(Arc::clone(&self.label))
                            .with_epoch(handle.id())
                            .with_reason(error.to_string())
                            .with_will_retry(will_retry),
                    );
                    self.report(SlotError::Runtime(error), ErrorPhase::Runtime, will_retry);
                }
                Some(SupervisorEvent::Restarted { instance, .. }) => {
                    if !handle.hot_swap(Arc::clone(&instance)) {
                        tracing::debug!(
                            slot = %self.label,
                            epoch = handle.id(),
                            "restart after release ignored"
                        );
                        continue;
                    }
                    self.bus.publish(
                        Event::new(EventKind::InstanceRestarted)
                            .with_slot(Arc::clone(&self.label))
                            .with_epoch(handle.id()),
                    );
                    self.notify_ready(instance);
                }
                None => return,
            }
        }
    }
}

/// Lifecycle of one orchestrated `start`.
pub(crate) struct Binding<F: InstanceFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: InstanceFactory> Binding<F> {
    pub(crate) fn new(
        slot: F::Slot,
        config: F::Config,
        factory: Arc<F>,
        provider: Arc<dyn SupervisorProvider<F>>,
        observers: Observers<F::Instance>,
        phase: watch::Sender<MountPhase>,
        bus: Bus,
    ) -> Self {
        let label = Arc::from(format!("{slot:?}"));
        Self {
            shared: Arc::new(Shared {
                slot,
                label,
                config,
                factory,
                provider,
                observers,
                phase,
                bus,
                adapter: Mutex::new(None),
                last_ready: Mutex::new(None),
                listener: CancellationToken::new(),
            }),
        }
    }
}

#[async_trait]
impl<F: InstanceFactory> Lifecycle<F::Instance> for Binding<F> {
    async fn mount(
        &self,
        handle: &SlotHandle<F::Instance>,
    ) -> Result<Arc<F::Instance>, MountError> {
        let shared = &self.shared;
        shared.set_phase(MountPhase::Acquiring);

        let adapter = shared
            .provider
            .provide(&shared.factory)
            .into_adapter(Arc::clone(&shared.factory));
        *shared.adapter() = Some(Arc::clone(&adapter));
        let events = adapter.subscribe();

        let fut = adapter.create(&shared.slot, &shared.config);
        let created = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(err)) => Err(MountError::Supervisor(err)),
            Err(panic) => Err(MountError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        };
        let instance = match created {
            Ok(instance) => instance,
            Err(err) => {
                shared.adapter().take();
                shared.report(SlotError::Mount(err.clone()), ErrorPhase::Initialization, false);
                shared.set_phase(MountPhase::Idle);
                return Err(err);
            }
        };

        let ready = Arc::clone(shared);
        handle.run_when_ready(move |instance| ready.notify_ready(instance));
        tokio::spawn(Arc::clone(shared).listen(handle.clone(), events));
        Ok(instance)
    }

    async fn unmount(&self, instance: Arc<F::Instance>) -> Result<(), TeardownError> {
        let shared = &self.shared;
        shared.set_phase(MountPhase::Releasing);
        shared.listener.cancel();

        let adapter = shared.adapter().take();
        if let Some(adapter) = adapter {
            if let Err(err) = adapter.destroy().await {
                shared.set_phase(MountPhase::Idle);
                return Err(TeardownError::Supervisor(err));
            }
        }
        if let Some(cb) = &shared.observers.on_after_teardown {
            cb(instance);
        }
        shared.set_phase(MountPhase::Idle);
        Ok(())
    }
}
