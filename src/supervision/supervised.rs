//! # Restart engine for one supervised instance.
//!
//! [`Supervised`] is the per-instance core shared by [`Watchdog`](crate::Watchdog)
//! and [`SharedWatchdog`](crate::SharedWatchdog).
//!
//! ## Crash flow
//! ```text
//! report_crash(err)
//!   ├─ state != Ready          → ignored (stale report)
//!   ├─ restart.restarts() && window.record(now)
//!   │     true  → Crashed,            publish Error{will_retry: true}
//!   │     false → CrashedPermanently, publish Error{will_retry: false}
//!   └─ spawn recover():
//!        destroy(crashed)            (errors logged)
//!        sleep(backoff.next(n))      (aborted by destroy())
//!        create(slot, config)
//!          ├─ Ok  → Ready,              publish Restarted{instance}
//!          └─ Err → CrashedPermanently, publish Error{will_retry: false}
//! ```
//!
//! ## Rules
//! - `destroy()` cancels the stop token **before** taking the lock; recovery
//!   checks the token **under** the lock, so a restarted instance is either
//!   handed to `destroy()` or destroyed by recovery itself, never leaked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{InstanceError, SupervisorError};
use crate::policies::{BackoffPolicy, CrashWindow, RestartPolicy};
use crate::supervision::{InstanceFactory, SupervisorEvent, SupervisorState};

struct Cell<F: InstanceFactory> {
    state: SupervisorState,
    instance: Option<Arc<F::Instance>>,
    target: Option<(F::Slot, F::Config)>,
    window: CrashWindow,
    restarts: u32,
}

pub(crate) struct Supervised<F: InstanceFactory> {
    id: Option<Arc<str>>,
    factory: Arc<F>,
    restart: RestartPolicy,
    backoff: BackoffPolicy,
    cell: Mutex<Cell<F>>,
    events: broadcast::Sender<SupervisorEvent<F::Instance>>,
    stop: CancellationToken,
}

impl<F: InstanceFactory> Supervised<F> {
    pub(crate) fn new(
        id: Option<Arc<str>>,
        factory: Arc<F>,
        config: &Config,
        events: broadcast::Sender<SupervisorEvent<F::Instance>>,
    ) -> Self {
        Self {
            id,
            factory,
            restart: config.restart,
            backoff: config.backoff,
            cell: Mutex::new(Cell {
                state: SupervisorState::Initializing,
                instance: None,
                target: None,
                window: config.crash_window(),
                restarts: 0,
            }),
            events,
            stop: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell<F>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("solo")
    }

    pub(crate) fn state(&self) -> SupervisorState {
        self.lock().state
    }

    pub(crate) fn instance(&self) -> Option<Arc<F::Instance>> {
        self.lock().instance.clone()
    }

    pub(crate) async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError> {
        {
            let mut cell = self.lock();
            if self.stop.is_cancelled() {
                return Err(SupervisorError::Destroyed);
            }
            cell.state = SupervisorState::Initializing;
            cell.target = Some((slot.clone(), config.clone()));
        }

        let instance = match self.factory.create(slot, config).await {
            Ok(instance) => instance,
            Err(err) => {
                self.lock().state = SupervisorState::CrashedPermanently;
                return Err(err.into());
            }
        };

        {
            let mut cell = self.lock();
            if !self.stop.is_cancelled() {
                cell.instance = Some(Arc::clone(&instance));
                cell.state = SupervisorState::Ready;
                return Ok(instance);
            }
        }
        self.discard(instance).await;
        Err(SupervisorError::Destroyed)
    }

    pub(crate) async fn destroy(&self) -> Result<(), SupervisorError> {
        self.stop.cancel();
        let instance = {
            let mut cell = self.lock();
            cell.state = SupervisorState::Destroyed;
            cell.instance.take()
        };
        match instance {
            Some(instance) => self.factory.destroy(instance).await.map_err(Into::into),
            None => Ok(()),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent<F::Instance>> {
        self.events.subscribe()
    }

    /// Records a crash of the live instance and schedules recovery.
    ///
    /// Returns whether a restart will be attempted. Must be called from within
    /// a tokio runtime.
    pub(crate) fn report_crash(self: &Arc<Self>, error: InstanceError) -> bool {
        let (crashed, will_retry, attempt) = {
            let mut cell = self.lock();
            if cell.state != SupervisorState::Ready {
                tracing::debug!(
                    item = self.label(),
                    state = cell.state.as_str(),
                    "crash report ignored"
                );
                return false;
            }
            let will_retry = self.restart.restarts() && cell.window.record(Instant::now());
            cell.state = if will_retry {
                SupervisorState::Crashed
            } else {
                SupervisorState::CrashedPermanently
            };
            let attempt = cell.restarts;
            if will_retry {
                cell.restarts = cell.restarts.saturating_add(1);
            }
            (cell.instance.take(), will_retry, attempt)
        };

        tracing::warn!(item = self.label(), error = %error, will_retry, "instance crashed");
        let _ = self.events.send(SupervisorEvent::Error {
            item: self.id.clone(),
            error,
            will_retry,
        });

        let this = Arc::clone(self);
        tokio::spawn(async move { this.recover(crashed, will_retry, attempt).await });
        will_retry
    }

    async fn recover(&self, crashed: Option<Arc<F::Instance>>, will_retry: bool, attempt: u32) {
        if let Some(instance) = crashed {
            self.discard(instance).await;
        }
        if !will_retry {
            return;
        }

        let delay = self.backoff.next(attempt);
        tokio::select! {
            _ = self.stop.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let target = self.lock().target.clone();
        let Some((slot, config)) = target else {
            return;
        };
        match self.factory.create(&slot, &config).await {
            Ok(instance) => {
                {
                    let mut cell = self.lock();
                    if !self.stop.is_cancelled() {
                        cell.instance = Some(Arc::clone(&instance));
                        cell.state = SupervisorState::Ready;
                        drop(cell);
                        tracing::debug!(item = self.label(), attempt, "instance restarted");
                        let _ = self.events.send(SupervisorEvent::Restarted {
                            item: self.id.clone(),
                            instance,
                        });
                        return;
                    }
                }
                self.discard(instance).await;
            }
            Err(error) => {
                {
                    let mut cell = self.lock();
                    if cell.state != SupervisorState::Destroyed {
                        cell.state = SupervisorState::CrashedPermanently;
                    }
                }
                tracing::error!(item = self.label(), error = %error, "restart failed; giving up");
                let _ = self.events.send(SupervisorEvent::Error {
                    item: self.id.clone(),
                    error,
                    will_retry: false,
                });
            }
        }
    }

    /// Destroys an instance nobody owns anymore; failures are logged.
    async fn discard(&self, instance: Arc<F::Instance>) {
        if let Err(err) = self.factory.destroy(instance).await {
            tracing::warn!(
                item = self.label(),
                error = %err,
                label = err.as_label(),
                "destroying discarded instance failed"
            );
        }
    }
}
