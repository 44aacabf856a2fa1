//! # Supervisor providers.
//!
//! The orchestrator asks its [`SupervisorProvider`] for a supervisor on every
//! mount. Providers decide the shape:
//!
//! - [`WatchdogProvider`]: a fresh solo [`Watchdog`] per mount.
//! - `Arc<SharedWatchdog>`: every mount becomes an item of the same registry.
//! - [`SupervisorFn`]: any closure, for custom supervisors.

use std::sync::Arc;

use crate::config::Config;
use crate::supervision::{InstanceFactory, SharedWatchdog, SupervisorHandle, Watchdog};

/// Hands out a supervisor for one mount.
pub trait SupervisorProvider<F: InstanceFactory>: Send + Sync + 'static {
    /// Returns the supervisor that will own the instance built by `factory`.
    fn provide(&self, factory: &Arc<F>) -> SupervisorHandle<F>;
}

/// Provides a new solo [`Watchdog`] per mount.
#[derive(Clone, Debug, Default)]
pub struct WatchdogProvider {
    config: Config,
}

impl WatchdogProvider {
    /// Creates a provider whose watchdogs use the restart settings of `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl<F: InstanceFactory> SupervisorProvider<F> for WatchdogProvider {
    fn provide(&self, factory: &Arc<F>) -> SupervisorHandle<F> {
        SupervisorHandle::Solo(Watchdog::new(Arc::clone(factory), &self.config))
    }
}

impl<F: InstanceFactory> SupervisorProvider<F> for Arc<SharedWatchdog<F>> {
    fn provide(&self, _factory: &Arc<F>) -> SupervisorHandle<F> {
        SupervisorHandle::Shared(self.clone())
    }
}

/// Closure-backed provider.
///
/// ## Example
/// ```rust,ignore
/// let provider = SupervisorFn::new(move |factory: &Arc<Editors>| {
///     let dog = Watchdog::new(Arc::clone(factory), &config);
///     dogs.lock().unwrap().push(Arc::clone(&dog));
///     SupervisorHandle::Solo(dog)
/// });
/// ```
pub struct SupervisorFn<P> {
    provide: P,
}

impl<P> SupervisorFn<P> {
    /// Wraps `provide`.
    pub fn new(provide: P) -> Self {
        Self { provide }
    }
}

impl<F, P> SupervisorProvider<F> for SupervisorFn<P>
where
    F: InstanceFactory,
    P: Fn(&Arc<F>) -> SupervisorHandle<F> + Send + Sync + 'static,
{
    fn provide(&self, factory: &Arc<F>) -> SupervisorHandle<F> {
        (self.provide)(factory)
    }
}
