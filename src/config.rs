//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the orchestrator and the
//! reference watchdogs.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `MountOrchestrator::builder(config)`
//! 2. **Watchdog defaults**: `Watchdog::new(factory, &config)` / `SharedWatchdog::new(&config)`
//!
//! ## Sentinel values
//! - `crash_limit = 0` → no crash-rate gate (every crash is restartable)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::{BackoffPolicy, CrashWindow, RestartPolicy};

/// Global configuration for the slotvisor runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `restart`: Whether watchdogs recreate crashed instances
/// - `backoff`: Delay before each restart
/// - `crash_limit`: Crashes always restartable before the rate gate kicks in (`0` = no gate)
/// - `min_stable_period`: Minimum average time between crashes beyond `crash_limit`
///
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Restart policy for watchdog-managed instances.
    pub restart: RestartPolicy,

    /// Backoff applied before recreating a crashed instance.
    pub backoff: BackoffPolicy,

    /// Number of crashes that are always restarted.
    pub crash_limit: u32,

    /// Beyond `crash_limit`, restart only if crashes are on average further apart than this.
    pub min_stable_period: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a fresh crash-rate gate configured from this config.
    #[inline]
    pub fn crash_window(&self) -> CrashWindow {
        CrashWindow::new(self.crash_limit, self.min_stable_period)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `restart = RestartPolicy::OnCrash`
    /// - `backoff = BackoffPolicy::default()` (restart immediately)
    /// - `crash_limit = 3`
    /// - `min_stable_period = 5s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
            crash_limit: 3,
            min_stable_period: Duration::from_secs(5),
        }
    }
}
