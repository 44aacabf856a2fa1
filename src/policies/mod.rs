//! Restart policies for watchdogs.
//!
//! This module groups the knobs that control **if** a crashed instance is
//! recreated and **how long** to wait before doing so.
//!
//! ## Contents
//! - [`RestartPolicy`] whether crashes are restarted at all (never / on-crash)
//! - [`CrashWindow`]   crash-rate gate (limit + minimum stable period)
//! - [`BackoffPolicy`] delay before restart (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization so shared crashes do not restart in lockstep
//!
//! ## Quick wiring
//! ```text
//! Config { restart, backoff, crash_limit, min_stable_period }
//!      └─► supervision::Watchdog / SharedWatchdog on report_crash():
//!           - restart.restarts() && window.record(now) → will_retry
//!           - sleep(backoff.next(consecutive_restarts)) → recreate
//! ```

mod backoff;
mod crash;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use crash::CrashWindow;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
