//! # Restart policy for watchdogs.
//!
//! [`RestartPolicy`] decides whether a watchdog recreates an instance after a
//! reported crash at all. Whether a *particular* crash is restarted is further
//! limited by the [`CrashWindow`](crate::CrashWindow) rate gate.
//!
//! ```text
//! RestartPolicy::Never    → crash is reported with will_retry=false, instance stays crashed
//! RestartPolicy::OnCrash  → crash is reported with will_retry=true (if the gate allows),
//!                           watchdog waits the backoff delay and recreates the instance
//! ```

/// Policy controlling whether a crashed instance is recreated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart: the first crash is permanent.
    Never,
    /// Restart on crash (default).
    #[default]
    OnCrash,
}

impl RestartPolicy {
    /// Returns true if crashes may be restarted.
    pub fn restarts(&self) -> bool {
        matches!(self, RestartPolicy::OnCrash)
    }
}
