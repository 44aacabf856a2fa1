//! # Crash-rate gate.
//!
//! [`CrashWindow`] keeps the timestamps of recent crashes and answers "may this
//! crash be restarted?". Up to `limit` crashes are always restartable. Beyond
//! that, a restart is allowed only while the average time between the last
//! `limit + 1` crashes is longer than `min_stable`, so an instance that keeps
//! crashing right after being recreated is eventually left crashed.
//!
//! ```text
//! limit = 3, min_stable = 5s
//! crashes at t = 0s, 1s, 2s, 3s       → 4th crash: avg gap 1s  ≤ 5s → no restart
//! crashes at t = 0s, 10s, 20s, 30s    → 4th crash: avg gap 10s > 5s → restart
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding record of crash timestamps.
#[derive(Clone, Debug)]
pub struct CrashWindow {
    limit: u32,
    min_stable: Duration,
    crashes: VecDeque<Instant>,
}

impl CrashWindow {
    /// Creates a gate. `limit = 0` disables the gate (every crash is restartable).
    pub fn new(limit: u32, min_stable: Duration) -> Self {
        Self {
            limit,
            min_stable,
            crashes: VecDeque::new(),
        }
    }

    /// Records a crash at `at` and returns whether it may be restarted.
    pub fn record(&mut self, at: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        let keep = self.limit as usize + 1;
        self.crashes.push_back(at);
        while self.crashes.len() > keep {
            self.crashes.pop_front();
        }
        if self.crashes.len() <= self.limit as usize {
            return true;
        }

        let (Some(first), Some(last)) = (self.crashes.front(), self.crashes.back()) else {
            return true;
        };
        let average_gap = last.saturating_duration_since(*first) / self.limit;
        average_gap > self.min_stable
    }

    /// Number of crashes currently remembered.
    pub fn len(&self) -> usize {
        self.crashes.len()
    }

    /// Returns true if no crash is remembered.
    pub fn is_empty(&self) -> bool {
        self.crashes.is_empty()
    }
}
