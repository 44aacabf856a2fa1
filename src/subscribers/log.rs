//! # LogWriter: renders events through `tracing`.
//!
//! Failures go out at `warn`, lifecycle transitions at `info`, everything else at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO slotvisor: [mounted] slot="editor-1" epoch=3
//! WARN slotvisor: [teardown-failed] slot="editor-1" epoch=3 reason="destroy timed out"
//! INFO slotvisor: [reconcile-applied] plan=+1 -1 ~data=0 ~attrs=0 pass=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = e.kind.as_label();
        let slot = e.slot.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::MountFailed
            | EventKind::TeardownFailed
            | EventKind::InstanceCrashed
            | EventKind::ErrorReported
            | EventKind::ReconcileFailed
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => {
                tracing::warn!(
                    target: "slotvisor",
                    "[{label}] slot={slot:?} epoch={:?} item={:?} reason={:?} phase={:?} will_retry={:?}",
                    e.epoch,
                    e.item,
                    e.reason,
                    e.phase.map(|p| p.as_str()),
                    e.will_retry,
                );
            }
            EventKind::Mounted
            | EventKind::Released
            | EventKind::HotSwapped
            | EventKind::InstanceRestarted => {
                tracing::info!(target: "slotvisor", "[{label}] slot={slot:?} epoch={:?}", e.epoch);
            }
            EventKind::ReconcileApplied => {
                let plan = e.plan.unwrap_or_default();
                tracing::info!(target: "slotvisor", "[{label}] plan={plan} pass={:?}", e.attempt);
            }
            _ => {
                tracing::debug!(
                    target: "slotvisor",
                    "[{label}] slot={slot:?} epoch={:?} item={:?}",
                    e.epoch,
                    e.item,
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
