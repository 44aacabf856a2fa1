//! Error types used by the slotvisor runtime.
//!
//! Errors are grouped by the layer that raises them:
//!
//! - [`InstanceError`]: raised by an [`InstanceFactory`](crate::InstanceFactory) or reported as a crash.
//! - [`SupervisorError`]: raised by crash supervisors and their adapters.
//! - [`MountError`] / [`TeardownError`]: failures of a slot lifecycle; caught and logged by the coordinator.
//! - [`SlotError`] / [`ReportedError`]: the single caller-visible error shape of the orchestrator.
//! - [`RootError`] / [`ReconcileError`]: root store and reconciliation failures.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by managed instances.
///
/// Values are cheap to clone so they can travel through broadcast channels.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstanceError {
    /// Creating the instance failed.
    #[error("instance creation failed: {error}")]
    Create {
        /// The underlying error message.
        error: String,
    },

    /// Destroying the instance failed.
    #[error("instance destruction failed: {error}")]
    Destroy {
        /// The underlying error message.
        error: String,
    },

    /// A live instance crashed.
    #[error("instance crashed: {error}")]
    Crash {
        /// The underlying error message.
        error: String,
    },
}

impl InstanceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            InstanceError::Create { .. } => "instance_create_failed",
            InstanceError::Destroy { .. } => "instance_destroy_failed",
            InstanceError::Crash { .. } => "instance_crashed",
        }
    }

    /// Shorthand for [`InstanceError::Crash`].
    pub fn crash(error: impl Into<String>) -> Self {
        InstanceError::Crash {
            error: error.into(),
        }
    }
}

/// # Errors produced by crash supervisors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// The factory failed while creating or destroying the instance.
    #[error(transparent)]
    Instance(#[from] InstanceError),

    /// The supervisor was destroyed and accepts no more work.
    #[error("supervisor destroyed")]
    Destroyed,

    /// An item with this id is already registered in a shared supervisor.
    #[error("item {id:?} already registered")]
    DuplicateItem {
        /// Offending item id.
        id: String,
    },

    /// No item with this id is registered in a shared supervisor.
    #[error("item {id:?} not registered")]
    UnknownItem {
        /// Requested item id.
        id: String,
    },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Instance(e) => e.as_label(),
            SupervisorError::Destroyed => "supervisor_destroyed",
            SupervisorError::DuplicateItem { .. } => "supervisor_duplicate_item",
            SupervisorError::UnknownItem { .. } => "supervisor_unknown_item",
        }
    }
}

/// # Mount failure of one slot epoch.
///
/// The coordinator never propagates it: the epoch resolves to "no instance".
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    /// The supervisor could not create the instance.
    #[error("mount failed: {0}")]
    Supervisor(#[from] SupervisorError),

    /// A user lifecycle reported a failure.
    #[error("mount failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The mount future panicked.
    #[error("mount panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl MountError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MountError::Supervisor(_) => "mount_supervisor_failed",
            MountError::Fail { .. } => "mount_failed",
            MountError::Panicked { .. } => "mount_panicked",
        }
    }

    /// Shorthand for [`MountError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        MountError::Fail {
            error: error.into(),
        }
    }
}

/// # Teardown failure of one slot epoch.
///
/// Logged and dropped: the slot's release signal fires regardless.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeardownError {
    /// The supervisor could not destroy the instance.
    #[error("teardown failed: {0}")]
    Supervisor(#[from] SupervisorError),

    /// A user lifecycle reported a failure.
    #[error("teardown failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The teardown future panicked.
    #[error("teardown panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TeardownError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TeardownError::Supervisor(_) => "teardown_supervisor_failed",
            TeardownError::Fail { .. } => "teardown_failed",
            TeardownError::Panicked { .. } => "teardown_panicked",
        }
    }

    /// Shorthand for [`TeardownError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TeardownError::Fail {
            error: error.into(),
        }
    }
}

/// Error delivered through the orchestrator's error channel.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// The initial mount failed.
    #[error(transparent)]
    Mount(#[from] MountError),

    /// The supervisor reported a failure of a mounted instance.
    #[error(transparent)]
    Runtime(#[from] InstanceError),
}

impl SlotError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SlotError::Mount(e) => e.as_label(),
            SlotError::Runtime(e) => e.as_label(),
        }
    }
}

/// Lifecycle phase an error was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    /// Failed while producing the first instance of an epoch.
    Initialization,
    /// Failed after the instance was mounted (crash or failed restart).
    Runtime,
}

impl ErrorPhase {
    /// Returns the phase name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPhase::Initialization => "initialization",
            ErrorPhase::Runtime => "runtime",
        }
    }
}

/// Caller-visible error: `{error, phase, will_retry}`.
#[derive(Debug, Clone)]
pub struct ReportedError {
    /// What went wrong.
    pub error: Arc<SlotError>,
    /// When it went wrong.
    pub phase: ErrorPhase,
    /// Whether the supervisor will attempt its own restart.
    pub will_retry: bool,
}

/// # Errors raised by a root store while reading or writing roots.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RootError {
    /// The store refused a data push because it would break its consistency model.
    #[error("root {root:?}: consistency conflict: {reason}")]
    Conflict {
        /// Root name.
        root: String,
        /// Store-provided reason.
        reason: String,
    },

    /// The root does not exist.
    #[error("root {root:?} not found")]
    NotFound {
        /// Root name.
        root: String,
    },

    /// The root already exists.
    #[error("root {root:?} already exists")]
    AlreadyExists {
        /// Root name.
        root: String,
    },

    /// The store rejected the operation for another reason.
    #[error("root {root:?} rejected: {reason}")]
    Rejected {
        /// Root name.
        root: String,
        /// Store-provided reason.
        reason: String,
    },
}

impl RootError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RootError::Conflict { .. } => "root_conflict",
            RootError::NotFound { .. } => "root_not_found",
            RootError::AlreadyExists { .. } => "root_already_exists",
            RootError::Rejected { .. } => "root_rejected",
        }
    }

    /// Returns true for consistency conflicts, which reconciliation suppresses.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RootError::Conflict { .. })
    }
}

/// # Errors produced by a reconciliation pass.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Two desired roots share a name.
    #[error("duplicate desired root {name:?}")]
    DuplicateRoot {
        /// Duplicated name.
        name: String,
    },

    /// The store aborted the transaction.
    #[error("transaction aborted: {0}")]
    Store(#[from] RootError),
}

impl ReconcileError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotvisor::ReconcileError;
    ///
    /// let err = ReconcileError::DuplicateRoot { name: "main".into() };
    /// assert_eq!(err.as_label(), "reconcile_duplicate_root");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::DuplicateRoot { .. } => "reconcile_duplicate_root",
            ReconcileError::Store(_) => "reconcile_store_aborted",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_the_wrapped_error() {
        let err = SlotError::Mount(MountError::Supervisor(SupervisorError::Instance(
            InstanceError::Create {
                error: "boom".into(),
            },
        )));
        assert_eq!(err.as_label(), "mount_supervisor_failed");
        assert_eq!(
            SupervisorError::from(InstanceError::crash("x")).as_label(),
            "instance_crashed"
        );
    }

    #[test]
    fn only_conflicts_are_suppressible() {
        let conflict = RootError::Conflict {
            root: "main".into(),
            reason: "diverged".into(),
        };
        let missing = RootError::NotFound {
            root: "main".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!missing.is_conflict());
    }

    #[test]
    fn panic_payloads_render_as_text() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
