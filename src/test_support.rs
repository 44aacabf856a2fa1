//! Recording doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::InstanceError;
use crate::supervision::InstanceFactory;

/// Append-only, cloneable log of what happened, in order.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("journal lock").push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock").clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

/// Factory producing `"{slot}/{config}#{n}"` strings and journaling every call.
#[derive(Default)]
pub(crate) struct TestFactory {
    journal: Journal,
    created: AtomicU64,
    failing_creates: AtomicU32,
    fail_destroy: AtomicBool,
    panic_create: AtomicBool,
    create_delay_ms: AtomicU64,
}

impl TestFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Makes the next `n` creations fail.
    pub(crate) fn fail_next_creates(&self, n: u32) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    pub(crate) fn fail_destroys(&self, on: bool) {
        self.fail_destroy.store(on, Ordering::SeqCst);
    }

    /// Makes every creation panic while `on`.
    pub(crate) fn panic_creates(&self, on: bool) {
        self.panic_create.store(on, Ordering::SeqCst);
    }

    /// Makes every creation take `delay` before resolving.
    pub(crate) fn delay_creates(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.create_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub(crate) fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceFactory for TestFactory {
    type Slot = &'static str;
    type Config = String;
    type Instance = String;

    async fn create(
        &self,
        slot: &&'static str,
        config: &String,
    ) -> Result<Arc<String>, InstanceError> {
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.panic_create.load(Ordering::SeqCst) {
            self.journal.push(format!("create-panicked {slot}"));
            panic!("factory blew up creating {slot}");
        }
        let refuse = self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refuse {
            self.journal.push(format!("create-failed {slot}"));
            return Err(InstanceError::Create {
                error: "refused".into(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{slot}/{config}#{n}");
        self.journal.push(format!("create {name}"));
        Ok(Arc::new(name))
    }

    async fn destroy(&self, instance: Arc<String>) -> Result<(), InstanceError> {
        self.journal.push(format!("destroy {instance}"));
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(InstanceError::Destroy {
                error: "stuck".into(),
            });
        }
        Ok(())
    }
}
