//! # Reference shared crash supervisor.
//!
//! [`SharedWatchdog`] supervises many instances at once, one per item id. All
//! items publish into one broadcast channel and every event carries its item id,
//! so consumers filter for the items they own.
//!
//! ```text
//! add_item("a", factory, slot, cfg) ──► items["a"] = Supervised ──► create
//! add_item("b", ...)                ──► items["b"] = Supervised ──► create
//!                                       (create fails or panics ──► items.remove("b"))
//! report_crash("a", err)            ──► Error{item:"a"} ... Restarted{item:"a"}
//! remove_item("a")                  ──► items.remove("a") ──► destroy
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{InstanceError, SupervisorError};
use crate::supervision::supervised::Supervised;
use crate::supervision::{InstanceFactory, SharedSupervisor, SupervisorEvent, SupervisorState};

/// Shared crash supervisor keyed by item id.
pub struct SharedWatchdog<F: InstanceFactory> {
    config: Config,
    items: Mutex<HashMap<String, Arc<Supervised<F>>>>,
    events: broadcast::Sender<SupervisorEvent<F::Instance>>,
}

impl<F: InstanceFactory> SharedWatchdog<F> {
    /// Creates an empty shared watchdog; every item uses the restart settings of `config`.
    pub fn new(config: &Config) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.bus_capacity_clamped());
        Arc::new(Self {
            config: config.clone(),
            items: Mutex::new(HashMap::new()),
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Supervised<F>>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, id: &str) -> Result<Arc<Supervised<F>>, SupervisorError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownItem { id: id.to_string() })
    }

    /// Reports a crash of item `id`; returns whether a restart will be attempted.
    pub fn report_crash(&self, id: &str, error: InstanceError) -> Result<bool, SupervisorError> {
        Ok(self.get(id)?.report_crash(error))
    }

    /// State of item `id`.
    pub fn item_state(&self, id: &str) -> Option<SupervisorState> {
        self.lock().get(id).map(|item| item.state())
    }

    /// Registered item ids, sorted.
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no item is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl<F: InstanceFactory> SharedSupervisor<F> for SharedWatchdog<F> {
    async fn add_item(
        &self,
        id: &str,
        factory: Arc<F>,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError> {
        let item = {
            let mut items = self.lock();
            if items.contains_key(id) {
                return Err(SupervisorError::DuplicateItem { id: id.to_string() });
            }
            let item = Arc::new(Supervised::new(
                Some(Arc::from(id)),
                factory,
                &self.config,
                self.events.clone(),
            ));
            items.insert(id.to_string(), Arc::clone(&item));
            item
        };

        let created = std::panic::AssertUnwindSafe(item.create(slot, config))
            .catch_unwind()
            .await;
        if !matches!(created, Ok(Ok(_))) {
            let mut items = self.lock();
            if items.get(id).is_some_and(|current| Arc::ptr_eq(current, &item)) {
                items.remove(id);
            }
        }
        created.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }

    async fn remove_item(&self, id: &str) -> Result<(), SupervisorError> {
        let item = self
            .lock()
            .remove(id)
            .ok_or_else(|| SupervisorError::UnknownItem { id: id.to_string() })?;
        item.destroy().await
    }

    fn item(&self, id: &str) -> Option<Arc<F::Instance>> {
        self.lock().get(id).and_then(|item| item.instance())
    }

    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent<F::Instance>> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::BackoffPolicy;
    use crate::test_support::TestFactory;

    fn watchdog() -> Arc<SharedWatchdog<TestFactory>> {
        SharedWatchdog::new(&Config {
            backoff: BackoffPolicy::immediate(),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn items_are_isolated_by_id() {
        let shared = watchdog();
        let factory = TestFactory::new();
        let cfg = "cfg".to_string();

        let a = shared.add_item("a", factory.clone(), &"S1", &cfg).await.expect("a");
        let b = shared.add_item("b", factory.clone(), &"S2", &cfg).await.expect("b");
        assert!(Arc::ptr_eq(&shared.item("a").expect("a live"), &a));
        assert!(Arc::ptr_eq(&shared.item("b").expect("b live"), &b));
        assert_eq!(shared.item_ids(), vec!["a", "b"]);

        assert!(matches!(
            shared.add_item("a", factory.clone(), &"S1", &cfg).await,
            Err(SupervisorError::DuplicateItem { .. })
        ));

        shared.remove_item("a").await.expect("remove a");
        assert!(shared.item("a").is_none());
        assert!(shared.item("b").is_some());
        assert!(matches!(
            shared.remove_item("a").await,
            Err(SupervisorError::UnknownItem { .. })
        ));
        assert_eq!(
            factory.journal().entries(),
            vec!["create S1/cfg#1", "create S2/cfg#2", "destroy S1/cfg#1"]
        );
    }

    #[tokio::test]
    async fn failed_add_unregisters_the_item() {
        let shared = watchdog();
        let factory = TestFactory::new();
        factory.fail_next_creates(1);

        let err = shared
            .add_item("a", factory.clone(), &"S1", &"cfg".to_string())
            .await
            .expect_err("create refused");
        assert_eq!(err.as_label(), "instance_create_failed");
        assert!(shared.is_empty());

        shared
            .add_item("a", factory, &"S1", &"cfg".to_string())
            .await
            .expect("second attempt");
        assert_eq!(shared.len(), 1);
    }

    #[tokio::test]
    async fn panicking_add_unregisters_the_item() {
        let shared = watchdog();
        let factory = TestFactory::new();
        factory.panic_creates(true);

        let config = "cfg".to_string();
        let add = shared.add_item("a", factory.clone(), &"S1", &config);
        let panicked = std::panic::AssertUnwindSafe(add).catch_unwind().await;
        assert!(panicked.is_err(), "panic propagates to the caller");
        assert!(shared.is_empty());

        factory.panic_creates(false);
        shared
            .add_item("a", factory, &"S1", &config)
            .await
            .expect("id is free again");
        assert_eq!(shared.len(), 1);
    }

    #[tokio::test]
    async fn events_carry_the_item_id() {
        let shared = watchdog();
        let factory = TestFactory::new();
        let mut events = shared.subscribe();
        shared.add_item("a", factory.clone(), &"S1", &"cfg".to_string()).await.expect("a");
        shared.add_item("b", factory, &"S2", &"cfg".to_string()).await.expect("b");

        assert!(shared.report_crash("b", InstanceError::crash("boom")).expect("known"));
        let first = events.recv().await.expect("error");
        let second = events.recv().await.expect("restart");
        assert_eq!(first.item(), Some("b"));
        assert!(matches!(second, SupervisorEvent::Restarted { .. }));
        assert_eq!(second.item(), Some("b"));
        assert_eq!(shared.item_state("a"), Some(SupervisorState::Ready));
        assert!(shared.report_crash("zzz", InstanceError::crash("x")).is_err());
    }
}
