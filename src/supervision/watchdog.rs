//! # Reference solo crash supervisor.
//!
//! [`Watchdog`] owns one instance built by its factory. Whoever observes the
//! instance failing calls [`Watchdog::report_crash`]; the watchdog then decides
//! from [`Config`] whether to recreate it (see the crash flow in
//! `supervision::supervised`).
//!
//! ## Example
//! ```rust,ignore
//! let watchdog = Watchdog::new(Arc::new(Editors), &Config::default());
//! let editor = watchdog.create(&slot, &settings).await?;
//! // later, from the editor's error hook:
//! watchdog.report_crash(InstanceError::crash("renderer lost"));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{InstanceError, SupervisorError};
use crate::supervision::supervised::Supervised;
use crate::supervision::{InstanceFactory, SoloSupervisor, SupervisorEvent, SupervisorState};

/// Solo crash supervisor with restart policy, backoff and crash-rate gate.
pub struct Watchdog<F: InstanceFactory> {
    inner: Arc<Supervised<F>>,
}

impl<F: InstanceFactory> Watchdog<F> {
    /// Creates a watchdog for instances built by `factory`.
    pub fn new(factory: Arc<F>, config: &Config) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.bus_capacity_clamped());
        Arc::new(Self {
            inner: Arc::new(Supervised::new(None, factory, config, events)),
        })
    }

    /// Reports a crash of the live instance.
    ///
    /// Returns whether a restart will be attempted; reports while no instance
    /// is live are ignored and return `false`.
    pub fn report_crash(&self, error: InstanceError) -> bool {
        self.inner.report_crash(error)
    }
}

#[async_trait]
impl<F: InstanceFactory> SoloSupervisor<F> for Watchdog<F> {
    async fn create(
        &self,
        slot: &F::Slot,
        config: &F::Config,
    ) -> Result<Arc<F::Instance>, SupervisorError> {
        self.inner.create(slot, config).await
    }

    async fn destroy(&self) -> Result<(), SupervisorError> {
        self.inner.destroy().await
    }

    fn state(&self) -> SupervisorState {
        self.inner.state()
    }

    fn instance(&self) -> Option<Arc<F::Instance>> {
        self.inner.instance()
    }

    fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent<F::Instance>> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
    use crate::test_support::TestFactory;

    fn config() -> Config {
        Config {
            backoff: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_secs(1),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn crash_restarts_after_backoff() {
        let factory = TestFactory::new();
        let dog = Watchdog::new(factory.clone(), &config());
        let mut events = dog.subscribe();

        let first = dog.create(&"S1", &"cfg".to_string()).await.expect("create");
        assert_eq!(dog.state(), SupervisorState::Ready);
        assert!(dog.report_crash(InstanceError::crash("boom")));
        assert_eq!(dog.state(), SupervisorState::Crashed);
        assert!(dog.instance().is_none());

        match events.recv().await.expect("error event") {
            SupervisorEvent::Error { item, will_retry, .. } => {
                assert!(item.is_none());
                assert!(will_retry);
            }
            other => panic!("unexpected {other:?}"),
        }
        let before = tokio::time::Instant::now();
        let second = match events.recv().await.expect("restart event") {
            SupervisorEvent::Restarted { instance, .. } => instance,
            other => panic!("unexpected {other:?}"),
        };
        assert!(before.elapsed() >= Duration::from_millis(100));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(dog.state(), SupervisorState::Ready);
        assert_eq!(
            factory.journal().entries(),
            vec!["create S1/cfg#1", "destroy S1/cfg#1", "create S1/cfg#2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn never_policy_gives_up_immediately() {
        let factory = TestFactory::new();
        let cfg = Config {
            restart: RestartPolicy::Never,
            ..config()
        };
        let dog = Watchdog::new(factory.clone(), &cfg);

        dog.create(&"S1", &"cfg".to_string()).await.expect("create");
        assert!(!dog.report_crash(InstanceError::crash("boom")));
        assert_eq!(dog.state(), SupervisorState::CrashedPermanently);
        assert!(!dog.report_crash(InstanceError::crash("again")));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(factory.created(), 1);
        assert_eq!(factory.journal().count("destroy"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_recreate_is_permanent() {
        let factory = TestFactory::new();
        let dog = Watchdog::new(factory.clone(), &config());
        let mut events = dog.subscribe();

        dog.create(&"S1", &"cfg".to_string()).await.expect("create");
        factory.fail_next_creates(1);
        dog.report_crash(InstanceError::crash("boom"));

        let _crash = events.recv().await.expect("crash event");
        match events.recv().await.expect("give-up event") {
            SupervisorEvent::Error { error, will_retry, .. } => {
                assert!(!will_retry);
                assert_eq!(error.as_label(), "instance_create_failed");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(dog.state(), SupervisorState::CrashedPermanently);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_during_backoff_cancels_the_restart() {
        let factory = TestFactory::new();
        let dog = Watchdog::new(factory.clone(), &config());

        dog.create(&"S1", &"cfg".to_string()).await.expect("create");
        dog.report_crash(InstanceError::crash("boom"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        dog.destroy().await.expect("destroy");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(factory.created(), 1);
        assert_eq!(dog.state(), SupervisorState::Destroyed);
        assert!(dog.instance().is_none());
        assert!(matches!(
            dog.create(&"S1", &"cfg".to_string()).await,
            Err(SupervisorError::Destroyed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn crash_loop_hits_the_rate_gate() {
        let factory = TestFactory::new();
        let cfg = Config {
            crash_limit: 2,
            min_stable_period: Duration::from_secs(60),
            backoff: BackoffPolicy::immediate(),
            ..Config::default()
        };
        let dog = Watchdog::new(factory.clone(), &cfg);
        let mut events = dog.subscribe();
        dog.create(&"S1", &"cfg".to_string()).await.expect("create");

        let mut retries = Vec::new();
        for _ in 0..3 {
            retries.push(dog.report_crash(InstanceError::crash("boom")));
            loop {
                match events.recv().await.expect("event") {
                    SupervisorEvent::Restarted { .. } => break,
                    SupervisorEvent::Error { will_retry: false, .. } => break,
                    SupervisorEvent::Error { .. } => {}
                }
            }
        }
        assert_eq!(retries, vec![true, true, false]);
        assert_eq!(dog.state(), SupervisorState::CrashedPermanently);
    }
}
