//! # Per-slot epoch sequencing.
//!
//! [`SlotCoordinator`] guarantees that at most one instance lives in a slot at
//! a time. Every `acquire` creates an epoch and chains it behind the previous
//! epoch of the same slot; the new epoch's mount body only starts after the
//! previous epoch fired its release signal.
//!
//! ## Architecture
//! ```text
//! acquire(S, L1) ─► epoch 1 ─► [mount L1] ─► Mounted ─► release() ─► [unmount] ─► Released ─┐
//! acquire(S, L2) ─► epoch 2 ─► waits on epoch 1 release signal ◄───────────────────────────┘
//!                              └─► [mount L2] ─► ...
//!
//! slots: HashMap<S, Tail>   (tail = last queued epoch's release signal)
//! ```
//!
//! ## Rules
//! - Mount bodies for one slot run in `acquire` order, never concurrently.
//! - The release signal **always** fires: mount/teardown errors and panics are
//!   caught and logged, otherwise every later epoch of the slot would wait forever.
//! - A failed mount ends its epoch immediately (nothing to tear down).
//! - The map entry is pruned by the epoch that owns the tail, on its release.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{MountError, TeardownError, panic_message};
use crate::events::{Bus, EventKind};
use crate::slot::epoch::{Epoch, EpochState, SlotHandle};
use crate::slot::lifecycle::Lifecycle;
use crate::slot::ready::Publish;

/// Tail of a slot's epoch chain.
struct Tail {
    epoch: u64,
    released: CancellationToken,
}

/// Explicit context object owning the slot → epoch-chain map.
///
/// Created by its owner (usually a [`MountOrchestrator`](crate::MountOrchestrator))
/// and dropped with it; there is no process-global registry.
pub struct SlotCoordinator<K, M: ?Sized> {
    slots: Mutex<HashMap<K, Tail>>,
    next_epoch: AtomicU64,
    bus: Bus,
    _instance: std::marker::PhantomData<fn() -> Arc<M>>,
}

impl<K, M> SlotCoordinator<K, M>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: ?Sized + Send + Sync + 'static,
{
    /// Creates a coordinator publishing epoch events into `bus`.
    pub fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(0),
            bus,
            _instance: std::marker::PhantomData,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Tail>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bus epoch events are published to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Queues a new epoch for `slot` and spawns its driver.
    ///
    /// Returns immediately; the mount body runs once every earlier epoch of the
    /// slot has released. Must be called from within a tokio runtime.
    pub fn acquire<L>(self: &Arc<Self>, slot: K, lifecycle: L) -> SlotHandle<M>
    where
        L: Lifecycle<M>,
    {
        let id = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;
        let epoch = Arc::new(Epoch::new(
            id,
            Arc::from(format!("{slot:?}")),
            self.bus.clone(),
        ));

        let previous = self
            .lock()
            .insert(
                slot.clone(),
                Tail {
                    epoch: id,
                    released: epoch.released.clone(),
                },
            )
            .map(|tail| tail.released);

        self.bus.publish(epoch.event(EventKind::EpochQueued));

        let handle = SlotHandle { epoch };
        let driver = EpochDriver {
            coordinator: Arc::downgrade(self),
            slot,
            handle: handle.clone(),
            lifecycle,
            previous,
        };
        tokio::spawn(driver.run());
        handle
    }

    /// Returns true while any epoch of `slot` is queued, live, or tearing down.
    pub fn is_busy(&self, slot: &K) -> bool {
        self.lock().contains_key(slot)
    }

    /// Number of slots with at least one unreleased epoch.
    pub fn active_slots(&self) -> usize {
        self.lock().len()
    }

    fn prune(&self, slot: &K, epoch: u64) {
        let mut slots = self.lock();
        if slots.get(slot).is_some_and(|tail| tail.epoch == epoch) {
            slots.remove(slot);
        }
    }
}

/// Drives one epoch from queueing to release.
struct EpochDriver<K, M: ?Sized, L> {
    coordinator: Weak<SlotCoordinator<K, M>>,
    slot: K,
    handle: SlotHandle<M>,
    lifecycle: L,
    previous: Option<CancellationToken>,
}

impl<K, M, L> EpochDriver<K, M, L>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: ?Sized + Send + Sync + 'static,
    L: Lifecycle<M>,
{
    async fn run(self) {
        let epoch = Arc::clone(&self.handle.epoch);

        if let Some(previous) = &self.previous {
            previous.cancelled().await;
        }

        match self.mount(&epoch).await {
            Some(instance) => {
                if !epoch.is_release_requested() {
                    epoch.set_state(EpochState::Mounted);
                }
                match epoch.ready.publish(Arc::clone(&instance)) {
                    Publish::Published | Publish::AlreadyReady => {
                        epoch.bus.publish(epoch.event(EventKind::Mounted));
                    }
                    Publish::Closed => {
                        tracing::debug!(
                            slot = %epoch.slot,
                            epoch = epoch.id,
                            "released during mount; discarding instance"
                        );
                        epoch.bus.publish(epoch.event(EventKind::MountDiscarded));
                    }
                }

                epoch.release.cancelled().await;
                epoch.set_state(EpochState::Releasing);
                let last = epoch.ready.take_last().unwrap_or(instance);
                self.teardown(&epoch, last).await;
            }
            None => epoch.ready.close(),
        }

        epoch.set_state(EpochState::Released);
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.prune(&self.slot, epoch.id);
        }
        epoch.bus.publish(epoch.event(EventKind::Released));
        epoch.released.cancel();
    }

    /// Runs the mount body unless release was requested before it could start.
    async fn mount(&self, epoch: &Epoch<M>) -> Option<Arc<M>> {
        if epoch.is_release_requested() {
            tracing::debug!(
                slot = %epoch.slot,
                epoch = epoch.id,
                "released before mount started; skipping mount"
            );
            return None;
        }
        epoch.bus.publish(epoch.event(EventKind::MountStarting));

        let fut = self.lifecycle.mount(&self.handle);
        let err = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(instance)) => return Some(instance),
            Ok(Err(err)) => err,
            Err(panic) => MountError::Panicked {
                info: panic_message(panic.as_ref()),
            },
        };
        tracing::warn!(
            slot = %epoch.slot,
            epoch = epoch.id,
            error = %err,
            label = err.as_label(),
            "mount failed; epoch ends without instance"
        );
        epoch.bus.publish(
            epoch
                .event(EventKind::MountFailed)
                .with_reason(err.to_string()),
        );
        None
    }

    /// Tears `instance` down; failures are logged and swallowed.
    async fn teardown(&self, epoch: &Epoch<M>, instance: Arc<M>) {
        epoch.bus.publish(epoch.event(EventKind::TeardownStarting));

        let fut = self.lifecycle.unmount(instance);
        let err = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(panic) => TeardownError::Panicked {
                info: panic_message(panic.as_ref()),
            },
        };
        tracing::error!(
            slot = %epoch.slot,
            epoch = epoch.id,
            error = %err,
            label = err.as_label(),
            "teardown failed; releasing slot anyway"
        );
        epoch.bus.publish(
            epoch
                .event(EventKind::TeardownFailed)
                .with_reason(err.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::slot::LifecycleFn;
    use crate::test_support::Journal;

    type Coordinator = SlotCoordinator<&'static str, String>;

    fn coordinator() -> Arc<Coordinator> {
        SlotCoordinator::new(Bus::new(64))
    }

    /// Lifecycle that journals mount/unmount and sleeps `mount_ms` while mounting.
    fn journaled(
        journal: &Journal,
        name: &'static str,
        mount_ms: u64,
    ) -> impl Lifecycle<String> {
        let (mount_log, unmount_log) = (journal.clone(), journal.clone());
        LifecycleFn::new(
            move |_h: SlotHandle<String>| {
                let log = mount_log.clone();
                async move {
                    log.push(format!("mount-begin {name}"));
                    tokio::time::sleep(Duration::from_millis(mount_ms)).await;
                    log.push(format!("mount-end {name}"));
                    Ok(Arc::new(name.to_string()))
                }
            },
            move |instance: Arc<String>| {
                let log = unmount_log.clone();
                async move {
                    log.push(format!("unmount {instance}"));
                    Ok(())
                }
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_waits_for_full_teardown_of_the_first() {
        let coord = coordinator();
        let journal = Journal::default();

        let a = coord.acquire("S1", journaled(&journal, "A", 50));
        let b = coord.acquire("S1", journaled(&journal, "B", 5));
        assert_eq!(a.ready().await.as_deref().map(String::as_str), Some("A"));
        a.release();
        assert_eq!(b.ready().await.as_deref().map(String::as_str), Some("B"));

        assert_eq!(
            journal.entries(),
            vec!["mount-begin A", "mount-end A", "unmount A", "mount-begin B", "mount-end B"]
        );
        assert_eq!(a.state(), EpochState::Released);
        assert_eq!(b.state(), EpochState::Mounted);

        b.release();
        b.released().await;
        assert!(!coord.is_busy(&"S1"));
    }

    #[tokio::test(start_paused = true)]
    async fn never_two_mounted_epochs_per_slot() {
        let coord = coordinator();
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6_u64 {
            let (live_m, peak_m, live_u) = (live.clone(), peak.clone(), live.clone());
            let lifecycle = LifecycleFn::new(
                move |_h: SlotHandle<String>| {
                    let (live, peak) = (live_m.clone(), peak_m.clone());
                    async move {
                        tokio::time::sleep(Duration::from_millis(10 * (6 - i))).await;
                        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        Ok(Arc::new(format!("I{i}")))
                    }
                },
                move |_instance: Arc<String>| {
                    let live = live_u.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(3)).await;
                        live.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            );
            let handle = coord.acquire("S1", lifecycle);
            handle.run_when_ready({
                let handle = handle.clone();
                move |_| handle.release()
            });
            handles.push(handle);
        }

        for h in &handles {
            h.released().await;
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(coord.active_slots(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn release_during_mount_tears_down_without_ready() {
        let coord = coordinator();
        let journal = Journal::default();
        let started = Arc::new(Notify::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let lifecycle = {
            let (started, mlog, ulog) = (started.clone(), journal.clone(), journal.clone());
            LifecycleFn::new(
                move |_h: SlotHandle<String>| {
                    let (started, log) = (started.clone(), mlog.clone());
                    async move {
                        started.notify_one();
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        log.push("mounted I1");
                        Ok(Arc::new("I1".to_string()))
                    }
                },
                move |instance: Arc<String>| {
                    let log = ulog.clone();
                    async move {
                        log.push(format!("unmount {instance}"));
                        Ok(())
                    }
                },
            )
        };

        let handle = coord.acquire("S1", lifecycle);
        let counter = fired.clone();
        handle.run_when_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        started.notified().await;
        handle.release();
        let counter = fired.clone();
        handle.run_when_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.released().await;
        assert_eq!(journal.entries(), vec!["mounted I1", "unmount I1"]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(handle.current_instance().is_none());
        assert!(handle.ready().await.is_none());
        assert!(!coord.is_busy(&"S1"));
    }

    #[tokio::test(start_paused = true)]
    async fn release_before_mount_starts_skips_the_mount() {
        let coord = coordinator();
        let journal = Journal::default();

        let first = coord.acquire("S1", journaled(&journal, "A", 10));
        let queued = coord.acquire("S1", journaled(&journal, "B", 10));
        queued.release();
        first.ready().await;
        first.release();

        queued.released().await;
        assert_eq!(journal.entries(), vec!["mount-begin A", "mount-end A", "unmount A"]);
    }

    #[tokio::test]
    async fn mount_failure_frees_the_slot() {
        let coord = coordinator();
        let failing = LifecycleFn::new(
            |_h: SlotHandle<String>| async move {
                Err::<Arc<String>, _>(MountError::fail("no editor"))
            },
            |_i: Arc<String>| async move { Ok(()) },
        );
        let mut events = coord.bus().subscribe();

        let handle = coord.acquire("S1", failing);
        assert!(handle.ready().await.is_none());
        handle.released().await;
        assert_eq!(handle.state(), EpochState::Released);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&EventKind::MountFailed));
        assert!(!kinds.contains(&EventKind::TeardownStarting));

        let journal = Journal::default();
        let retry = coord.acquire("S1", journaled(&journal, "retry", 0));
        assert!(retry.ready().await.is_some());
    }

    #[tokio::test]
    async fn panicking_teardown_still_releases_the_slot() {
        let coord = coordinator();
        let exploding = LifecycleFn::new(
            |_h: SlotHandle<String>| async move { Ok(Arc::new("I1".to_string())) },
            |_i: Arc<String>| async move {
                if true {
                    panic!("destroy blew up");
                }
                Ok::<(), TeardownError>(())
            },
        );

        let first = coord.acquire("S1", exploding);
        first.ready().await;
        first.release();

        let journal = Journal::default();
        let next = coord.acquire("S1", journaled(&journal, "B", 0));
        assert!(next.ready().await.is_some());
        assert_eq!(first.state(), EpochState::Released);
    }

    #[tokio::test]
    async fn hot_swap_relabels_and_teardown_gets_last_instance() {
        let coord = coordinator();
        let journal = Journal::default();
        let handle = coord.acquire("S1", journaled(&journal, "I1", 0));
        handle.ready().await;

        let i2 = Arc::new("I2".to_string());
        assert!(handle.hot_swap(i2.clone()));
        assert!(handle.hot_swap(i2.clone()));
        assert_eq!(handle.current_instance().as_deref(), Some(&"I2".to_string()));

        handle.release();
        assert!(!handle.hot_swap(Arc::new("I3".to_string())));
        handle.released().await;
        assert_eq!(journal.entries(), vec!["mount-begin I1", "mount-end I1", "unmount I2"]);
    }

    #[tokio::test]
    async fn different_slots_do_not_wait_for_each_other() {
        let coord = coordinator();
        let journal = Journal::default();
        let a = coord.acquire("S1", journaled(&journal, "A", 0));
        let b = coord.acquire("S2", journaled(&journal, "B", 0));
        assert!(a.ready().await.is_some());
        assert!(b.ready().await.is_some());
        assert_eq!(coord.active_slots(), 2);
    }
}
