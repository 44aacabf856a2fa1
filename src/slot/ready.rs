//! # Once-ready callback queue.
//!
//! [`ReadyQueue`] is a single-assignment cell with a FIFO of waiters:
//!
//! ```text
//!            publish(v)/replace(v)                 replace(v')
//! Pending ──────────────────────────► Ready(v) ───────────────► Ready(v')
//!    │   (flush waiters in order)        │
//!    │ close()                           │ close()
//!    ▼                                   ▼
//! Closed(None)                       Closed(Some(v))
//! (waiters dropped)                  (last value kept for teardown)
//! ```
//!
//! ## Rules
//! - Every callback runs **at most once**, in registration order.
//! - Callbacks registered while `Ready` run immediately on the caller's task.
//! - Callbacks registered while `Pending` are dropped, never invoked, if the queue closes first.
//! - Callbacks never run while the internal lock is held.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// Callback invoked with the ready value.
pub type ReadyCallback<M> = Box<dyn FnOnce(Arc<M>) + Send + 'static>;

enum Cell<M: ?Sized> {
    Pending(VecDeque<ReadyCallback<M>>),
    Ready(Arc<M>),
    Closed(Option<Arc<M>>),
}

/// Outcome of [`ReadyQueue::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The value became the ready value; pending callbacks were flushed.
    Published,
    /// A value was already ready (installed by `replace`); it is kept.
    AlreadyReady,
    /// The queue was closed; nothing was published.
    Closed,
}

/// Single-assignment value with a FIFO of once-callbacks.
pub struct ReadyQueue<M: ?Sized> {
    cell: Mutex<Cell<M>>,
}

impl<M: ?Sized + Send + Sync + 'static> Default for ReadyQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized + Send + Sync + 'static> ReadyQueue<M> {
    /// Creates an empty, pending queue.
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(Cell::Pending(VecDeque::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell<M>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `cb` now if a value is ready, later on first readiness otherwise.
    ///
    /// Dropped without being called if the queue is (or becomes) closed first.
    pub fn run_when_ready<F>(&self, cb: F)
    where
        F: FnOnce(Arc<M>) + Send + 'static,
    {
        let mut cell = self.lock();
        match &mut *cell {
            Cell::Pending(waiters) => waiters.push_back(Box::new(cb)),
            Cell::Ready(value) => {
                let value = Arc::clone(value);
                drop(cell);
                cb(value);
            }
            Cell::Closed(_) => {}
        }
    }

    /// Waits for the first ready value; `None` if the queue closes first.
    pub async fn wait(&self) -> Option<Arc<M>> {
        let (tx, rx) = oneshot::channel();
        self.run_when_ready(move |value| {
            let _ = tx.send(value);
        });
        rx.await.ok()
    }

    /// Publishes the first value. A value installed earlier by [`replace`](Self::replace) wins.
    pub fn publish(&self, value: Arc<M>) -> Publish {
        let mut cell = self.lock();
        let waiters = match &mut *cell {
            Cell::Ready(_) => return Publish::AlreadyReady,
            Cell::Closed(_) => return Publish::Closed,
            Cell::Pending(waiters) => std::mem::take(waiters),
        };
        *cell = Cell::Ready(Arc::clone(&value));
        drop(cell);
        flush(waiters, &value);
        Publish::Published
    }

    /// Replaces the ready value, flushing still-pending callbacks against it.
    ///
    /// Returns `false` (and does nothing) once the queue is closed.
    pub fn replace(&self, value: Arc<M>) -> bool {
        let mut cell = self.lock();
        let previous = match &mut *cell {
            Cell::Closed(_) => return false,
            other => std::mem::replace(other, Cell::Ready(Arc::clone(&value))),
        };
        drop(cell);
        if let Cell::Pending(waiters) = previous {
            flush(waiters, &value);
        }
        true
    }

    /// Closes the queue: pending callbacks are dropped, the last value is kept
    /// for [`take_last`](Self::take_last). Idempotent.
    pub fn close(&self) {
        let mut cell = self.lock();
        let previous = match &mut *cell {
            Cell::Closed(_) => return,
            other => std::mem::replace(other, Cell::Closed(None)),
        };
        let waiters = match previous {
            Cell::Ready(value) => {
                *cell = Cell::Closed(Some(value));
                None
            }
            Cell::Pending(waiters) => Some(waiters),
            Cell::Closed(_) => None,
        };
        drop(cell);
        drop(waiters);
    }

    /// Returns the ready value, if any. Closed queues report `None`.
    pub fn current(&self) -> Option<Arc<M>> {
        match &*self.lock() {
            Cell::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Takes the value kept by [`close`](Self::close).
    pub fn take_last(&self) -> Option<Arc<M>> {
        match &mut *self.lock() {
            Cell::Closed(last) => last.take(),
            _ => None,
        }
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        matches!(&*self.lock(), Cell::Closed(_))
    }
}

fn flush<M: ?Sized>(waiters: VecDeque<ReadyCallback<M>>, value: &Arc<M>) {
    for cb in waiters {
        cb(Arc::clone(value));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> ReadyCallback<str>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: &'static str| -> ReadyCallback<str> {
            let sink = Arc::clone(&sink);
            Box::new(move |v: Arc<str>| sink.lock().expect("lock").push(format!("{tag}:{v}")))
        };
        (log, make)
    }

    #[test]
    fn callbacks_before_and_after_ready_fire_once_in_order() {
        let q: ReadyQueue<str> = ReadyQueue::new();
        let (log, cb) = recorder();

        q.run_when_ready(cb("a"));
        q.run_when_ready(cb("b"));
        assert_eq!(q.publish(Arc::from("i1")), Publish::Published);
        q.run_when_ready(cb("c"));

        assert_eq!(*log.lock().expect("lock"), vec!["a:i1", "b:i1", "c:i1"]);
        assert_eq!(q.publish(Arc::from("i2")), Publish::AlreadyReady);
        assert_eq!(log.lock().expect("lock").len(), 3);
    }

    #[test]
    fn close_before_ready_drops_waiters() {
        let q: ReadyQueue<str> = ReadyQueue::new();
        let (log, cb) = recorder();

        q.run_when_ready(cb("a"));
        q.close();
        q.run_when_ready(cb("b"));

        assert_eq!(q.publish(Arc::from("late")), Publish::Closed);
        assert!(!q.replace(Arc::from("late")));
        assert!(log.lock().expect("lock").is_empty());
        assert!(q.take_last().is_none());
    }

    #[test]
    fn replace_flushes_pending_and_wins_over_publish() {
        let q: ReadyQueue<str> = ReadyQueue::new();
        let (log, cb) = recorder();

        q.run_when_ready(cb("a"));
        assert!(q.replace(Arc::from("swapped")));
        assert_eq!(q.publish(Arc::from("mounted")), Publish::AlreadyReady);
        assert!(q.replace(Arc::from("swapped-again")));

        assert_eq!(*log.lock().expect("lock"), vec!["a:swapped"]);
        assert_eq!(q.current().as_deref(), Some("swapped-again"));
    }

    #[test]
    fn close_keeps_last_value_for_teardown() {
        let q: ReadyQueue<str> = ReadyQueue::new();
        q.publish(Arc::from("i1"));
        q.close();
        q.close();

        assert!(q.is_closed());
        assert!(q.current().is_none());
        assert_eq!(q.take_last().as_deref(), Some("i1"));
        assert!(q.take_last().is_none());
    }

    #[tokio::test]
    async fn wait_resolves_on_publish_or_none_on_close() {
        let q: Arc<ReadyQueue<str>> = Arc::new(ReadyQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.wait().await })
        };
        tokio::task::yield_now().await;
        q.publish(Arc::from("ready"));
        assert_eq!(waiter.await.expect("join").as_deref(), Some("ready"));

        let closed: ReadyQueue<str> = ReadyQueue::new();
        closed.close();
        assert!(closed.wait().await.is_none());
    }
}
