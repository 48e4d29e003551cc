//! Bounded-concurrency task queue with a drop-oldest backlog.
//!
//! At most `max_concurrency` tasks run at once. Further tasks wait in a FIFO
//! backlog; when the backlog grows past `max_queue_length`, the oldest
//! pending task is dropped and its [`TaskHandle`] resolves to
//! [`QueueError::Dropped`]. Running tasks are never dropped. When a task
//! settles, successfully or not, the next backlog task starts on its slot.
//!
//! Tasks run on the ambient tokio runtime, so [`ConcurrencyQueue::enqueue`]
//! must be called from within one.
//!
//! # Example
//!
//! ```
//! use socket_sdk::queue::ConcurrencyQueue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), socket_sdk::queue::QueueError> {
//! let queue = ConcurrencyQueue::new(2, None)?;
//! let handle = queue.enqueue(|| async { 21 * 2 });
//! assert_eq!(handle.await?, 42);
//! queue.on_idle().await;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, instrument, trace, warn};

/// Errors surfaced by the queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Maximum concurrency was zero.
    #[error("invalid concurrency value {value}: must be at least 1")]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// The task was evicted from the backlog before it started.
    #[error("task {id} was dropped from the queue backlog before it started")]
    Dropped {
        /// Queue-assigned task id.
        id: u64,
    },

    /// The task panicked while running.
    #[error("task {id} panicked while running")]
    Panicked {
        /// Queue-assigned task id.
        id: u64,
    },
}

type StartFn = Box<dyn FnOnce() + Send>;

struct PendingTask {
    id: u64,
    start: StartFn,
}

#[derive(Default)]
struct State {
    active: usize,
    backlog: VecDeque<PendingTask>,
    next_id: u64,
}

struct Shared {
    max_concurrency: usize,
    max_queue_length: Option<usize>,
    state: Mutex<State>,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands a finished task's slot to the next pending task, or frees it.
    fn settle(&self) {
        let next = {
            let mut state = self.lock();
            match state.backlog.pop_front() {
                Some(task) => Some(task),
                None => {
                    state.active = state.active.saturating_sub(1);
                    if state.active == 0 {
                        self.idle.notify_waiters();
                    }
                    None
                }
            }
        };
        if let Some(task) = next {
            trace!(id = task.id, "starting task from backlog");
            (task.start)();
        }
    }
}

/// Releases the task's slot on every exit path, including panics and cancellation.
struct SlotGuard {
    shared: Arc<Shared>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.shared.settle();
    }
}

/// Bounded-concurrency scheduler.
///
/// Cheap to clone; clones share the same slots and backlog.
#[derive(Clone)]
pub struct ConcurrencyQueue {
    shared: Arc<Shared>,
}

impl fmt::Debug for ConcurrencyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ConcurrencyQueue")
            .field("max_concurrency", &self.shared.max_concurrency)
            .field("max_queue_length", &self.shared.max_queue_length)
            .field("active", &state.active)
            .field("pending", &state.backlog.len())
            .finish()
    }
}

impl ConcurrencyQueue {
    /// Creates a queue running at most `max_concurrency` tasks at once.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConcurrency`] when `max_concurrency` is 0.
    pub fn new(max_concurrency: usize, max_queue_length: Option<usize>) -> Result<Self, QueueError> {
        if max_concurrency == 0 {
            return Err(QueueError::InvalidConcurrency {
                value: max_concurrency,
            });
        }
        debug!(max_concurrency, ?max_queue_length, "creating concurrency queue");
        Ok(Self {
            shared: Arc::new(Shared {
                max_concurrency,
                max_queue_length,
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
        })
    }

    /// Schedules `task`, starting it now if a slot is free.
    ///
    /// The returned handle resolves with the task's output, or with
    /// [`QueueError::Dropped`] if backlog overflow evicted it first.
    #[instrument(level = "trace", skip_all)]
    pub fn enqueue<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let shared = Arc::clone(&self.shared);

        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;

        let start: StartFn = Box::new(move || {
            let guard = SlotGuard { shared };
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await
                    .map_err(|_| {
                        warn!(id, "queued task panicked");
                        QueueError::Panicked { id }
                    });
                // The caller may have stopped waiting; the outcome is discarded then.
                let _ = sender.send(outcome);
                drop(guard);
            });
        });

        if state.active < self.shared.max_concurrency {
            state.active += 1;
            drop(state);
            trace!(id, "starting task immediately");
            start();
            return TaskHandle { id, receiver };
        }

        state.backlog.push_back(PendingTask { id, start });
        let mut dropped = Vec::new();
        if let Some(limit) = self.shared.max_queue_length {
            while state.backlog.len() > limit {
                if let Some(oldest) = state.backlog.pop_front() {
                    dropped.push(oldest);
                }
            }
        }
        let pending = state.backlog.len();
        drop(state);

        for task in dropped {
            warn!(id = task.id, pending, "queue backlog full, dropping oldest pending task");
        }
        TaskHandle { id, receiver }
    }

    /// Tasks currently running.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.lock().active
    }

    /// Tasks waiting in the backlog.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.lock().backlog.len()
    }

    /// Whether nothing is running or pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.active == 0 && state.backlog.is_empty()
    }

    /// Resolves once no task is running or pending; immediately if already idle.
    pub async fn on_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Completion handle for an enqueued task.
#[must_use = "dropping a handle discards the task's result"]
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    receiver: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> TaskHandle<T> {
    /// Queue-assigned task id, increasing in enqueue order.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::Dropped { id })))
    }
}
