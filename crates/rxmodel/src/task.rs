//! Deferred task queue that defines the "next tick".
//!
//! Combinator flushes never run inside the write that caused them. They are
//! posted to an [`Executor`] and run once the current call stack is done and
//! the host drives the queue. [`TaskQueue`] is the built-in executor: a FIFO
//! of boxed closures that the host drains one tick at a time.
//!
//! A tick runs only the tasks that were queued when it started. Anything
//! posted while the tick is running (for example a flush caused by a
//! combinator callback that writes another property) lands in the next tick.
//!
//! # Example
//!
//! ```
//! use rxmodel::TaskQueue;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let queue = TaskQueue::new();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! let c = counter.clone();
//! queue.post(move || {
//!     c.fetch_add(1, Ordering::SeqCst);
//! });
//! assert_eq!(counter.load(Ordering::SeqCst), 0);
//!
//! assert_eq!(queue.run_pending(), 1);
//! assert_eq!(counter.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::logging::span_names;

/// Default cap on the number of ticks [`TaskQueue::run_until_idle`] runs.
pub const DEFAULT_MAX_TICKS: usize = 1024;

/// A boxed task closure.
pub type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a task later, on a later turn of its loop.
///
/// Implementations must never run the task inside `post` itself.
pub trait Executor: Send + Sync {
    /// Queue `task` for deferred execution.
    fn post_boxed(&self, task: BoxedTask);
}

/// A unique identifier for a posted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique task IDs.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

struct TaskData {
    id: TaskId,
    task: BoxedTask,
}

struct QueueInner {
    sender: Sender<TaskData>,
    receiver: Receiver<TaskData>,
    max_ticks: usize,
}

/// A cloneable handle to a FIFO task queue.
///
/// All clones share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

static GLOBAL_QUEUE: OnceLock<TaskQueue> = OnceLock::new();

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::with_max_ticks(DEFAULT_MAX_TICKS)
    }

    /// Create an empty queue whose [`run_until_idle`](Self::run_until_idle)
    /// stops after `max_ticks` ticks.
    pub fn with_max_ticks(max_ticks: usize) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(QueueInner {
                sender,
                receiver,
                max_ticks: max_ticks.max(1),
            }),
        }
    }

    /// The process-wide queue used by [`Model::new`](crate::Model::new).
    pub fn global() -> &'static TaskQueue {
        GLOBAL_QUEUE.get_or_init(TaskQueue::new)
    }

    /// Post a task to run on the next tick.
    pub fn post<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Box::new(task))
    }

    fn push(&self, task: BoxedTask) -> TaskId {
        let id = next_task_id();
        // The receiver lives in the same Arc as the sender, so this cannot
        // be disconnected.
        let _ = self.inner.sender.send(TaskData { id, task });
        id
    }

    /// Check if there are any pending tasks.
    pub fn has_pending(&self) -> bool {
        !self.inner.receiver.is_empty()
    }

    /// Get the number of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.inner.receiver.len()
    }

    /// Run one tick: the tasks that are pending right now, in FIFO order.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let count = self.inner.receiver.len();
        let _span = tracing::trace_span!(span_names::TICK, count).entered();
        let mut ran = 0;
        for _ in 0..count {
            match self.inner.receiver.try_recv() {
                Ok(data) => {
                    tracing::trace!(target: "rxmodel::task", task = data.id.as_u64(), "running task");
                    (data.task)();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Run ticks until the queue is empty or the tick cap is reached.
    ///
    /// Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..self.inner.max_ticks {
            if !self.has_pending() {
                return total;
            }
            total += self.run_pending();
        }
        if self.has_pending() {
            tracing::warn!(
                target: "rxmodel::task",
                max_ticks = self.inner.max_ticks,
                pending = self.pending_count(),
                "task queue still busy after tick cap, giving up"
            );
        }
        total
    }

    /// Drop every pending task without running it.
    pub fn clear(&self) -> usize {
        self.inner.receiver.try_iter().count()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for TaskQueue {
    fn post_boxed(&self, task: BoxedTask) {
        self.push(task);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending_count())
            .field("max_ticks", &self.inner.max_ticks)
            .finish()
    }
}
