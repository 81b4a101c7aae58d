//! Debounce scheduler for combinator flushes.
//!
//! A [`Scheduler`] wraps one callback and collapses any number of
//! [`request`](Scheduler::request) calls made before the next tick into a
//! single deferred invocation. Every combinator owns its own scheduler, so
//! unrelated combinators never share a pending flag.
//!
//! ```
//! use rxmodel::{Scheduler, TaskQueue};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let queue = TaskQueue::new();
//! let calls = Arc::new(AtomicUsize::new(0));
//!
//! let c = calls.clone();
//! let scheduler = Scheduler::new(Arc::new(queue.clone()), move || {
//!     c.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! scheduler.request();
//! scheduler.request();
//! scheduler.request();
//! queue.run_until_idle();
//!
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::task::Executor;

struct SchedulerInner {
    /// Set while a flush is posted but has not started yet.
    pending: AtomicBool,
    callback: Box<dyn Fn() + Send + Sync>,
}

/// Coalesces repeated requests into one deferred call.
///
/// Cloning a scheduler yields another handle to the same pending flag.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    executor: Arc<dyn Executor>,
}

impl Scheduler {
    /// Create a scheduler that runs `callback` on `executor`.
    pub fn new<F>(executor: Arc<dyn Executor>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SchedulerInner {
                pending: AtomicBool::new(false),
                callback: Box::new(callback),
            }),
            executor,
        }
    }

    /// Ask for a flush.
    ///
    /// Posts one deferred invocation if none is pending; otherwise does
    /// nothing. Returns `true` if this call posted the flush.
    pub fn request(&self) -> bool {
        if self.inner.pending.swap(true, Ordering::AcqRel) {
            tracing::trace!(target: "rxmodel::scheduler", "flush already pending");
            return false;
        }

        let inner = self.inner.clone();
        self.executor.post_boxed(Box::new(move || {
            // Clear first so the callback itself can schedule the next burst.
            inner.pending.store(false, Ordering::Release);
            tracing::trace!(target: "rxmodel::scheduler", "flushing");
            (inner.callback)();
        }));
        tracing::trace!(target: "rxmodel::scheduler", "flush posted");
        true
    }

    /// Whether a flush is posted and has not started yet.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Invoke the callback right now, bypassing the queue.
    ///
    /// A pending flush is left in place.
    pub fn run_now(&self) {
        (self.inner.callback)();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskQueue;
    use std::sync::atomic::AtomicUsize;

    fn counting(queue: &TaskQueue) -> (Scheduler, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let scheduler = Scheduler::new(Arc::new(queue.clone()), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (scheduler, calls)
    }

    #[test]
    fn test_request_is_deferred() {
        let queue = TaskQueue::new();
        let (scheduler, calls) = counting(&queue);

        assert!(scheduler.request());
        assert!(scheduler.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        queue.run_pending();
        assert!(!scheduler.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_burst_coalesces() {
        let queue = TaskQueue::new();
        let (scheduler, calls) = counting(&queue);

        assert!(scheduler.request());
        for _ in 0..10 {
            assert!(!scheduler.request());
        }
        assert_eq!(queue.pending_count(), 1);

        queue.run_until_idle();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_burst_after_flush() {
        let queue = TaskQueue::new();
        let (scheduler, calls) = counting(&queue);

        scheduler.request();
        queue.run_until_idle();
        scheduler.request();
        scheduler.request();
        queue.run_until_idle();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_schedulers_are_independent() {
        let queue = TaskQueue::new();
        let (first, first_calls) = counting(&queue);
        let (second, second_calls) = counting(&queue);

        first.request();
        assert!(second.request());
        first.request();

        queue.run_until_idle();
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_can_request_again() {
        let queue = TaskQueue::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<parking_lot::Mutex<Option<Scheduler>>> = Arc::new(parking_lot::Mutex::new(None));
        let slot_clone = slot.clone();
        let c = calls.clone();
        let scheduler = Scheduler::new(Arc::new(queue.clone()), move || {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(s) = slot_clone.lock().as_ref() {
                    assert!(s.request());
                }
            }
        });
        *slot.lock() = Some(scheduler.clone());

        scheduler.request();
        queue.run_until_idle();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Break the self-reference.
        slot.lock().take();
    }
}
