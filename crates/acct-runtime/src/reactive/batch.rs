#![forbid(unsafe_code)]

//! Notification batching.
//!
//! A [`BatchScope`] holds back every [`Observable`](super::Observable)
//! notification raised while it is alive. Values change immediately; callbacks
//! run once the outermost scope is dropped, each observable notifying at most
//! once with its final value.

use std::cell::RefCell;
use std::marker::PhantomData;

type PendingNotify = Box<dyn FnOnce()>;

#[derive(Default)]
struct BatchContext {
    depth: usize,
    pending: Vec<(usize, PendingNotify)>,
}

thread_local! {
    static BATCH: RefCell<BatchContext> = RefCell::new(BatchContext::default());
}

/// RAII guard deferring observable notifications until it is dropped.
///
/// ```rust
/// use acct_runtime::{BatchScope, Observable};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = Observable::new(0);
/// let b = Observable::new(0);
/// let seen = Rc::new(Cell::new((0, 0)));
///
/// let (a2, b2, seen2) = (a.clone(), b.clone(), Rc::clone(&seen));
/// let _sub = a.subscribe(move |_| seen2.set((a2.get(), b2.get())));
///
/// {
///     let _batch = BatchScope::new();
///     a.set(1);
///     b.set(2);
/// }
/// assert_eq!(seen.get(), (1, 2));
/// ```
#[must_use = "notifications flush as soon as the scope is dropped"]
pub struct BatchScope {
    // Scopes are tied to the thread-local context that created them.
    _not_send: PhantomData<*const ()>,
}

impl BatchScope {
    /// Open a batch scope on the current thread.
    pub fn new() -> Self {
        BATCH.with(|ctx| ctx.borrow_mut().depth += 1);
        Self {
            _not_send: PhantomData,
        }
    }

    /// Whether a batch scope is currently open on this thread.
    #[must_use]
    pub fn is_active() -> bool {
        BATCH.with(|ctx| ctx.borrow().depth > 0)
    }

    /// Number of distinct notifications waiting for the outermost scope.
    #[must_use]
    pub fn pending_count() -> usize {
        BATCH.with(|ctx| ctx.borrow().pending.len())
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let pending = BATCH.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            ctx.depth = ctx.depth.saturating_sub(1);
            if ctx.depth == 0 {
                std::mem::take(&mut ctx.pending)
            } else {
                Vec::new()
            }
        });
        if !pending.is_empty() {
            tracing::trace!(count = pending.len(), "flushing batched notifications");
        }
        for (_, notify) in pending {
            notify();
        }
    }
}

/// Queue a notification for the open batch.
///
/// Returns `false` (dropping `notify`) when no batch is open, in which case the
/// caller must notify immediately. A source already queued is not queued twice.
pub(crate) fn defer(source: usize, notify: impl FnOnce() + 'static) -> bool {
    BATCH.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        if ctx.depth == 0 {
            return false;
        }
        if !ctx.pending.iter().any(|(id, _)| *id == source) {
            ctx.pending.push((source, Box::new(notify)));
        }
        true
    })
}
