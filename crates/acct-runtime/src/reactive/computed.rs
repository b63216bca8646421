#![forbid(unsafe_code)]

//! Memoized values derived from observables.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::observable::{Observable, Subscription};

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: Option<T>,
    dirty: bool,
    recomputes: u64,
    sources: Vec<Subscription>,
}

/// A lazily recomputed value derived from one or more observables.
///
/// A change in any source only marks the value dirty; the derivation runs on
/// the next [`get`](Computed::get).
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty)
            .field("sources", &inner.sources.len())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Derive a value from a single observable.
    pub fn from_observable<S>(source: &Observable<S>, map: impl Fn(&S) -> T + 'static) -> Self
    where
        S: Clone + PartialEq + 'static,
    {
        let src = source.clone();
        let computed = Self::detached(move || src.with(|value| map(value)));
        computed.track(source);
        computed
    }

    /// Derive a value from two observables.
    pub fn from2<A, B>(
        a: &Observable<A>,
        b: &Observable<B>,
        map: impl Fn(&A, &B) -> T + 'static,
    ) -> Self
    where
        A: Clone + PartialEq + 'static,
        B: Clone + PartialEq + 'static,
    {
        let (src_a, src_b) = (a.clone(), b.clone());
        let computed = Self::detached(move || src_a.with(|va| src_b.with(|vb| map(va, vb))));
        computed.track(a);
        computed.track(b);
        computed
    }

    fn detached(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                compute: Box::new(compute),
                cached: None,
                dirty: true,
                recomputes: 0,
                sources: Vec::new(),
            })),
        }
    }

    fn track<S: Clone + PartialEq + 'static>(&self, source: &Observable<S>) {
        let weak = Rc::downgrade(&self.inner);
        let subscription = source.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().dirty = true;
            }
        });
        self.inner.borrow_mut().sources.push(subscription);
    }

    /// Current derived value, recomputing if any source changed.
    #[must_use]
    pub fn get(&self) -> T {
        let mut inner = self.inner.borrow_mut();
        if !inner.dirty
            && let Some(value) = &inner.cached
        {
            return value.clone();
        }
        let value = (inner.compute)();
        inner.cached = Some(value.clone());
        inner.dirty = false;
        inner.recomputes += 1;
        value
    }

    /// Whether the next `get` will recompute.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty
    }

    /// How many times the derivation has run.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.borrow().recomputes
    }
}
