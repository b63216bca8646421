#![forbid(unsafe_code)]

//! Observable cells for view state.
//!
//! - [`Observable`] holds a shared value and tells subscribers when it changes.
//! - [`Subscription`] keeps a callback registered for as long as it lives.
//! - [`Computed`] caches a value derived from observables and recomputes it on
//!   the first read after a source changed.
//! - [`BatchScope`] holds back notifications so that several cells can change
//!   in what observers see as a single step.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Callbacks are held
//! weakly by the cell; a dead callback is pruned on the next notification.
//!
//! # Invariants
//!
//! 1. A set that changes the value bumps the version once; an equal set
//!    changes nothing and notifies nobody.
//! 2. Subscribers run in registration order, with no borrow of the cell held.
//! 3. Inside a batch values change immediately; each changed cell notifies
//!    once, with its latest value, when the outermost scope ends.

pub mod batch;
pub mod computed;
pub mod observable;

pub use batch::BatchScope;
pub use computed::Computed;
pub use observable::{Observable, Subscription};
