#![forbid(unsafe_code)]

//! Runtime primitives for the policy lookup core.
//!
//! # Key Components
//!
//! - [`Observable`] - Shared, version-tracked value cell with change notification
//! - [`Computed`] - Memoized value derived from observables
//! - [`BatchScope`] - Defers notifications so several cells change as one step
//! - [`Clock`] - Substitutable source of "now" ([`SystemClock`], [`FixedClock`])
//!
//! # Role in the workspace
//! `acct-runtime` is the leaf crate. Validation builds its fields on
//! [`Observable`], the query controller publishes its result cells through it,
//! and every time-dependent rule reads the current moment from a [`Clock`].

pub mod clock;
pub mod reactive;

pub use clock::{Clock, FixedClock, SystemClock};
pub use reactive::{BatchScope, Computed, Observable, Subscription};
