#![forbid(unsafe_code)]

//! Policy lookup facade.
//!
//! This crate is the surface a UI layer uses: [`PolicyViewModel`] plus the
//! configuration and logging needed to stand one up. Lower layers are
//! re-exported as [`runtime`], [`validation`] and [`query`].
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use acct::prelude::*;
//! use acct::runtime::FixedClock;
//! use chrono::{TimeZone, Utc};
//!
//! let fetcher = ScriptedFetcher::new()
//!     .with_response(QueryResult::new(vec![], Policy::with_balance(0.0)));
//! let clock = FixedClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let vm = PolicyViewModel::new(Rc::new(fetcher), Arc::new(clock));
//!
//! vm.set_identifier("POL-100");
//! vm.set_date_cursor("2020-01-01");
//! assert!(vm.is_ready());
//! ```

use std::fmt;

pub mod config;
pub mod logging;
pub mod view_model;

// --- Re-exports -------------------------------------------------------------

pub use acct_query::{
    FetchError, HttpPolicyFetcher, Invoice, Policy, PolicyFetcher, PolicyQuery, QueryController,
    QueryFailed, QueryResult, QueryState, ScriptedFetcher, SubmitOutcome,
};
pub use acct_runtime::{Clock, FixedClock, SystemClock};
pub use acct_validation::{CompositeGate, TextField};
pub use config::LookupConfig;
pub use view_model::{InvoiceSummary, PolicyViewModel};

// --- Errors -----------------------------------------------------------------

/// Top-level error type for lookup applications.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration.
    Config(String),
    /// The fetcher could not be set up.
    Fetch(FetchError),
    /// A submitted lookup failed.
    Query(QueryFailed),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "{msg}"),
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Fetch(err) => Some(err),
            Self::Query(err) => Some(err),
        }
    }
}

impl From<QueryFailed> for Error {
    fn from(err: QueryFailed) -> Self {
        Self::Query(err)
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

/// Standard result type for lookup APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude ----------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Clock, Error, FetchError, Invoice, InvoiceSummary, LookupConfig, Policy, PolicyFetcher,
        PolicyViewModel, QueryFailed, QueryResult, QueryState, Result, ScriptedFetcher,
        SubmitOutcome, TextField,
    };

    pub use crate::{query, runtime, validation};
}

pub use acct_query as query;
pub use acct_runtime as runtime;
pub use acct_validation as validation;
