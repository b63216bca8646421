#![forbid(unsafe_code)]

//! Validation-gated policy lookups.
//!
//! A [`QueryController`] reads two validated text fields, asks a
//! [`PolicyFetcher`] for the matching invoices and policy once its
//! [`CompositeGate`](acct_validation::CompositeGate) is satisfied, and
//! publishes the response through observable cells. Requests are sequenced
//! by [`RequestSequencer`] so only the newest submit can change the results.

pub mod controller;
pub mod error;
pub mod fetch;
pub mod http;
pub mod model;
pub mod sequencer;

pub use controller::{QueryController, QueryState, SubmitOutcome};
pub use error::{FetchError, QueryFailed};
pub use fetch::{PolicyFetcher, ScriptedFetcher};
pub use http::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, HttpPolicyFetcher, decode_body};
pub use model::{Invoice, Policy, PolicyQuery, QueryResult};
pub use sequencer::{
    Completion, DEFAULT_TRACE_CAPACITY, QueryEvent, QueryTrace, RequestSequencer, RequestToken,
};
