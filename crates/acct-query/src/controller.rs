#![forbid(unsafe_code)]

//! Gated submission of policy lookups and the result cells they feed.
//!
//! # State machine
//!
//! ```text
//!            submit (gate open)             fetch ok, current
//!   Idle ─────────────────────────▶ Pending ─────────────────▶ Idle (results replaced)
//!    ▲                                 │
//!    │ submit (gate open)              │ fetch err, current
//!    └──────────────────────────── Failed ◀──┘  (results kept)
//! ```
//!
//! A submit with a closed gate does nothing at all. Completions of requests
//! that have since been superseded are dropped regardless of outcome.
//!
//! Dropping a `submit` future before its fetch resolves cancels the request:
//! it stops being in flight and, if it was the newest, the state returns to
//! what it was before the submit (`Idle` if that was another `Pending`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use acct_runtime::{BatchScope, Observable, Subscription};
use acct_validation::{CompositeGate, TextField};
use web_time::Instant;

use crate::error::QueryFailed;
use crate::fetch::PolicyFetcher;
use crate::model::{Invoice, Policy, PolicyQuery, QueryResult};
use crate::sequencer::{Completion, QueryTrace, RequestSequencer, RequestToken};

/// Lifecycle of the most recent lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryState {
    /// No request outstanding; the last applied request (if any) succeeded.
    #[default]
    Idle,
    /// A request is in flight.
    Pending {
        /// The newest request.
        token: RequestToken,
    },
    /// The newest request failed; results are those of an earlier success.
    Failed(QueryFailed),
}

impl QueryState {
    /// Whether a request is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// The failure, if the newest request failed.
    #[must_use]
    pub fn failure(&self) -> Option<&QueryFailed> {
        match self {
            Self::Failed(failed) => Some(failed),
            _ => None,
        }
    }
}

/// What a call to [`QueryController::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The gate was closed; nothing was sent and nothing changed.
    Skipped,
    /// The response was applied to the result cells.
    Applied {
        /// The request whose response was applied.
        token: RequestToken,
    },
    /// A newer submit was issued while this one was in flight; its result
    /// was discarded.
    Superseded {
        /// The discarded request.
        token: RequestToken,
        /// The newest request at completion time.
        current: RequestToken,
    },
}

struct ControllerInner {
    gate: CompositeGate,
    identifier: TextField,
    date_cursor: TextField,
    fetcher: Rc<dyn PolicyFetcher>,
    invoices: Observable<Option<Vec<Invoice>>>,
    policy: Observable<Option<Policy>>,
    state: Observable<QueryState>,
    sequencer: RefCell<RequestSequencer>,
}

/// Cancels a submitted request unless settled before being dropped.
struct InFlight<'a> {
    inner: &'a ControllerInner,
    token: RequestToken,
    previous: QueryState,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let cancelled = self.inner.sequencer.borrow_mut().cancel(self.token);
        if !cancelled || self.inner.state.get() != (QueryState::Pending { token: self.token }) {
            return;
        }
        tracing::debug!(token = self.token.raw(), "policy lookup dropped before completion");
        let restored = match std::mem::take(&mut self.previous) {
            QueryState::Pending { .. } => QueryState::Idle,
            other => other,
        };
        self.inner.state.set(restored);
    }
}

/// Issues lookups when the gate allows and owns the result cells.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct QueryController {
    inner: Rc<ControllerInner>,
}

impl fmt::Debug for QueryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryController")
            .field("gate", &self.inner.gate)
            .field("state", &self.inner.state.get())
            .field("sequencer", &self.inner.sequencer.borrow())
            .finish_non_exhaustive()
    }
}

impl QueryController {
    /// Create a controller reading `identifier` and `date_cursor` when
    /// `gate` is satisfied.
    pub fn new(
        gate: CompositeGate,
        identifier: TextField,
        date_cursor: TextField,
        fetcher: Rc<dyn PolicyFetcher>,
    ) -> Self {
        Self::with_sequencer(gate, identifier, date_cursor, fetcher, RequestSequencer::new())
    }

    /// Like [`QueryController::new`] with an explicit sequencer, e.g. one
    /// driven by a fixed clock for deterministic traces.
    pub fn with_sequencer(
        gate: CompositeGate,
        identifier: TextField,
        date_cursor: TextField,
        fetcher: Rc<dyn PolicyFetcher>,
        sequencer: RequestSequencer,
    ) -> Self {
        Self {
            inner: Rc::new(ControllerInner {
                gate,
                identifier,
                date_cursor,
                fetcher,
                invoices: Observable::new(None),
                policy: Observable::new(None),
                state: Observable::new(QueryState::Idle),
                sequencer: RefCell::new(sequencer),
            }),
        }
    }

    /// Submit a lookup built from the current field values.
    ///
    /// Returns `Ok(Skipped)` without side effects when the gate is closed.
    /// On failure the result cells keep their previous values and the error
    /// is both returned and published through [`QueryController::state`].
    pub async fn submit(&self) -> Result<SubmitOutcome, QueryFailed> {
        let inner: &ControllerInner = &self.inner;
        if !inner.gate.is_satisfied() {
            tracing::debug!(failing = ?inner.gate.failing_inputs(), "submit skipped, gate closed");
            return Ok(SubmitOutcome::Skipped);
        }

        let query = PolicyQuery::new(inner.identifier.get(), inner.date_cursor.get());
        let token = inner.sequencer.borrow_mut().start();
        tracing::debug!(
            token = token.raw(),
            policy_number = %query.identifier,
            date_cursor = %query.date_cursor,
            "submitting policy lookup"
        );
        let previous = inner.state.get();
        inner.state.set(QueryState::Pending { token });
        let in_flight = InFlight {
            inner,
            token,
            previous,
            settled: false,
        };

        let started = Instant::now();
        let result = inner.fetcher.fetch_policy(&query).await;
        in_flight.settle();
        let completion =
            inner
                .sequencer
                .borrow_mut()
                .complete(token, result.is_ok(), started.elapsed());

        if let Completion::Stale { current } = completion {
            tracing::debug!(
                token = token.raw(),
                current = current.raw(),
                succeeded = result.is_ok(),
                "discarding stale lookup result"
            );
            return Ok(SubmitOutcome::Superseded { token, current });
        }

        match result {
            Ok(QueryResult { invoices, policy }) => {
                tracing::debug!(
                    token = token.raw(),
                    invoices = invoices.len(),
                    account_balance = ?policy.account_balance,
                    "applying lookup result"
                );
                let _batch = BatchScope::new();
                inner.invoices.set(Some(invoices));
                inner.policy.set(Some(policy));
                inner.state.set(QueryState::Idle);
                Ok(SubmitOutcome::Applied { token })
            }
            Err(error) => {
                tracing::warn!(token = token.raw(), kind = error.kind(), %error, "policy lookup failed");
                let failed = QueryFailed { token, error };
                inner.state.set(QueryState::Failed(failed.clone()));
                Err(failed)
            }
        }
    }

    /// Whether a submit right now would issue a request.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.inner.gate.is_satisfied()
    }

    /// The gate guarding submission.
    #[must_use]
    pub fn gate(&self) -> &CompositeGate {
        &self.inner.gate
    }

    /// Invoices of the last applied success; `None` before any.
    #[must_use]
    pub fn invoices(&self) -> Option<Vec<Invoice>> {
        self.inner.invoices.get()
    }

    /// Policy of the last applied success; `None` before any.
    #[must_use]
    pub fn policy(&self) -> Option<Policy> {
        self.inner.policy.get()
    }

    /// Current query state.
    #[must_use]
    pub fn state(&self) -> QueryState {
        self.inner.state.get()
    }

    /// The invoices cell.
    #[must_use]
    pub fn invoices_cell(&self) -> &Observable<Option<Vec<Invoice>>> {
        &self.inner.invoices
    }

    /// The policy cell.
    #[must_use]
    pub fn policy_cell(&self) -> &Observable<Option<Policy>> {
        &self.inner.policy
    }

    /// The query state cell.
    #[must_use]
    pub fn state_cell(&self) -> &Observable<QueryState> {
        &self.inner.state
    }

    /// Observe query state transitions.
    pub fn subscribe_state(&self, callback: impl Fn(&QueryState) + 'static) -> Subscription {
        self.inner.state.subscribe(callback)
    }

    /// Newest request token issued.
    #[must_use]
    pub fn current_token(&self) -> RequestToken {
        self.inner.sequencer.borrow().current_token()
    }

    /// Copy of the most recent request lifecycle events.
    #[must_use]
    pub fn trace(&self) -> QueryTrace {
        self.inner.sequencer.borrow().trace().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::ScriptedFetcher;
    use crate::sequencer::DEFAULT_TRACE_CAPACITY;
    use acct_validation::{Field, Required, ValidationRule};
    use async_trait::async_trait;
    use std::cell::Cell;

    /// Never answers.
    struct Stalled;

    #[async_trait(?Send)]
    impl PolicyFetcher for Stalled {
        async fn fetch_policy(&self, _query: &PolicyQuery) -> Result<QueryResult, FetchError> {
            std::future::pending().await
        }
    }

    fn text_field(name: &str, initial: &str) -> TextField {
        Field::new(
            name,
            initial.to_string(),
            vec![ValidationRule::from_validator(Required::new())],
        )
    }

    fn setup(fetcher: Rc<ScriptedFetcher>) -> (TextField, TextField, QueryController) {
        setup_with(fetcher, RequestSequencer::new())
    }

    fn setup_with(
        fetcher: Rc<dyn PolicyFetcher>,
        sequencer: RequestSequencer,
    ) -> (TextField, TextField, QueryController) {
        let identifier = text_field("identifier", "");
        let date_cursor = text_field("date_cursor", "2020-01-01");
        let gate = CompositeGate::builder()
            .input(identifier.clone())
            .input(date_cursor.clone())
            .build();
        let controller = QueryController::with_sequencer(
            gate,
            identifier.clone(),
            date_cursor.clone(),
            fetcher,
            sequencer,
        );
        (identifier, date_cursor, controller)
    }

    fn result(balance: f64, invoices: usize) -> QueryResult {
        QueryResult::new(vec![Invoice::default(); invoices], Policy::with_balance(balance))
    }

    #[tokio::test]
    async fn closed_gate_is_a_silent_no_op() {
        let fetcher = Rc::new(ScriptedFetcher::new().with_response(result(1.0, 1)));
        let (_identifier, _date, controller) = setup(Rc::clone(&fetcher));
        let state_version = controller.state_cell().version();

        assert_eq!(controller.submit().await, Ok(SubmitOutcome::Skipped));
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(controller.invoices(), None);
        assert_eq!(controller.policy(), None);
        assert_eq!(controller.state_cell().version(), state_version);
        assert!(controller.trace().is_empty());
    }

    #[tokio::test]
    async fn success_sets_both_cells() {
        let fetcher = Rc::new(ScriptedFetcher::new().with_response(result(500.0, 2)));
        let (identifier, _date, controller) = setup(Rc::clone(&fetcher));
        identifier.set("POL-1".into());

        let outcome = controller.submit().await;
        assert_eq!(
            outcome,
            Ok(SubmitOutcome::Applied {
                token: RequestToken::from_raw(1)
            })
        );
        assert_eq!(controller.invoices().map(|i| i.len()), Some(2));
        assert_eq!(
            controller.policy().and_then(|p| p.account_balance),
            Some(500.0)
        );
        assert_eq!(controller.state(), QueryState::Idle);

        let calls = fetcher.calls();
        assert_eq!(calls, vec![PolicyQuery::new("POL-1", "2020-01-01")]);
    }

    #[tokio::test]
    async fn observers_never_see_half_applied_results() {
        let fetcher = Rc::new(ScriptedFetcher::new().with_response(result(500.0, 2)));
        let (identifier, _date, controller) = setup(fetcher);
        identifier.set("POL-1".into());

        let torn = Rc::new(Cell::new(false));
        let seen = Rc::new(Cell::new(0));
        let policy_cell = controller.policy_cell().clone();
        let _sub = controller.invoices_cell().subscribe({
            let torn = Rc::clone(&torn);
            let seen = Rc::clone(&seen);
            move |invoices| {
                seen.set(seen.get() + 1);
                if invoices.is_some() != policy_cell.get().is_some() {
                    torn.set(true);
                }
            }
        });

        controller.submit().await.unwrap();
        assert_eq!(seen.get(), 1);
        assert!(!torn.get());
    }

    #[tokio::test]
    async fn failure_keeps_previous_results() {
        let fetcher = Rc::new(
            ScriptedFetcher::new()
                .with_response(result(500.0, 2))
                .with_failure(FetchError::Status {
                    status: 500,
                    message: "boom".into(),
                }),
        );
        let (identifier, _date, controller) = setup(fetcher);
        identifier.set("POL-1".into());
        controller.submit().await.unwrap();

        let err = controller.submit().await.unwrap_err();
        assert_eq!(err.token, RequestToken::from_raw(2));
        assert_eq!(controller.state(), QueryState::Failed(err.clone()));
        assert_eq!(controller.invoices().map(|i| i.len()), Some(2));
        assert_eq!(
            controller.policy().and_then(|p| p.account_balance),
            Some(500.0)
        );
    }

    #[tokio::test]
    async fn state_passes_through_pending() {
        let fetcher = Rc::new(ScriptedFetcher::new().with_response(result(0.0, 0)));
        let (identifier, _date, controller) = setup(fetcher);
        identifier.set("POL-1".into());

        let states = Rc::new(RefCell::new(Vec::new()));
        let _sub = controller.subscribe_state({
            let states = Rc::clone(&states);
            move |state| states.borrow_mut().push(state.clone())
        });

        controller.submit().await.unwrap();
        assert_eq!(
            *states.borrow(),
            vec![
                QueryState::Pending {
                    token: RequestToken::from_raw(1)
                },
                QueryState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn repeated_identical_submits_converge() {
        let fetcher = Rc::new(
            ScriptedFetcher::new()
                .with_response(result(75.0, 1))
                .with_response(result(75.0, 1)),
        );
        let (identifier, _date, controller) = setup(Rc::clone(&fetcher));
        identifier.set("POL-1".into());

        controller.submit().await.unwrap();
        let invoices_version = controller.invoices_cell().version();
        let policy_version = controller.policy_cell().version();
        controller.submit().await.unwrap();

        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(controller.invoices_cell().version(), invoices_version);
        assert_eq!(controller.policy_cell().version(), policy_version);
        assert!(controller.trace().verify_invariants().is_empty());
    }

    #[tokio::test]
    async fn dropped_submit_leaves_nothing_pending() {
        let (identifier, _date, controller) = setup_with(Rc::new(Stalled), RequestSequencer::new());
        identifier.set("POL-1".into());

        let states = Rc::new(RefCell::new(Vec::new()));
        let _sub = controller.subscribe_state({
            let states = Rc::clone(&states);
            move |state| states.borrow_mut().push(state.clone())
        });

        tokio::select! {
            biased;
            _ = controller.submit() => panic!("a stalled fetch cannot finish"),
            () = std::future::ready(()) => {}
        }

        let token = RequestToken::from_raw(1);
        assert_eq!(controller.state(), QueryState::Idle);
        assert_eq!(
            *states.borrow(),
            vec![QueryState::Pending { token }, QueryState::Idle]
        );
        assert!(!controller.inner.sequencer.borrow().is_pending());
        assert!(controller.trace().contains_event_type(token, "cancelled"));
        assert!(controller.trace().verify_invariants().is_empty());
        assert_eq!(controller.invoices(), None);
    }

    #[tokio::test]
    async fn dropped_submit_restores_an_earlier_failure() {
        let (identifier, _date, controller) = setup_with(Rc::new(Stalled), RequestSequencer::new());
        identifier.set("POL-1".into());
        let failed = QueryFailed {
            token: RequestToken::from_raw(9),
            error: FetchError::Transport("refused".into()),
        };
        controller.state_cell().set(QueryState::Failed(failed.clone()));

        tokio::select! {
            biased;
            _ = controller.submit() => panic!("a stalled fetch cannot finish"),
            () = std::future::ready(()) => {}
        }

        assert_eq!(controller.state(), QueryState::Failed(failed));
    }

    #[tokio::test]
    async fn trace_stays_bounded_over_many_submits() {
        let fetcher = Rc::new(ScriptedFetcher::new());
        let submits = 1000;
        for _ in 0..submits {
            fetcher.push(Ok(result(1.0, 1)));
        }
        let (identifier, _date, controller) = setup(Rc::clone(&fetcher));
        identifier.set("POL-1".into());

        for _ in 0..submits {
            controller.submit().await.unwrap();
        }

        let trace = controller.trace();
        assert_eq!(trace.len(), DEFAULT_TRACE_CAPACITY);
        assert!(trace.evicted() > 0);
        assert!(trace.contains_event_type(RequestToken::from_raw(submits), "applied"));
        assert!(trace.verify_invariants().is_empty());
    }

    #[tokio::test]
    async fn trace_capacity_is_configurable() {
        let fetcher = Rc::new(ScriptedFetcher::new());
        for _ in 0..50 {
            fetcher.push(Ok(result(1.0, 1)));
        }
        let (identifier, _date, controller) = setup_with(
            Rc::clone(&fetcher) as Rc<dyn PolicyFetcher>,
            RequestSequencer::new().with_trace_capacity(16),
        );
        identifier.set("POL-1".into());

        for _ in 0..50 {
            controller.submit().await.unwrap();
        }
        assert_eq!(controller.trace().len(), 16);
    }
}
