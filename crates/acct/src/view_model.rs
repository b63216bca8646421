#![forbid(unsafe_code)]

//! The object a UI binds to.
//!
//! [`PolicyViewModel`] wires the identifier and date-cursor fields, the gate
//! over them and a [`QueryController`] into one owned value. A UI sets field
//! values, reads validity and messages, calls [`PolicyViewModel::submit`] and
//! renders from the result cells and their derived summary.

use std::rc::Rc;
use std::sync::Arc;

use acct_query::{
    HttpPolicyFetcher, Invoice, Policy, PolicyFetcher, QueryController, QueryFailed, QueryState,
    SubmitOutcome,
};
use acct_runtime::{Clock, Computed, Observable, Subscription, SystemClock};
use acct_validation::{
    CalendarDate, CompositeGate, DATE_FORMAT, Field, MaxLength, NotInFuture, Required, TextField,
    ValidationRule,
};
use serde::Serialize;

use crate::config::LookupConfig;
use crate::{Error, Result};

/// Name of the identifier field.
pub const IDENTIFIER_FIELD: &str = "identifier";
/// Name of the date-cursor field.
pub const DATE_CURSOR_FIELD: &str = "date_cursor";

/// Display totals over the current invoices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InvoiceSummary {
    /// Number of invoices.
    pub count: usize,
    /// Sum of `amount_due`; invoices without a readable amount count as zero.
    pub total_amount_due: f64,
}

impl InvoiceSummary {
    fn of(invoices: Option<&[Invoice]>) -> Self {
        let invoices = invoices.unwrap_or_default();
        Self {
            count: invoices.len(),
            total_amount_due: invoices.iter().filter_map(Invoice::amount_due).sum(),
        }
    }
}

/// Inputs, readiness and results of the policy lookup screen.
pub struct PolicyViewModel {
    identifier: TextField,
    date_cursor: TextField,
    gate: CompositeGate,
    controller: QueryController,
    summary: Computed<InvoiceSummary>,
}

impl std::fmt::Debug for PolicyViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyViewModel")
            .field("identifier", &self.identifier)
            .field("date_cursor", &self.date_cursor)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl PolicyViewModel {
    /// Create a view model with default limits.
    ///
    /// The identifier starts empty; the date cursor starts at `clock`'s
    /// current date.
    pub fn new(fetcher: Rc<dyn PolicyFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(fetcher, clock, &LookupConfig::default())
    }

    /// Create a view model using `config`'s identifier limit.
    pub fn with_config(
        fetcher: Rc<dyn PolicyFetcher>,
        clock: Arc<dyn Clock>,
        config: &LookupConfig,
    ) -> Self {
        let identifier: TextField = Field::new(
            IDENTIFIER_FIELD,
            String::new(),
            vec![
                ValidationRule::from_validator(Required::new()),
                ValidationRule::from_validator(MaxLength::new(config.identifier_max_len)),
            ],
        );

        let today = clock.today().format(DATE_FORMAT).to_string();
        let date_cursor: TextField = Field::new(
            DATE_CURSOR_FIELD,
            today,
            vec![
                ValidationRule::from_validator(CalendarDate::new()),
                ValidationRule::from_validator(NotInFuture::new(clock)),
            ],
        );

        let gate = CompositeGate::builder()
            .input(identifier.clone())
            .input(date_cursor.clone())
            .build();
        let controller =
            QueryController::new(gate.clone(), identifier.clone(), date_cursor.clone(), fetcher);
        let summary = Computed::from_observable(controller.invoices_cell(), |invoices| {
            InvoiceSummary::of(invoices.as_deref())
        });

        tracing::debug!(
            identifier_max_len = config.identifier_max_len,
            date_cursor = %date_cursor.get(),
            "policy view model created"
        );

        Self {
            identifier,
            date_cursor,
            gate,
            controller,
            summary,
        }
    }

    /// Create a view model that talks HTTP to `config.base_url` and reads the
    /// system clock.
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        let fetcher =
            HttpPolicyFetcher::with_options(&config.base_url, &config.endpoint, config.timeout)
                .map_err(Error::Fetch)?;
        Ok(Self::with_config(
            Rc::new(fetcher),
            Arc::new(SystemClock),
            config,
        ))
    }

    // --- Inputs ------------------------------------------------------------

    /// The policy identifier field.
    #[must_use]
    pub fn identifier(&self) -> &TextField {
        &self.identifier
    }

    /// The date-cursor field.
    #[must_use]
    pub fn date_cursor(&self) -> &TextField {
        &self.date_cursor
    }

    /// Set the identifier.
    pub fn set_identifier(&self, value: impl Into<String>) {
        self.identifier.set(value.into());
    }

    /// Set the date cursor.
    pub fn set_date_cursor(&self, value: impl Into<String>) {
        self.date_cursor.set(value.into());
    }

    // --- Readiness ---------------------------------------------------------

    /// The gate over both fields.
    #[must_use]
    pub fn gate(&self) -> &CompositeGate {
        &self.gate
    }

    /// Whether a submit would issue a request now.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gate.is_satisfied()
    }

    /// `(field name, message)` for every failing field, in field order.
    #[must_use]
    pub fn field_errors(&self) -> Vec<(&str, String)> {
        [&self.identifier, &self.date_cursor]
            .into_iter()
            .filter_map(|field| Some((field.name(), field.error_message()?)))
            .collect()
    }

    // --- Action ------------------------------------------------------------

    /// Submit a lookup; see [`QueryController::submit`].
    pub async fn submit(&self) -> std::result::Result<SubmitOutcome, QueryFailed> {
        self.controller.submit().await
    }

    /// The controller behind [`PolicyViewModel::submit`].
    #[must_use]
    pub fn controller(&self) -> &QueryController {
        &self.controller
    }

    // --- Results -----------------------------------------------------------

    /// Invoices of the last applied lookup.
    #[must_use]
    pub fn invoices(&self) -> Option<Vec<Invoice>> {
        self.controller.invoices()
    }

    /// Policy of the last applied lookup.
    #[must_use]
    pub fn policy(&self) -> Option<Policy> {
        self.controller.policy()
    }

    /// Balance of the last applied lookup, if the backend sent one.
    #[must_use]
    pub fn account_balance(&self) -> Option<f64> {
        self.controller
            .policy_cell()
            .with(|policy| policy.as_ref().and_then(|p| p.account_balance))
    }

    /// Count and total of the current invoices.
    #[must_use]
    pub fn invoice_summary(&self) -> InvoiceSummary {
        self.summary.get()
    }

    /// The derived summary cell.
    #[must_use]
    pub fn summary_cell(&self) -> &Computed<InvoiceSummary> {
        &self.summary
    }

    /// Current query state.
    #[must_use]
    pub fn state(&self) -> QueryState {
        self.controller.state()
    }

    /// The invoices cell, for UI bindings.
    #[must_use]
    pub fn invoices_cell(&self) -> &Observable<Option<Vec<Invoice>>> {
        self.controller.invoices_cell()
    }

    /// The policy cell, for UI bindings.
    #[must_use]
    pub fn policy_cell(&self) -> &Observable<Option<Policy>> {
        self.controller.policy_cell()
    }

    /// Observe query state transitions.
    pub fn subscribe_state(&self, callback: impl Fn(&QueryState) + 'static) -> Subscription {
        self.controller.subscribe_state(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acct_query::{QueryResult, ScriptedFetcher};
    use acct_runtime::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap())
    }

    #[test]
    fn initial_state() {
        let vm = PolicyViewModel::new(Rc::new(ScriptedFetcher::new()), Arc::new(clock()));
        assert_eq!(vm.identifier().get(), "");
        assert_eq!(vm.date_cursor().get(), "2024-01-01");
        assert!(vm.date_cursor().is_valid());
        assert!(!vm.is_ready());
        assert_eq!(vm.invoices(), None);
        assert_eq!(vm.policy(), None);
        assert_eq!(vm.account_balance(), None);
        assert_eq!(vm.invoice_summary(), InvoiceSummary::default());
        assert_eq!(vm.state(), QueryState::Idle);
    }

    #[test]
    fn field_errors_name_each_failing_field() {
        let vm = PolicyViewModel::new(Rc::new(ScriptedFetcher::new()), Arc::new(clock()));
        vm.set_date_cursor("2031-01-01");
        let errors = vm.field_errors();
        assert_eq!(
            errors,
            vec![
                (IDENTIFIER_FIELD, "This field is required".to_string()),
                (DATE_CURSOR_FIELD, "Date must be in the past".to_string()),
            ]
        );
        vm.set_identifier("POL-1");
        vm.set_date_cursor("2020-01-01");
        assert!(vm.field_errors().is_empty());
        assert!(vm.is_ready());
    }

    #[test]
    fn configured_identifier_limit_applies() {
        let config = LookupConfig::default().with_identifier_max_len(4);
        let vm = PolicyViewModel::with_config(
            Rc::new(ScriptedFetcher::new()),
            Arc::new(clock()),
            &config,
        );
        vm.set_identifier("POL-1");
        assert_eq!(
            vm.identifier().error_message().as_deref(),
            Some("Must be at most 4 characters")
        );
    }

    #[tokio::test]
    async fn summary_follows_invoices() {
        let fetcher = Rc::new(ScriptedFetcher::new().with_response(QueryResult::new(
            vec![
                Invoice::new(json!({ "amount_due": 400 })),
                Invoice::new(json!({ "amount_due": "400.00" })),
                Invoice::new(json!({ "amount_due": null })),
                Invoice::new("I4"),
            ],
            Policy::with_balance(1200.0),
        )));
        let vm = PolicyViewModel::new(fetcher, Arc::new(clock()));
        vm.set_identifier("Policy Two");
        vm.set_date_cursor("2015-06-01");

        assert_eq!(vm.invoice_summary().count, 0);
        vm.submit().await.unwrap();
        assert!(vm.summary_cell().is_dirty());
        assert_eq!(
            vm.invoice_summary(),
            InvoiceSummary {
                count: 4,
                total_amount_due: 800.0
            }
        );
        assert_eq!(vm.account_balance(), Some(1200.0));
    }

    #[test]
    fn from_config_builds_http_backed_model() {
        let vm = PolicyViewModel::from_config(&LookupConfig::default()).unwrap();
        assert!(!vm.is_ready());
    }
}
