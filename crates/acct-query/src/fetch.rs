#![forbid(unsafe_code)]

//! The fetch seam between the query controller and the backend.

use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{PolicyQuery, QueryResult};

/// Performs one policy lookup.
///
/// Implementations run on the caller's thread; the controller awaits them
/// without holding any borrow on its own state.
#[async_trait(?Send)]
pub trait PolicyFetcher {
    /// Fetch invoices and the policy record for `query`.
    async fn fetch_policy(&self, query: &PolicyQuery) -> Result<QueryResult, FetchError>;
}

/// A fetcher that replays canned responses in order and records every query.
///
/// Once the script is exhausted every further call fails with a transport
/// error.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: RefCell<VecDeque<Result<QueryResult, FetchError>>>,
    calls: RefCell<Vec<PolicyQuery>>,
}

impl ScriptedFetcher {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    #[must_use]
    pub fn with_response(self, result: QueryResult) -> Self {
        self.responses.borrow_mut().push_back(Ok(result));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_failure(self, error: FetchError) -> Self {
        self.responses.borrow_mut().push_back(Err(error));
        self
    }

    /// Queue another response after construction.
    pub fn push(&self, response: Result<QueryResult, FetchError>) {
        self.responses.borrow_mut().push_back(response);
    }

    /// Queries received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<PolicyQuery> {
        self.calls.borrow().clone()
    }

    /// Number of queries received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

#[async_trait(?Send)]
impl PolicyFetcher for ScriptedFetcher {
    async fn fetch_policy(&self, query: &PolicyQuery) -> Result<QueryResult, FetchError> {
        self.calls.borrow_mut().push(query.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("no scripted response left".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Policy;

    #[tokio::test]
    async fn replays_in_order_and_records_calls() {
        let fetcher = ScriptedFetcher::new()
            .with_response(QueryResult::new(vec![], Policy::with_balance(10.0)))
            .with_failure(FetchError::Rejected("unknown policy".into()));

        let first = fetcher
            .fetch_policy(&PolicyQuery::new("A", "2020-01-01"))
            .await;
        assert_eq!(first.unwrap().policy.account_balance, Some(10.0));

        let second = fetcher
            .fetch_policy(&PolicyQuery::new("B", "2020-01-02"))
            .await;
        assert_eq!(second, Err(FetchError::Rejected("unknown policy".into())));

        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(fetcher.calls()[1].identifier, "B");
        assert_eq!(fetcher.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_fails() {
        let fetcher = ScriptedFetcher::new();
        let result = fetcher
            .fetch_policy(&PolicyQuery::new("A", "2020-01-01"))
            .await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
