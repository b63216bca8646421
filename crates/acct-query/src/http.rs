#![forbid(unsafe_code)]

//! HTTP implementation of [`PolicyFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::fetch::PolicyFetcher;
use crate::model::{PolicyQuery, QueryResult};

/// Default path of the lookup endpoint, relative to the base URL.
pub const DEFAULT_ENDPOINT: &str = "/policy";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches lookups with `GET <base><endpoint>?policyNumber=..&dateCursor=..`.
#[derive(Debug, Clone)]
pub struct HttpPolicyFetcher {
    client: Client,
    base_url: String,
    endpoint: String,
}

impl HttpPolicyFetcher {
    /// Create a fetcher for `base_url` using [`DEFAULT_ENDPOINT`] and
    /// [`DEFAULT_TIMEOUT`].
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        Self::with_options(base_url, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with an explicit endpoint path and timeout.
    pub fn with_options(base_url: &str, endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint: normalize_endpoint(endpoint),
        })
    }

    /// The full lookup URL, without query parameters.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[async_trait(?Send)]
impl PolicyFetcher for HttpPolicyFetcher {
    async fn fetch_policy(&self, query: &PolicyQuery) -> Result<QueryResult, FetchError> {
        let url = self.url();
        tracing::debug!(
            url = %url,
            policy_number = %query.identifier,
            date_cursor = %query.date_cursor,
            "fetching policy"
        );

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "policy lookup returned an error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        decode_body(&body)
    }
}

#[derive(Deserialize)]
struct RejectionBody {
    message: String,
}

/// Decode a lookup response body.
///
/// The backend answers an unknown policy with `{"message": "..."}` and a
/// success status; that shape maps to [`FetchError::Rejected`]. Anything else
/// lacking `invoices` or `policy` is [`FetchError::Malformed`].
pub fn decode_body(body: &str) -> Result<QueryResult, FetchError> {
    let value: Value = serde_json::from_str(body)?;

    let has_payload = value.get("invoices").is_some() && value.get("policy").is_some();
    if !has_payload
        && let Ok(rejection) = serde_json::from_value::<RejectionBody>(value.clone())
    {
        return Err(FetchError::Rejected(rejection.message));
    }

    Ok(serde_json::from_value(value)?)
}
