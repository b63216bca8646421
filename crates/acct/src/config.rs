#![forbid(unsafe_code)]

//! Lookup configuration.
//!
//! # Env Var Contract
//!
//! - `ACCT_LOOKUP_BASE_URL` - backend base URL
//! - `ACCT_LOOKUP_ENDPOINT` - lookup path relative to the base URL
//! - `ACCT_LOOKUP_TIMEOUT_MS` - request timeout in milliseconds
//! - `ACCT_LOOKUP_IDENTIFIER_MAX_LEN` - maximum identifier length in characters
//!
//! Unset variables keep their defaults. Unparseable numbers fail open: the
//! default is kept and a warning is logged.

use std::env;
use std::time::Duration;

use acct_query::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use serde::Deserialize;

use crate::Error;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Default maximum identifier length.
pub const DEFAULT_IDENTIFIER_MAX_LEN: usize = 128;

const ENV_BASE_URL: &str = "ACCT_LOOKUP_BASE_URL";
const ENV_ENDPOINT: &str = "ACCT_LOOKUP_ENDPOINT";
const ENV_TIMEOUT_MS: &str = "ACCT_LOOKUP_TIMEOUT_MS";
const ENV_IDENTIFIER_MAX_LEN: &str = "ACCT_LOOKUP_IDENTIFIER_MAX_LEN";

/// Settings for a [`PolicyViewModel`](crate::PolicyViewModel) and its HTTP
/// fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Backend base URL.
    pub base_url: String,
    /// Lookup path relative to `base_url`.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum identifier length in characters.
    pub identifier_max_len: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            identifier_max_len: DEFAULT_IDENTIFIER_MAX_LEN,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    base_url: Option<String>,
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    identifier_max_len: Option<usize>,
}

impl LookupConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the lookup path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum identifier length.
    #[must_use]
    pub fn with_identifier_max_len(mut self, max: usize) -> Self {
        self.identifier_max_len = max;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS) {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<usize>(&lookup, ENV_IDENTIFIER_MAX_LEN) {
            config.identifier_max_len = max;
        }

        config
    }

    /// Parse a JSON object. Members are optional; unknown members are an
    /// error.
    ///
    /// ```json
    /// { "base_url": "https://acct.example", "timeout_ms": 5000 }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|err| Error::Config(format!("invalid lookup config: {err}")))?;
        let defaults = Self::default();
        Ok(Self {
            base_url: raw.base_url.unwrap_or(defaults.base_url),
            endpoint: raw.endpoint.unwrap_or(defaults.endpoint),
            timeout: raw
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            identifier_max_len: raw
                .identifier_max_len
                .unwrap_or(defaults.identifier_max_len),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}
