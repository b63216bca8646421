#![forbid(unsafe_code)]

//! Request and response records for the policy lookup endpoint.
//!
//! Only the shape of `invoices` (an array) and `policy.account_balance` (a
//! number or `null`) is checked. Everything else in a payload is kept as
//! sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters of one lookup, read from the input fields at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyQuery {
    /// Policy identifier.
    #[serde(rename = "policyNumber")]
    pub identifier: String,
    /// Calendar date (`YYYY-MM-DD`) the account balance is computed at.
    #[serde(rename = "dateCursor")]
    pub date_cursor: String,
}

impl PolicyQuery {
    /// Create a query.
    #[must_use]
    pub fn new(identifier: impl Into<String>, date_cursor: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            date_cursor: date_cursor.into(),
        }
    }
}

/// One invoice, kept exactly as the backend sent it.
///
/// Invoices are replaced wholesale on every applied lookup and never
/// inspected by the query core, so any JSON value is accepted: objects,
/// scalars, members of any type. The accessors read known members leniently
/// and return `None` for anything they cannot interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Invoice(Value);

impl Invoice {
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// A member of an object invoice; `None` for scalar invoices.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `amount_due` member as a number. Numeric strings are accepted.
    #[must_use]
    pub fn amount_due(&self) -> Option<f64> {
        let amount = self.get("amount_due")?;
        amount
            .as_f64()
            .or_else(|| amount.as_str()?.trim().parse().ok())
    }
}

impl Default for Invoice {
    /// An empty object.
    fn default() -> Self {
        Self(Value::Object(Map::new()))
    }
}

impl From<Value> for Invoice {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The policy record.
///
/// `account_balance` is the one member with a checked shape: it must be
/// present and be a number or `null`. Everything else is carried in `extra`
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Net amount due at the date cursor; `None` when the backend sent `null`.
    #[serde(deserialize_with = "Option::deserialize")]
    pub account_balance: Option<f64>,
    /// Every other member, as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Policy {
    /// A policy record carrying only a balance.
    #[must_use]
    pub fn with_balance(account_balance: f64) -> Self {
        Self {
            account_balance: Some(account_balance),
            ..Self::default()
        }
    }

    /// A member other than `account_balance`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The `policy_number` member, when it is a string.
    #[must_use]
    pub fn policy_number(&self) -> Option<&str> {
        self.get("policy_number").and_then(Value::as_str)
    }
}

/// A successful lookup payload. Both members are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Must be an array; its elements are opaque.
    pub invoices: Vec<Invoice>,
    /// Must be an object carrying `account_balance`.
    pub policy: Policy,
}

impl QueryResult {
    /// Create a result.
    #[must_use]
    pub fn new(invoices: Vec<Invoice>, policy: Policy) -> Self {
        Self { invoices, policy }
    }
}
