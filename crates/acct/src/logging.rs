#![forbid(unsafe_code)]

//! Subscriber installation for binaries and tests.
//!
//! Libraries in this workspace only emit `tracing` events. [`init`] installs
//! a formatting subscriber for callers that have none; it never replaces an
//! existing global subscriber.

use std::env;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "ACCT_LOG";

/// Directive used when neither variable is set or parseable.
pub const DEFAULT_DIRECTIVE: &str = "warn,acct=info";

/// Build the filter from `ACCT_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_DIRECTIVE`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    filter_from(env::var(LOG_ENV).ok(), env::var(EnvFilter::DEFAULT_ENV).ok())
}

fn filter_from(primary: Option<String>, fallback: Option<String>) -> EnvFilter {
    [primary, fallback]
        .into_iter()
        .flatten()
        .filter(|directive| !directive.trim().is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install a stderr formatting subscriber.
///
/// Returns `false` when a global subscriber already exists; that subscriber
/// is left in place.
pub fn init() -> bool {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_wins_over_fallback() {
        let filter = filter_from(Some("acct=trace".into()), Some("error".into()));
        assert_eq!(filter.to_string(), "acct=trace");
    }

    #[test]
    fn blank_or_invalid_falls_through() {
        let filter = filter_from(Some("  ".into()), Some("acct_query=debug".into()));
        assert_eq!(filter.to_string(), "acct_query=debug");

        let filter = filter_from(Some("acct=loud".into()), None);
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_DIRECTIVE).to_string());
    }

    #[test]
    fn second_init_does_not_clobber() {
        let _ = init();
        assert!(!init());
    }
}
