#![forbid(unsafe_code)]

//! Terminal front end for the policy lookup.
//!
//! Sets the view model's fields from the command line, reports field errors
//! when the lookup is not ready, otherwise submits and prints the result as
//! JSON on stdout.

use std::env;
use std::process;

use acct::PolicyViewModel;
use acct::config::LookupConfig;
use acct::logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
acct-lookup: look up a policy's invoices and account balance

USAGE:
    acct-lookup [OPTIONS] <POLICY_NUMBER>

OPTIONS:
    --date=YYYY-MM-DD    Date cursor (default: today)
    --base-url=URL       Backend base URL (default: http://localhost:5000)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    ACCT_LOOKUP_BASE_URL            Backend base URL
    ACCT_LOOKUP_ENDPOINT            Lookup path (default: /policy)
    ACCT_LOOKUP_TIMEOUT_MS          Request timeout in milliseconds
    ACCT_LOOKUP_IDENTIFIER_MAX_LEN  Maximum policy number length
    ACCT_LOG                        Log filter (falls back to RUST_LOG)";

struct Opts {
    policy_number: String,
    date_cursor: Option<String>,
    base_url: Option<String>,
}

fn parse_args() -> Opts {
    let mut policy_number = None;
    let mut date_cursor = None;
    let mut base_url = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            "--version" | "-V" => {
                println!("acct-lookup {VERSION}");
                process::exit(0);
            }
            other => {
                if let Some(val) = other.strip_prefix("--date=") {
                    date_cursor = Some(val.to_string());
                } else if let Some(val) = other.strip_prefix("--base-url=") {
                    base_url = Some(val.to_string());
                } else if other.starts_with("--") {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Run with --help for usage information.");
                    process::exit(2);
                } else if policy_number.replace(other.to_string()).is_some() {
                    eprintln!("Only one policy number may be given.");
                    process::exit(2);
                }
            }
        }
    }

    Opts {
        // An absent number is reported by the field's own validation.
        policy_number: policy_number.unwrap_or_default(),
        date_cursor,
        base_url,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    let opts = parse_args();

    let mut config = LookupConfig::from_env();
    if let Some(base_url) = opts.base_url {
        config = config.with_base_url(base_url);
    }

    let vm = match PolicyViewModel::from_config(&config) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("Failed to initialize: {err}");
            process::exit(1);
        }
    };

    vm.set_identifier(opts.policy_number);
    if let Some(date) = opts.date_cursor {
        vm.set_date_cursor(date);
    }

    if !vm.is_ready() {
        for (field, message) in vm.field_errors() {
            eprintln!("{field}: {message}");
        }
        process::exit(2);
    }

    if let Err(err) = vm.submit().await {
        eprintln!("Lookup failed: {err}");
        process::exit(1);
    }

    let output = serde_json::json!({
        "policy": vm.policy(),
        "invoices": vm.invoices(),
        "summary": vm.invoice_summary(),
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Failed to render result: {err}");
            process::exit(1);
        }
    }
}
