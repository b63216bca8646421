//! Property-based invariant tests for lookup fields and the readiness gate.
//!
//! 1. Identifier is valid iff its trimmed content is non-empty and it has at
//!    most 128 characters.
//! 2. A date cursor is valid iff it is exactly `YYYY-MM-DD` and its date
//!    starts strictly before the clock.
//! 3. The gate is satisfied iff both fields are valid.
//! 4. The first failing rule decides the error message.

use std::sync::Arc;

use acct_runtime::FixedClock;
use acct_validation::{
    CalendarDate, CompositeGate, ERROR_CODE_DATE, ERROR_CODE_FUTURE_DATE, ERROR_CODE_MAX_LENGTH,
    ERROR_CODE_REQUIRED, Field, MaxLength, NotInFuture, Required, TextField, ValidationRule,
};
use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;

const MAX_IDENTIFIER_LEN: usize = 128;

fn identifier_field() -> TextField {
    Field::new(
        "identifier",
        String::new(),
        vec![
            ValidationRule::from_validator(Required::new()),
            ValidationRule::from_validator(MaxLength::new(MAX_IDENTIFIER_LEN)),
        ],
    )
}

fn date_field(clock: &FixedClock, initial: &str) -> TextField {
    Field::new(
        "date_cursor",
        initial.to_string(),
        vec![
            ValidationRule::from_validator(CalendarDate::new()),
            ValidationRule::from_validator(NotInFuture::new(Arc::new(clock.clone()))),
        ],
    )
}

fn reference_clock() -> FixedClock {
    FixedClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// ── Strategies ────────────────────────────────────────────────────────────

fn non_blank_identifier() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _-]{0,127}".prop_filter_map("needs visible content", |prefix| {
        let s = format!("{prefix}X");
        (s.chars().count() <= MAX_IDENTIFIER_LEN).then_some(s)
    })
}

fn blank_identifier() -> impl Strategy<Value = String> {
    "[ \t\n]{0,40}"
}

fn overlong_identifier() -> impl Strategy<Value = String> {
    (MAX_IDENTIFIER_LEN + 1..MAX_IDENTIFIER_LEN + 200).prop_map(|len| "P".repeat(len))
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn identifier_with_content_within_limit_is_valid(id in non_blank_identifier()) {
        let field = identifier_field();
        field.set(id);
        prop_assert!(field.is_valid());
        prop_assert!(field.error_message().is_none());
    }

    #[test]
    fn blank_identifier_is_invalid(id in blank_identifier()) {
        let field = identifier_field();
        field.set(id);
        prop_assert!(!field.is_valid());
        prop_assert_eq!(field.validate().error().unwrap().code, ERROR_CODE_REQUIRED);
    }

    #[test]
    fn overlong_identifier_is_invalid(id in overlong_identifier()) {
        let field = identifier_field();
        field.set(id);
        prop_assert!(!field.is_valid());
        prop_assert_eq!(field.validate().error().unwrap().code, ERROR_CODE_MAX_LENGTH);
    }

    #[test]
    fn dates_before_now_are_valid(days_back in 1i64..20_000) {
        let clock = reference_clock();
        let date = reference_date() - TimeDelta::days(days_back);
        let field = date_field(&clock, &date.format("%Y-%m-%d").to_string());
        prop_assert!(field.is_valid());
    }

    #[test]
    fn dates_at_or_after_now_are_invalid(days_ahead in 0i64..20_000) {
        let clock = reference_clock();
        let date = reference_date() + TimeDelta::days(days_ahead);
        let field = date_field(&clock, &date.format("%Y-%m-%d").to_string());
        prop_assert!(!field.is_valid());
        prop_assert_eq!(field.validate().error().unwrap().code, ERROR_CODE_FUTURE_DATE);
    }

    #[test]
    fn unparseable_dates_fail_on_format_first(raw in "[a-z/ ]{0,12}") {
        let clock = reference_clock();
        let field = date_field(&clock, &raw);
        prop_assert_eq!(field.validate().error().unwrap().code, ERROR_CODE_DATE);
    }

    #[test]
    fn padded_dates_fail_on_format(
        days_back in 1i64..20_000,
        pad in "[ \t\n]{1,3}",
        leading in any::<bool>(),
    ) {
        let clock = reference_clock();
        let date = (reference_date() - TimeDelta::days(days_back)).format("%Y-%m-%d");
        let raw = if leading { format!("{pad}{date}") } else { format!("{date}{pad}") };
        let field = date_field(&clock, &raw);
        prop_assert!(!field.is_valid());
        prop_assert_eq!(field.validate().error().unwrap().code, ERROR_CODE_DATE);
    }

    #[test]
    fn gate_is_and_of_fields(id_ok in any::<bool>(), date_ok in any::<bool>()) {
        let clock = reference_clock();
        let identifier = identifier_field();
        let date_cursor = date_field(&clock, "2024-06-01");
        let gate = CompositeGate::builder()
            .input(identifier.clone())
            .input(date_cursor.clone())
            .build();

        if id_ok {
            identifier.set("POL-100".into());
        }
        if date_ok {
            date_cursor.set("2020-01-01".into());
        }
        prop_assert_eq!(gate.is_satisfied(), id_ok && date_ok);
        prop_assert_eq!(gate.is_satisfied(), identifier.is_valid() && date_cursor.is_valid());
    }
}

#[test]
fn gate_follows_the_clock_without_field_changes() {
    let clock = reference_clock();
    let identifier = identifier_field();
    identifier.set("POL-100".into());
    let date_cursor = date_field(&clock, "2024-01-05");
    let gate = CompositeGate::builder()
        .input(identifier)
        .input(date_cursor)
        .build();

    assert!(!gate.is_satisfied());
    clock.advance(TimeDelta::days(5));
    assert!(!gate.is_satisfied(), "midnight of the same instant is not before it");
    clock.advance(TimeDelta::minutes(1));
    assert!(gate.is_satisfied());
}
