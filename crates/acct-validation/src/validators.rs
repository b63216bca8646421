#![forbid(unsafe_code)]

//! Checks for the lookup inputs and the result type they report through.
//!
//! Every check implements [`Validator`]. A failed check carries a stable
//! `code` (one of the `ERROR_CODE_*` constants) and a message template whose
//! `{name}` placeholders are filled from the error's params.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use acct_runtime::Clock;
use chrono::{NaiveDate, NaiveTime};

/// Code reported by [`Required`].
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Code reported by [`MaxLength`].
pub const ERROR_CODE_MAX_LENGTH: &str = "too_long";
/// Code reported by [`CalendarDate`].
pub const ERROR_CODE_DATE: &str = "invalid_date";
/// Code reported by [`NotInFuture`].
pub const ERROR_CODE_FUTURE_DATE: &str = "future_date";
/// Code reported by [`Predicate`].
pub const ERROR_CODE_PREDICATE: &str = "predicate";

/// `chrono` format string for date cursors.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Byte offsets of the separators in a `YYYY-MM-DD` date cursor.
const DATE_SEPARATORS: [usize; 2] = [4, 7];
const DATE_LEN: usize = 10;

// --- Failure reporting ------------------------------------------------------

/// Why a value was rejected.
///
/// ```rust
/// use acct_validation::ValidationError;
///
/// let error = ValidationError::new("too_long", "At most {max} characters, got {actual}")
///     .with_param("max", 128)
///     .with_param("actual", 130);
///
/// assert_eq!(error.to_string(), "At most 128 characters, got 130");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// One of the `ERROR_CODE_*` constants, or a caller-defined code.
    pub code: &'static str,
    /// Message template with `{name}` placeholders.
    pub message: String,
    /// Placeholder values, keyed by name.
    pub params: BTreeMap<String, String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    /// Record a value for the `{key}` placeholder.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// The message with every known placeholder filled in. Unknown
    /// placeholders are left as written.
    #[must_use]
    pub fn format_message(&self) -> String {
        self.params
            .iter()
            .fold(self.message.clone(), |text, (key, value)| {
                text.replace(&format!("{{{key}}}"), value)
            })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_message())
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of running a [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// The rejection, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        if let Self::Invalid(error) = self {
            Some(error)
        } else {
            None
        }
    }

    /// The rendered rejection message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ValidationError::format_message)
    }

    fn reject(error: ValidationError) -> Self {
        Self::Invalid(error)
    }
}

/// A check over values of type `T`.
///
/// Implementations must be `Send + Sync` so rules can be shared behind an
/// `Arc`.
///
/// ```rust
/// use acct_validation::{ValidationError, ValidationResult, Validator};
///
/// struct PolicyPrefix(&'static str);
///
/// impl Validator<str> for PolicyPrefix {
///     fn validate(&self, number: &str) -> ValidationResult {
///         match number.strip_prefix(self.0) {
///             Some(rest) if !rest.is_empty() => ValidationResult::Valid,
///             _ => ValidationResult::Invalid(
///                 ValidationError::new("prefix", self.error_message()).with_param("prefix", self.0),
///             ),
///         }
///     }
///
///     fn error_message(&self) -> &str {
///         "Policy numbers start with {prefix}"
///     }
/// }
///
/// let check = PolicyPrefix("POL-");
/// assert!(check.validate("POL-100").is_valid());
/// assert_eq!(
///     check.validate("100").error_message().as_deref(),
///     Some("Policy numbers start with POL-")
/// );
/// ```
pub trait Validator<T: ?Sized>: Send + Sync {
    fn validate(&self, value: &T) -> ValidationResult;

    /// Message template reported on failure.
    fn error_message(&self) -> &str;
}

// --- Text checks ------------------------------------------------------------

/// Rejects empty and whitespace-only text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl Required {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator<str> for Required {
    fn validate(&self, value: &str) -> ValidationResult {
        if !value.trim().is_empty() {
            return ValidationResult::Valid;
        }
        ValidationResult::reject(ValidationError::new(
            ERROR_CODE_REQUIRED,
            self.error_message(),
        ))
    }

    fn error_message(&self) -> &str {
        "This field is required"
    }
}

/// Rejects text longer than `max` characters (not bytes).
#[derive(Debug, Clone, Copy)]
pub struct MaxLength {
    pub max: usize,
}

impl MaxLength {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Validator<str> for MaxLength {
    fn validate(&self, value: &str) -> ValidationResult {
        let actual = value.chars().count();
        if actual <= self.max {
            return ValidationResult::Valid;
        }
        ValidationResult::reject(
            ValidationError::new(ERROR_CODE_MAX_LENGTH, self.error_message())
                .with_param("max", self.max)
                .with_param("actual", actual),
        )
    }

    fn error_message(&self) -> &str {
        "Must be at most {max} characters"
    }
}

// --- Date checks ------------------------------------------------------------

/// Accepts exactly `YYYY-MM-DD` naming a real calendar day.
///
/// Surrounding whitespace and unpadded months or days are rejected, so the
/// text that passes is the text a backend receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarDate;

impl CalendarDate {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a date cursor, or `None` if it is not strictly `YYYY-MM-DD`.
    #[must_use]
    pub fn parse(value: &str) -> Option<NaiveDate> {
        let well_formed = value.len() == DATE_LEN
            && value.bytes().enumerate().all(|(i, b)| {
                if DATE_SEPARATORS.contains(&i) {
                    b == b'-'
                } else {
                    b.is_ascii_digit()
                }
            });
        if !well_formed {
            return None;
        }
        NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
    }
}

impl Validator<str> for CalendarDate {
    fn validate(&self, value: &str) -> ValidationResult {
        match Self::parse(value) {
            Some(_) => ValidationResult::Valid,
            None => ValidationResult::reject(
                ValidationError::new(ERROR_CODE_DATE, self.error_message())
                    .with_param("value", value),
            ),
        }
    }

    fn error_message(&self) -> &str {
        "Invalid date, expected YYYY-MM-DD"
    }
}

/// Passes when the date's midnight (UTC) lies strictly before the clock's
/// current moment.
///
/// Today's date therefore passes once the day has begun. The clock is read on
/// every call. Text that does not parse passes here; [`CalendarDate`] is the
/// check that rejects it.
#[derive(Clone)]
pub struct NotInFuture {
    clock: Arc<dyn Clock>,
}

impl NotInFuture {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl fmt::Debug for NotInFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotInFuture")
            .field("now", &self.clock.now())
            .finish()
    }
}

impl Validator<str> for NotInFuture {
    fn validate(&self, value: &str) -> ValidationResult {
        let Some(date) = CalendarDate::parse(value) else {
            return ValidationResult::Valid;
        };
        let now = self.clock.now();
        if date.and_time(NaiveTime::MIN).and_utc() < now {
            return ValidationResult::Valid;
        }
        ValidationResult::reject(
            ValidationError::new(ERROR_CODE_FUTURE_DATE, self.error_message())
                .with_param("date", date)
                .with_param("now", now.format(DATE_FORMAT)),
        )
    }

    fn error_message(&self) -> &str {
        "Date must be in the past"
    }
}

// --- Ad hoc checks ----------------------------------------------------------

/// A closure plus the message reported when it returns `false`.
pub struct Predicate<T: ?Sized> {
    check: Box<dyn Fn(&T) -> bool + Send + Sync>,
    message: String,
}

impl<T: ?Sized> Predicate<T> {
    #[must_use]
    pub fn new(check: impl Fn(&T) -> bool + Send + Sync + 'static, message: impl Into<String>) -> Self {
        Self {
            check: Box::new(check),
            message: message.into(),
        }
    }
}

impl<T: ?Sized> Validator<T> for Predicate<T> {
    fn validate(&self, value: &T) -> ValidationResult {
        if (self.check)(value) {
            ValidationResult::Valid
        } else {
            ValidationResult::reject(ValidationError::new(ERROR_CODE_PREDICATE, &self.message))
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
