#![forbid(unsafe_code)]

//! Field validation with composable rules and readiness gates.
//!
//! This crate provides:
//! - A core [`Validator`] trait and built-ins for the lookup inputs
//!   ([`Required`], [`MaxLength`], [`CalendarDate`], [`NotInFuture`])
//! - [`ValidationRule`], an immutable check plus its failure message
//! - [`Field`], an observable value that re-validates on every change
//! - [`CompositeGate`], the AND of several fields' validity, re-derived on read
//!
//! # Example
//!
//! ```rust
//! use acct_validation::{CompositeGate, Field, MaxLength, Required, TextField, ValidationRule};
//!
//! let identifier: TextField = Field::new(
//!     "identifier",
//!     String::new(),
//!     vec![
//!         ValidationRule::from_validator(Required::new()),
//!         ValidationRule::from_validator(MaxLength::new(128)),
//!     ],
//! );
//! let gate = CompositeGate::builder().input(identifier.clone()).build();
//!
//! assert!(!gate.is_satisfied());
//! identifier.set("POL-100".into());
//! assert!(gate.is_satisfied());
//! ```

pub mod field;
pub mod gate;
pub mod rule;
mod validators;

pub use field::{Field, TextField, Validity};
pub use gate::{CompositeGate, GateBuilder, GateSubscription};
pub use rule::{ValidationRule, evaluate};
pub use validators::{
    // Built-in validators
    CalendarDate,
    // Constants
    DATE_FORMAT,
    ERROR_CODE_DATE,
    ERROR_CODE_FUTURE_DATE,
    ERROR_CODE_MAX_LENGTH,
    ERROR_CODE_PREDICATE,
    ERROR_CODE_REQUIRED,
    MaxLength,
    NotInFuture,
    Predicate,
    Required,
    // Core types
    ValidationError,
    ValidationResult,
    Validator,
};
