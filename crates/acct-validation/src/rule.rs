#![forbid(unsafe_code)]

//! Validation rules attached to fields.

use std::fmt;
use std::sync::Arc;

use crate::validators::{Predicate, ValidationResult, Validator};

/// An immutable check plus its failure message.
///
/// Rules are cheap to clone and share the underlying validator.
pub struct ValidationRule<V: ?Sized> {
    validator: Arc<dyn Validator<V>>,
}

impl<V: ?Sized> Clone for ValidationRule<V> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<V: ?Sized + 'static> ValidationRule<V> {
    /// Build a rule from a predicate and the message shown when it fails.
    #[must_use]
    pub fn new(
        predicate: impl Fn(&V) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::from_validator(Predicate::new(predicate, message))
    }

    /// Wrap an existing validator.
    #[must_use]
    pub fn from_validator(validator: impl Validator<V> + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }

    /// Evaluate the rule against `value`.
    #[must_use]
    pub fn check(&self, value: &V) -> ValidationResult {
        self.validator.validate(value)
    }

    /// The failure message template.
    #[must_use]
    pub fn message(&self) -> &str {
        self.validator.error_message()
    }
}

impl<V: ?Sized> fmt::Debug for ValidationRule<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("message", &self.validator.error_message())
            .finish()
    }
}

/// Evaluate `rules` in declaration order, stopping at the first failure.
#[must_use]
pub fn evaluate<V: ?Sized + 'static>(rules: &[ValidationRule<V>], value: &V) -> ValidationResult {
    for rule in rules {
        let result = rule.check(value);
        if result.is_invalid() {
            return result;
        }
    }
    ValidationResult::Valid
}
