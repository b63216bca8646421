#![forbid(unsafe_code)]

//! Observable input fields with attached validation rules.
//!
//! A [`Field`] owns an [`Observable`] value plus an ordered list of
//! [`ValidationRule`]s. Validity is re-derived on every read so rules that
//! depend on the clock never report a stale answer; the last result computed
//! by [`Field::set`] is additionally published as an observable for UI
//! bindings.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use acct_runtime::{BatchScope, Observable, Subscription};

use crate::rule::{ValidationRule, evaluate};
use crate::validators::ValidationResult;

/// A field holding a `String` validated as `str`.
pub type TextField = Field<String, str>;

/// An observable value cell with validation.
///
/// `T` is the stored type and `V` the view the rules see (`T: Borrow<V>`), so a
/// `String` field can reuse `str` validators.
pub struct Field<T, V: ?Sized = T> {
    name: Rc<str>,
    value: Observable<T>,
    validation: Observable<ValidationResult>,
    rules: Rc<[ValidationRule<V>]>,
    _view: PhantomData<fn(&V)>,
}

impl<T, V: ?Sized> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            value: self.value.clone(),
            validation: self.validation.clone(),
            rules: Rc::clone(&self.rules),
            _view: PhantomData,
        }
    }
}

impl<T, V> Field<T, V>
where
    T: std::borrow::Borrow<V> + Clone + PartialEq + 'static,
    V: ?Sized + 'static,
{
    /// Create a field with an initial value and its rules, in evaluation order.
    pub fn new(name: impl Into<Rc<str>>, initial: T, rules: Vec<ValidationRule<V>>) -> Self {
        let rules: Rc<[ValidationRule<V>]> = rules.into();
        let validation = Observable::new(evaluate(&rules, view::<T, V>(&initial)));
        Self {
            name: name.into(),
            value: Observable::new(initial),
            validation,
            rules,
            _view: PhantomData,
        }
    }

    /// Field name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Replace the value and re-run validation.
    ///
    /// Value and validation subscribers are notified together, before this
    /// returns.
    pub fn set(&self, value: T) {
        let _batch = BatchScope::new();
        let result = evaluate(&self.rules, view::<T, V>(&value));
        tracing::trace!(
            field = %self.name,
            valid = result.is_valid(),
            "field updated"
        );
        self.value.set(value);
        self.validation.set(result);
    }

    /// Evaluate every rule against the current value, in declaration order.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.value.with(|value| evaluate(&self.rules, view::<T, V>(value)))
    }

    /// Whether every rule accepts the current value right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }

    /// Message of the first failing rule, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.validate().error_message()
    }

    /// Attached rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule<V>] {
        &self.rules
    }

    /// The underlying value cell.
    #[must_use]
    pub fn value(&self) -> &Observable<T> {
        &self.value
    }

    /// Result of the validation run by the last `set` (or construction).
    ///
    /// Time-dependent rules can drift after this was computed; call
    /// [`validate`](Self::validate) for a fresh answer.
    #[must_use]
    pub fn validation(&self) -> &Observable<ValidationResult> {
        &self.validation
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.value.subscribe(callback)
    }
}

impl<T: fmt::Debug, V: ?Sized> fmt::Debug for Field<T, V>
where
    T: Clone + PartialEq + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("value", &self.value.get())
            .field("rules", &self.rules.len())
            .finish()
    }
}

fn view<T: std::borrow::Borrow<V>, V: ?Sized>(value: &T) -> &V {
    std::borrow::Borrow::borrow(value)
}

/// A validity flag that a [`CompositeGate`](crate::CompositeGate) can combine.
pub trait Validity {
    /// Input name for diagnostics.
    fn name(&self) -> &str;

    /// Whether the input is valid at this instant.
    fn is_valid(&self) -> bool;

    /// Invoke `callback` whenever the input changes.
    fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription;
}

impl<T, V> Validity for Field<T, V>
where
    T: std::borrow::Borrow<V> + Clone + PartialEq + 'static,
    V: ?Sized + 'static,
{
    fn name(&self) -> &str {
        Field::name(self)
    }

    fn is_valid(&self) -> bool {
        Field::is_valid(self)
    }

    fn watch(&self, callback: Rc<dyn Fn()>) -> Subscription {
        self.value.subscribe(move |_| callback())
    }
}
