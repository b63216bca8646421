#![forbid(unsafe_code)]

//! Composite readiness gates.
//!
//! A [`CompositeGate`] is the logical AND of a fixed, ordered set of
//! [`Validity`] inputs. It stores nothing: every read re-asks each input, so
//! rules that depend on the current moment are evaluated against the instant
//! of the read.

use std::fmt;
use std::rc::Rc;

use acct_runtime::Subscription;

use crate::field::Validity;

/// AND over the validity of a fixed set of inputs.
#[derive(Clone, Default)]
pub struct CompositeGate {
    inputs: Rc<[Rc<dyn Validity>]>,
}

impl CompositeGate {
    /// Build a gate over `inputs`, evaluated in the given order.
    #[must_use]
    pub fn new(inputs: Vec<Rc<dyn Validity>>) -> Self {
        Self {
            inputs: inputs.into(),
        }
    }

    /// Start a gate builder.
    #[must_use]
    pub fn builder() -> GateBuilder {
        GateBuilder::default()
    }

    /// Whether every input is valid right now. An empty gate is satisfied.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.inputs.iter().all(|input| input.is_valid())
    }

    /// Names of the inputs currently failing, in gate order.
    #[must_use]
    pub fn failing_inputs(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|input| !input.is_valid())
            .map(|input| input.name().to_string())
            .collect()
    }

    /// Number of inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether the gate has no inputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Call `callback` with the recomputed satisfaction whenever any input
    /// changes.
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> GateSubscription {
        let gate = self.clone();
        let callback: Rc<dyn Fn()> = Rc::new(move || callback(gate.is_satisfied()));
        let subscriptions = self
            .inputs
            .iter()
            .map(|input| input.watch(Rc::clone(&callback)))
            .collect();
        GateSubscription {
            _inputs: subscriptions,
        }
    }
}

impl fmt::Debug for CompositeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeGate")
            .field(
                "inputs",
                &self.inputs.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder collecting gate inputs in order.
#[derive(Default)]
pub struct GateBuilder {
    inputs: Vec<Rc<dyn Validity>>,
}

impl GateBuilder {
    /// Append an input.
    #[must_use]
    pub fn input(mut self, input: impl Validity + 'static) -> Self {
        self.inputs.push(Rc::new(input));
        self
    }

    /// Finish the gate.
    #[must_use]
    pub fn build(self) -> CompositeGate {
        CompositeGate::new(self.inputs)
    }
}

/// RAII guard for a gate subscription; dropping it detaches from every input.
#[must_use = "dropping a GateSubscription unsubscribes immediately"]
pub struct GateSubscription {
    _inputs: Vec<Subscription>,
}
