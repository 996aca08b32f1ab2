//! Three 0/1 variables with a single "not both" constraint.
//!
//! `A = 1` and `B = 1` may not be assigned together; `C` is unconstrained.

use ifs_core::{BinaryConstraint, Model, ModelBuilder, ValueId, VariableId};

/// The model together with its variable handles.
#[derive(Debug)]
pub struct PairScenario {
    pub model: Model<i64>,
    pub a: VariableId,
    pub b: VariableId,
    pub c: VariableId,
}

impl PairScenario {
    /// Builds the scenario.
    ///
    /// # Panics
    ///
    /// Panics if the model fails validation, which cannot happen here.
    pub fn new() -> Self {
        let mut builder = ModelBuilder::new();
        let a = builder.add_variable("A", [0, 1]);
        let b = builder.add_variable("B", [0, 1]);
        let c = builder.add_variable("C", [0, 1]);
        builder.add_constraint(BinaryConstraint::new(
            "not both",
            a,
            b,
            |x: &i64, y: &i64| !(*x == 1 && *y == 1),
        ));
        let model = builder.build().expect("pair scenario is valid");
        Self { model, a, b, c }
    }

    /// Value of `variable` carrying `payload`.
    ///
    /// # Panics
    ///
    /// Panics if the payload is not in the domain.
    pub fn value(&self, variable: VariableId, payload: i64) -> ValueId {
        self.model
            .variable(variable)
            .values()
            .iter()
            .copied()
            .find(|&v| *self.model.value(v).data() == payload)
            .expect("payload in domain")
    }
}

impl Default for PairScenario {
    fn default() -> Self {
        Self::new()
    }
}
