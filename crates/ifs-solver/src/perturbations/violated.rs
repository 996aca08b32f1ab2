//! Initial values each value would violate.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::debug;

use ifs_core::{Model, ValueData, ValueId};

/// For every value, the initial values of other variables that it is
/// inconsistent with under a shared constraint.
///
/// Computed once per model; assigning the value makes those initial values
/// impossible, which the perturbation penalty charges up front.
#[derive(Debug, Clone, Default)]
pub struct ViolatedInitials {
    violated: Vec<BTreeSet<ValueId>>,
}

impl ViolatedInitials {
    /// Precomputes the violations for every value of the model.
    pub fn init<P: ValueData>(model: &Model<P>) -> Self {
        let violated: Vec<BTreeSet<ValueId>> = (0..model.nr_values())
            .into_par_iter()
            .map(|index| Self::compute(model, ValueId::new(index)))
            .collect();
        debug!(
            values = violated.len(),
            violations = violated.iter().map(BTreeSet::len).sum::<usize>(),
            "Violated initials computed"
        );
        Self { violated }
    }

    fn compute<P: ValueData>(model: &Model<P>, value: ValueId) -> BTreeSet<ValueId> {
        let mut violated = BTreeSet::new();
        let variable = model.value(value).variable();
        for &constraint in model.variable(variable).constraints() {
            let constraint = model.constraint(constraint);
            for &other in constraint.variables() {
                if other == variable {
                    continue;
                }
                let Some(initial) = model.variable(other).initial_value() else {
                    continue;
                };
                if !constraint.is_consistent(model, value, initial) {
                    violated.insert(initial);
                }
            }
        }
        violated
    }

    /// Initial values made impossible by assigning `value`.
    pub fn violated_initials(&self, value: ValueId) -> Option<&BTreeSet<ValueId>> {
        self.violated.get(value.index()).filter(|set| !set.is_empty())
    }
}
