//! Minimal perturbation penalties.
//!
//! In a minimal perturbation problem some variables carry an initial value
//! and the search should change as few of them as possible. A
//! [`PerturbationsCounter`] prices both a whole assignment and a single
//! candidate move.

mod violated;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use ifs_core::{Assignment, ConflictSet, Model, ValueData, ValueId, VariableId};

pub use violated::ViolatedInitials;

/// Prices deviations from the initial values.
pub trait PerturbationsCounter<P: ValueData>: Send + Sync + Debug {
    /// Penalty of the whole assignment. Unassigned variables are not
    /// counted as perturbed.
    fn perturbation_penalty(&self, model: &Model<P>, assignment: &Assignment) -> f64;

    /// Penalty restricted to `variables`.
    fn perturbation_penalty_of(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        variables: &[VariableId],
    ) -> f64;

    /// Change of the penalty caused by assigning `value` after unassigning
    /// `conflicts`.
    fn candidate_penalty(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: &ConflictSet,
    ) -> f64;

    /// Precomputed violated initials, for counters built on them.
    fn violated_initials(&self) -> Option<&Arc<ViolatedInitials>> {
        None
    }

    /// Adds penalty figures to an info map.
    fn info(&self, model: &Model<P>, assignment: &Assignment, info: &mut BTreeMap<String, String>) {
        if !model.variables_with_initial_value().is_empty() {
            info.insert(
                "Perturbations: Total penalty".to_string(),
                format!("{:.2}", self.perturbation_penalty(model, assignment)),
            );
        }
    }
}

/// Price of one deviation from an initial value.
///
/// `assigned` is the value standing in for `initial`, or `None` when the
/// deviation is an initial value that a candidate would leave violated on
/// an unassigned variable.
pub trait PerturbationPenalty<P: ValueData>: Send + Sync + Debug {
    fn penalty(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        assigned: Option<ValueId>,
        initial: ValueId,
    ) -> f64;
}

/// One unit per deviation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitPenalty;

impl<P: ValueData> PerturbationPenalty<P> for UnitPenalty {
    fn penalty(&self, _: &Model<P>, _: &Assignment, _: Option<ValueId>, _: ValueId) -> f64 {
        1.0
    }
}

/// Sums a [`PerturbationPenalty`] over every perturbed variable.
///
/// The candidate penalty adds up four terms:
/// - one per violated initial value of an unassigned variable
/// - one per conflict that sits at its initial value
/// - minus one per conflict away from its initial value, unless that
///   initial value is violated anyway
/// - one if the candidate itself differs from its variable's initial value
///
/// With [`UnitPenalty`] each term weighs one.
#[derive(Debug, Clone, Default)]
pub struct DefaultPerturbationsCounter<W = UnitPenalty> {
    violated: Option<Arc<ViolatedInitials>>,
    weight: W,
}

impl DefaultPerturbationsCounter<UnitPenalty> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses precomputed violated initials for the candidate penalty.
    pub fn with_violated_initials(violated: Arc<ViolatedInitials>) -> Self {
        Self::new().violated_initials_from(violated)
    }
}

impl<W> DefaultPerturbationsCounter<W> {
    /// Prices each deviation with `weight`.
    pub fn with_penalty(weight: W) -> Self {
        Self {
            violated: None,
            weight,
        }
    }

    pub fn violated_initials_from(mut self, violated: Arc<ViolatedInitials>) -> Self {
        self.violated = Some(violated);
        self
    }

    pub fn violated_initials(&self) -> Option<&Arc<ViolatedInitials>> {
        self.violated.as_ref()
    }

    fn perturbed<P: ValueData>(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        variable: VariableId,
    ) -> f64
    where
        W: PerturbationPenalty<P>,
    {
        let Some(initial) = model.variable(variable).initial_value() else {
            return 0.0;
        };
        match assignment.value(variable) {
            Some(value) if value != initial => {
                self.weight.penalty(model, assignment, Some(value), initial)
            }
            _ => 0.0,
        }
    }
}

impl<P: ValueData, W: PerturbationPenalty<P>> PerturbationsCounter<P> for DefaultPerturbationsCounter<W> {
    fn perturbation_penalty(&self, model: &Model<P>, assignment: &Assignment) -> f64 {
        model
            .variables_with_initial_value()
            .iter()
            .map(|&variable| self.perturbed(model, assignment, variable))
            .sum()
    }

    fn perturbation_penalty_of(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        variables: &[VariableId],
    ) -> f64 {
        variables
            .iter()
            .map(|&variable| self.perturbed(model, assignment, variable))
            .sum()
    }

    fn candidate_penalty(
        &self,
        model: &Model<P>,
        assignment: &Assignment,
        value: ValueId,
        conflicts: &ConflictSet,
    ) -> f64 {
        let mut penalty = 0.0;
        let violations = self
            .violated
            .as_ref()
            .and_then(|violated| violated.violated_initials(value));

        if let Some(violations) = violations {
            for &initial in violations {
                if assignment.value(model.value(initial).variable()).is_none() {
                    penalty += self.weight.penalty(model, assignment, None, initial);
                }
            }
        }

        for &conflict in conflicts {
            let Some(initial) = model.variable(model.value(conflict).variable()).initial_value()
            else {
                continue;
            };
            if initial == conflict {
                penalty += self.weight.penalty(model, assignment, Some(conflict), initial);
            } else if !violations.is_some_and(|v| v.contains(&initial)) {
                penalty -= self.weight.penalty(model, assignment, Some(conflict), initial);
            }
        }

        let variable = model.value(value).variable();
        if let Some(initial) = model.variable(variable).initial_value() {
            if initial != value {
                penalty += self.weight.penalty(model, assignment, Some(value), initial);
            }
        }
        penalty
    }

    fn violated_initials(&self) -> Option<&Arc<ViolatedInitials>> {
        self.violated.as_ref()
    }
}

#[cfg(test)]
mod tests;
