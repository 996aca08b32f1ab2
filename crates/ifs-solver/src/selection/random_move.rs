//! Random conflict-free move.

use rand::Rng;

use ifs_config::DataProperties;
use ifs_core::ValueData;

use super::{random_variable, NeighbourSelection};
use crate::neighbour::{Neighbour, SimpleNeighbour};
use crate::solution::Solution;

/// Assigns a random variable to a value that causes no conflict.
///
/// The variable is a random unassigned one, or any variable when the
/// assignment is complete. Its values are tried from a random position
/// onwards; the first one other than the current value without conflicts
/// wins. In hill-climbing mode the move must also not worsen the total
/// value.
#[derive(Debug, Clone, Default)]
pub struct RandomMove {
    hc_mode: bool,
}

impl RandomMove {
    pub fn new(_properties: &DataProperties) -> Self {
        Self::default()
    }
}

impl<P: ValueData> NeighbourSelection<P> for RandomMove {
    fn name(&self) -> &str {
        "RandomMove"
    }

    fn set_hc_mode(&mut self, hc_mode: bool) {
        self.hc_mode = hc_mode;
    }

    fn select_neighbour(&mut self, solution: &mut Solution<P>) -> Option<Box<dyn Neighbour<P>>> {
        let (model, assignment, rng) = solution.split_mut();
        let variable = random_variable(model, assignment, rng)?;
        let values = model.variable(variable).values();
        if values.is_empty() {
            return None;
        }
        let current = assignment.value(variable);
        let offset = rng.random_range(0..values.len());
        for i in 0..values.len() {
            let value = values[(i + offset) % values.len()];
            if Some(value) == current || model.in_conflict(assignment, value) {
                continue;
            }
            let neighbour = SimpleNeighbour::new(variable, value);
            if !self.hc_mode || Neighbour::<P>::value(&neighbour, model, assignment) <= 0.0 {
                return Some(Box::new(neighbour));
            }
        }
        None
    }
}
