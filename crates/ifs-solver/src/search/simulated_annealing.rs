//! Simulated annealing with training, cooling, reheating and restarts from
//! the best solution.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use ifs_config::DataProperties;
use ifs_core::ValueData;

use super::{adjusted_rate, best_or_current, SearchPolicy, SearchState};
use crate::solution::Solution;

/// Temperature schedule of a simulated annealing search.
///
/// Improving and sideways moves are always accepted. A worsening move with
/// delta `v` is accepted with probability `exp(-v/T)`, or with stochastic
/// hill climbing `1/(1 + exp(v/T))`. With `RelativeAcceptance` off, `v` is
/// the distance of the resulting total from the best value instead.
///
/// Without an `InitialTemperature` the search first trains: it runs as a
/// hill climber until `TrainingValues` worsening moves were seen, then
/// derives the initial, maximal and minimal temperatures from their
/// average so that such a move is accepted with `TrainingProbability`, and
/// sets the temperature length from the measured speed and
/// `TimeBetweenCooldowns`.
///
/// Every `TemperatureLength` iterations without improvement the temperature
/// is multiplied by `CoolingRate` (adjusted per assignment by
/// `CoolingRateAdjustments`). `ReheatLengthCoef·TemperatureLength`
/// iterations after the last improvement it is multiplied by `ReheatRate`;
/// past the maximal temperature the best solution is restored. Falling
/// under the minimal temperature restores the best solution if the current
/// one is more than 0.1% worse and reheats.
#[derive(Debug, Clone)]
pub struct AnnealingSchedule {
    initial_temperature: f64,
    maximal_temperature: f64,
    minimal_temperature: f64,
    cooling_rate: f64,
    reheat_rate: f64,
    temperature_length: u64,
    reheat_length_coef: f64,
    restore_best_length_coef: f64,
    stochastic_hc: bool,
    relative_acceptance: bool,
    cooling_rate_adjustments: Option<Vec<Option<f64>>>,
    training_values: u64,
    training_probability: f64,
    time_between_cooldowns: f64,

    temperature: f64,
    training: bool,
    moves: u64,
    abs_value: f64,
    best_value: f64,
    last_improving: Option<u64>,
    last_best: Option<u64>,
    last_reheat: u64,
    last_cooling: u64,
    accepted: [u64; 3],
    reheat_length: u64,
    restore_best_length: u64,
    training_iterations: u64,
    training_total: f64,
}

impl AnnealingSchedule {
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Whether the schedule is still measuring worsening moves.
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Acceptance probability of a move with the given delta at the current
    /// temperature.
    pub fn probability(&self, value: f64) -> f64 {
        self.probability_at(value, self.temperature)
    }

    fn probability_at(&self, value: f64, temperature: f64) -> f64 {
        if self.stochastic_hc {
            1.0 / (1.0 + (value / temperature).exp())
        } else if value <= 0.0 {
            1.0
        } else {
            (-value / temperature).exp()
        }
    }

    fn non_improving(&self, state: &SearchState) -> u64 {
        let since = self.last_improving.unwrap_or(0).max(self.last_reheat);
        state.iteration.saturating_sub(since)
    }

    fn train<P: ValueData>(&mut self, state: &mut SearchState, solution: &Solution<P>) {
        let value = self.training_total / self.training_iterations.max(1) as f64;
        let p = self.training_probability;
        if self.stochastic_hc {
            self.initial_temperature = value / (1.0 / 0.01 * p - 1.0).ln();
            if self.maximal_temperature <= 0.0 {
                self.maximal_temperature = value / (1.0 / p - 1.0).ln();
            }
            if self.minimal_temperature < 0.0 {
                self.minimal_temperature = 0.1 / (1.0 / p - 1.0).ln();
            }
        } else {
            self.initial_temperature = -value / (0.01 * p).ln();
            if self.maximal_temperature <= 0.0 {
                self.maximal_temperature = -value / p.ln();
            }
            if self.minimal_temperature < 0.0 {
                self.minimal_temperature = -0.1 / p.ln();
            }
        }
        self.temperature = self.initial_temperature;

        let millis = (state.started.elapsed().as_secs_f64() * 1000.0).max(1.0);
        let speed = state.iteration as f64 / millis;
        self.temperature_length = (speed * self.time_between_cooldowns * 1000.0).round().max(1.0) as u64;
        self.reheat_length = (self.reheat_length_coef * self.temperature_length as f64).round() as u64;
        self.restore_best_length =
            (self.restore_best_length_coef * self.temperature_length as f64).round() as u64;
        debug!(
            average = value,
            temperature = self.temperature,
            maximal = self.maximal_temperature,
            minimal = self.minimal_temperature,
            temperature_length = self.temperature_length,
            speed = format!("{:.2} it/s", 1000.0 * speed),
            "Simulated annealing trained"
        );

        state.reset();
        self.training = false;
        self.last_improving = None;
        self.last_best = Some(0);
        self.last_reheat = 0;
        self.last_cooling = 0;
        self.best_value = best_or_current(solution);
        self.accepted = [0; 3];
        self.moves = 0;
        self.abs_value = 0.0;
    }

    fn cool<P: ValueData>(&mut self, state: &SearchState, solution: &Solution<P>) {
        let recently_improved = self
            .last_improving
            .is_some_and(|last| state.iteration <= last + self.temperature_length);
        if !recently_improved {
            let rate = adjusted_rate(
                self.cooling_rate,
                self.cooling_rate_adjustments.as_deref(),
                solution.assignment().index(),
            );
            self.temperature *= rate;
            let moves = self.moves.max(1) as f64;
            debug!(
                iteration = state.iteration,
                temperature = self.temperature,
                moves = self.moves,
                rms = (self.abs_value / moves).sqrt(),
                accepted = format!(
                    "-{:.2}/{:.2}/+{:.2}%",
                    100.0 * self.accepted[0] as f64 / moves,
                    100.0 * self.accepted[1] as f64 / moves,
                    100.0 * self.accepted[2] as f64 / moves
                ),
                p1 = format!("{:.5}%", 100.0 * self.probability(1.0)),
                "Temperature decreased"
            );
            self.abs_value = 0.0;
            self.accepted = [0; 3];
            self.moves = 0;
        }
        self.last_cooling = state.iteration;
    }

    fn reheat<P: ValueData>(&mut self, state: &SearchState, solution: &mut Solution<P>) {
        self.temperature *= self.reheat_rate;
        debug!(
            iteration = state.iteration,
            temperature = self.temperature,
            value = solution.total_value(),
            best = solution.best_value(),
            "Temperature increased"
        );
        self.last_reheat = state.iteration;
        if self.temperature > self.maximal_temperature {
            self.restore_best(state, solution);
            self.last_improving = None;
        }
        self.best_value = best_or_current(solution);
        solution.progress().set_phase(
            &format!("Simulated Annealing [{:.5}]...", self.temperature),
            100,
        );
    }

    fn restore_best<P: ValueData>(&mut self, state: &SearchState, solution: &mut Solution<P>) {
        if solution.restore_best() {
            debug!(iteration = state.iteration, "Best solution restored");
        }
        self.last_best = Some(state.iteration);
    }
}

impl SearchPolicy for AnnealingSchedule {
    const BASE_NAME: &'static str = "SimulatedAnnealing";

    fn from_properties(properties: &DataProperties) -> Self {
        let initial_temperature = properties.get_f64("SimulatedAnnealing.InitialTemperature", -1.0);
        let trains = initial_temperature <= 0.0;
        let cooling_rate = properties.get_f64("SimulatedAnnealing.CoolingRate", 0.95);
        let reheat_length_coef = properties.get_f64("SimulatedAnnealing.ReheatLengthCoef", 5.0);
        let mut reheat_rate = properties.get_f64("SimulatedAnnealing.ReheatRate", -1.0);
        if reheat_rate < 0.0 {
            reheat_rate = (1.0 / cooling_rate).powf(reheat_length_coef * 1.7);
        }
        let mut restore_best_length_coef =
            properties.get_f64("SimulatedAnnealing.RestoreBestLengthCoef", -1.0);
        if restore_best_length_coef < 0.0 {
            restore_best_length_coef = reheat_length_coef * reheat_length_coef;
        }
        Self {
            initial_temperature,
            maximal_temperature: properties.get_f64(
                "SimulatedAnnealing.MaximalTemperature",
                if trains { -1.0 } else { 1.5 },
            ),
            minimal_temperature: properties.get_f64(
                "SimulatedAnnealing.MinimalTemperature",
                if trains { -1.0 } else { 0.0 },
            ),
            cooling_rate,
            reheat_rate,
            temperature_length: properties.get_u64("SimulatedAnnealing.TemperatureLength", 25_000),
            reheat_length_coef,
            restore_best_length_coef,
            stochastic_hc: properties.get_bool("SimulatedAnnealing.StochasticHC", false),
            relative_acceptance: properties.get_bool("SimulatedAnnealing.RelativeAcceptance", true),
            cooling_rate_adjustments: properties.get_f64_list("SimulatedAnnealing.CoolingRateAdjustments"),
            training_values: properties.get_u64("SimulatedAnnealing.TrainingValues", 10_000),
            training_probability: properties.get_f64("SimulatedAnnealing.TrainingProbability", 0.00001),
            time_between_cooldowns: properties.get_f64("SimulatedAnnealing.TimeBetweenCooldowns", 10.0),

            temperature: initial_temperature,
            training: trains,
            moves: 0,
            abs_value: 0.0,
            best_value: 0.0,
            last_improving: None,
            last_best: None,
            last_reheat: 0,
            last_cooling: 0,
            accepted: [0; 3],
            reheat_length: 0,
            restore_best_length: 0,
            training_iterations: 0,
            training_total: 0.0,
        }
    }

    fn activate<P: ValueData>(&mut self, _state: &SearchState, solution: &Solution<P>) {
        self.training = self.initial_temperature <= 0.0;
        self.training_total = 0.0;
        self.training_iterations = 0;
        self.temperature = self.initial_temperature;
        self.reheat_length = (self.reheat_length_coef * self.temperature_length as f64).round() as u64;
        self.restore_best_length =
            (self.restore_best_length_coef * self.temperature_length as f64).round() as u64;
        self.last_improving = None;
        self.last_best = None;
        self.last_reheat = 0;
        self.last_cooling = 0;
        self.best_value = best_or_current(solution);
    }

    fn inc_iteration<P: ValueData>(&mut self, state: &mut SearchState, solution: &mut Solution<P>) -> bool {
        if self.training {
            if self.training_iterations < self.training_values {
                if self.training_values > 0 {
                    solution
                        .progress()
                        .set_progress(100 * self.training_iterations / self.training_values);
                }
                return false;
            }
            self.train(state, solution);
        }

        let mut changed = false;
        if self
            .last_best
            .is_some_and(|last| state.iteration > last + self.restore_best_length)
        {
            self.restore_best(state, solution);
        }
        if self.temperature < self.minimal_temperature {
            let best = best_or_current(solution);
            if (solution.total_value() - best) / best.abs() >= 0.001 {
                self.restore_best(state, solution);
            }
            self.last_improving = Some(state.iteration);
            self.reheat(state, solution);
            changed = true;
        } else if self.last_improving.is_some()
            && self.non_improving(state) > self.reheat_length
        {
            self.reheat(state, solution);
            changed = true;
        } else if state.iteration > self.last_cooling + self.temperature_length {
            self.cool(state, solution);
            changed = true;
        }
        if self.reheat_length > 0 {
            let progress = 100 * self.non_improving(state) / self.reheat_length;
            solution.progress().set_progress(progress.min(100));
        }
        changed
    }

    fn accept<P: ValueData>(
        &mut self,
        _state: &SearchState,
        solution: &mut Solution<P>,
        value: f64,
        total: f64,
    ) -> bool {
        self.moves += 1;
        self.abs_value += value * value;
        let v = if self.relative_acceptance {
            value
        } else {
            total - self.best_value
        };
        let kind = if value < 0.0 {
            0
        } else if value > 0.0 {
            2
        } else {
            1
        };

        if self.training {
            if v <= 0.0 {
                self.accepted[kind] += 1;
                return true;
            }
            self.training_iterations += 1;
            self.training_total += v;
            return false;
        }

        let probability = self.probability(v);
        if v > 0.0 {
            self.training_iterations += 1;
            self.training_total += v;
        }
        if probability >= 1.0 || solution.rng().random::<f64>() < probability {
            self.accepted[kind] += 1;
            return true;
        }
        false
    }

    fn best_saved<P: ValueData>(&mut self, state: &SearchState, solution: &Solution<P>) {
        let best = best_or_current(solution);
        let change = (self.best_value - best).abs() / self.best_value.abs().max(best.abs());
        if self.last_improving.is_none() || change >= 0.0001 {
            self.last_improving = Some(state.iteration);
            self.last_best = Some(state.iteration);
            self.best_value = best;
        }
    }

    fn info(&self, _state: &SearchState, info: &mut BTreeMap<String, String>) {
        if !self.training {
            info.insert("Temperature".to_string(), format!("{:.5}", self.temperature));
        }
    }
}
