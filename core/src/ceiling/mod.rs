//! Ascent ceilings.
//!
//! A [`CeilingStrategy`] turns a tissue state into the minimum ambient
//! pressure the diver may ascend to. The scheduler picks one strategy per
//! plan from [`ModelConfig`] and drives it through the dive:
//!
//! 1. `record_exposure` after every descent/bottom step,
//! 2. `prepare_ascent` once when the ascent starts,
//! 3. per ascent pass: `begin_pass`, any number of `ceiling` queries and
//!    `note_deco_stop` calls, then `finish_pass` to decide whether the pass
//!    must be repeated.

pub mod gradient;
pub mod vpmb;

use std::fmt;

pub use gradient::GradientFactors;
pub use vpmb::VpmB;

use crate::buhlmann::TissueState;
use crate::config::ModelConfig;
use crate::pressure::Environment;

/// Minimum safe ambient pressure and the compartment that sets it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ceiling {
    pub pressure_bar: f64,
    pub leading_compartment: usize,
}

impl Ceiling {
    pub fn depth(&self, env: &Environment) -> f64 {
        env.depth_at(self.pressure_bar)
    }

    /// True when `ambient_bar` is at or below the ceiling.
    pub fn permits(&self, ambient_bar: f64) -> bool {
        ambient_bar >= self.pressure_bar - 1e-9
    }
}

/// Outcome of a completed ascent pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassVerdict {
    Final,
    Repeat,
}

pub trait CeilingStrategy: fmt::Debug {
    /// Short model description, e.g. `ZHL-16B GF 30/70`.
    fn label(&self) -> String;

    /// Observe the tissues after a descent or bottom step ending at `ambient_bar`.
    fn record_exposure(&mut self, tissues: &TissueState, ambient_bar: f64, duration_sec: u32);

    /// Freeze the dive history before the first ascent pass.
    fn prepare_ascent(&mut self, tissues: &TissueState, ambient_bar: f64);

    fn begin_pass(&mut self) {}

    /// The scheduler is holding a mandatory stop at `ambient_bar`.
    fn note_deco_stop(&mut self, _ambient_bar: f64) {}

    /// Ceiling for `tissues` when evaluated for a stop at `at_ambient_bar`.
    /// Never shallower than the surface.
    fn ceiling(&self, tissues: &TissueState, at_ambient_bar: f64) -> Ceiling;

    /// Called with the total ascent time of the pass just completed and the
    /// one before it.
    fn finish_pass(&mut self, _deco_time_sec: u32, _previous_sec: Option<u32>) -> PassVerdict {
        PassVerdict::Final
    }
}

/// Build the strategy selected by `model`.
pub fn strategy_for(model: &ModelConfig, surface_pressure: f64) -> Box<dyn CeilingStrategy> {
    match *model {
        ModelConfig::Buhlmann {
            gf_low,
            gf_high,
            gf_low_at_max_depth,
        } => Box::new(GradientFactors::new(
            gf_low as f64 / 100.0,
            gf_high as f64 / 100.0,
            gf_low_at_max_depth,
            surface_pressure,
        )),
        ModelConfig::Vpmb { conservatism } => Box::new(VpmB::new(conservatism, surface_pressure)),
    }
}

/// Highest value wins; on an exact tie the deeper-indexed compartment is
/// ignored so the result is stable.
pub(crate) fn most_restrictive(values: impl Iterator<Item = f64>) -> (f64, usize) {
    let mut max = f64::NEG_INFINITY;
    let mut leading = 0;
    for (i, value) in values.enumerate() {
        if value > max {
            max = value;
            leading = i;
        }
    }
    (max, leading)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_restrictive_takes_maximum() {
        let (max, leading) = most_restrictive([1.2, 2.5, 0.4, 2.5].into_iter());
        assert_eq!(max, 2.5);
        assert_eq!(leading, 1);
    }

    #[test]
    fn test_strategy_labels() {
        let gf = strategy_for(&ModelConfig::default(), 1.01325);
        assert_eq!(gf.label(), "ZHL-16B GF 30/70");

        let vpm = strategy_for(&ModelConfig::Vpmb { conservatism: 2 }, 1.01325);
        assert_eq!(vpm.label(), "VPM-B +2");
    }

    #[test]
    fn test_ceiling_permits() {
        let ceiling = Ceiling {
            pressure_bar: 1.6,
            leading_compartment: 3,
        };
        assert!(ceiling.permits(1.6));
        assert!(ceiling.permits(2.0));
        assert!(!ceiling.permits(1.5));
    }
}
