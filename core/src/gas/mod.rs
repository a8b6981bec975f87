//! Breathing gases and the cylinders that carry them.
//!
//! A [`GasMix`] is an immutable, validated set of O₂/He fractions (N₂ is the
//! remainder). [`Breathing`] pairs a mix with an optional closed-circuit
//! setpoint and derives the inspired partial pressures used by the tissue
//! model and the oxygen tracker.
//!
//! # Gas names
//!
//! ```
//! use diveplan_compute::gas::GasMix;
//!
//! let ean50: GasMix = "EAN50".parse().expect("valid nitrox name");
//! assert!((ean50.o2() - 0.5).abs() < 1e-9);
//!
//! let tx: GasMix = "Tx18/45".parse().expect("valid trimix name");
//! assert_eq!(tx.to_string(), "Tx18/45");
//! ```

pub mod cylinder;
pub mod parser;

use std::fmt;
use std::str::FromStr;

pub use cylinder::{Cylinder, CylinderUse, GasRegistry, MAX_GAS_MIXES};
pub use parser::parse_gas;

use crate::error::{PlanError, Result};
use crate::pressure::Environment;

/// Water vapour pressure in the lungs (bar), at 37°C.
pub const WATER_VAPOUR_PRESSURE: f64 = 0.0627;

/// Fraction of O₂ in air.
pub const AIR_FO2: f64 = 0.2095;

/// Tolerance applied to the fraction invariant.
pub const FRACTION_TOLERANCE: f64 = 1e-6;

/// A breathing gas. Fractions are in 0.0–1.0 and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasMix {
    o2: f64,
    he: f64,
}

impl GasMix {
    /// Validate and build a mix from O₂ and He fractions.
    pub fn new(o2: f64, he: f64) -> Result<Self> {
        let valid = o2.is_finite()
            && he.is_finite()
            && o2 >= 0.0
            && he >= 0.0
            && o2 + he <= 1.0 + FRACTION_TOLERANCE;
        if !valid {
            return Err(PlanError::InvalidGasMix { o2, he });
        }
        Ok(Self { o2, he })
    }

    pub fn air() -> Self {
        Self { o2: AIR_FO2, he: 0.0 }
    }

    pub fn oxygen() -> Self {
        Self { o2: 1.0, he: 0.0 }
    }

    /// Enriched air from an O₂ percentage.
    pub fn nitrox(o2_percent: f64) -> Result<Self> {
        Self::new(o2_percent / 100.0, 0.0)
    }

    /// Trimix from O₂ and He percentages.
    pub fn trimix(o2_percent: f64, he_percent: f64) -> Result<Self> {
        Self::new(o2_percent / 100.0, he_percent / 100.0)
    }

    pub fn o2(&self) -> f64 {
        self.o2
    }

    pub fn he(&self) -> f64 {
        self.he
    }

    pub fn n2(&self) -> f64 {
        (1.0 - self.o2 - self.he).max(0.0)
    }

    pub fn fractions_sum(&self) -> f64 {
        self.o2 + self.he + self.n2()
    }

    pub fn is_air(&self) -> bool {
        self.he < FRACTION_TOLERANCE && (0.205..=0.215).contains(&self.o2)
    }

    pub fn is_oxygen(&self) -> bool {
        self.he < FRACTION_TOLERANCE && self.o2 >= 0.995
    }

    /// O₂ partial pressure at an absolute ambient pressure.
    pub fn po2_at(&self, ambient_bar: f64) -> f64 {
        ambient_bar * self.o2
    }

    /// Deepest depth at which pO₂ stays at or below `max_po2`.
    pub fn max_operating_depth(&self, env: &Environment, max_po2: f64) -> f64 {
        if self.o2 <= 0.0 {
            return f64::INFINITY;
        }
        env.depth_at(max_po2 / self.o2)
    }

    /// Shallowest depth at which pO₂ reaches `min_po2`.
    pub fn min_operating_depth(&self, env: &Environment, min_po2: f64) -> f64 {
        if self.o2 <= 0.0 {
            return f64::INFINITY;
        }
        env.depth_at(min_po2 / self.o2)
    }
}

impl fmt::Display for GasMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_air() {
            write!(f, "air")
        } else if self.is_oxygen() {
            write!(f, "oxygen")
        } else if self.he >= FRACTION_TOLERANCE {
            write!(f, "Tx{:.0}/{:.0}", self.o2 * 100.0, self.he * 100.0)
        } else {
            write!(f, "EAN{:.0}", self.o2 * 100.0)
        }
    }
}

impl FromStr for GasMix {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        parse_gas(s)
    }
}

/// Inspired partial pressures (bar).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialPressures {
    pub o2: f64,
    pub n2: f64,
    pub he: f64,
}

/// What the diver breathes: an open-circuit mix, or a diluent on a rebreather
/// loop held at a setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breathing {
    pub gas: GasMix,
    pub setpoint: Option<f64>,
}

impl Breathing {
    pub fn open_circuit(gas: GasMix) -> Self {
        Self {
            gas,
            setpoint: None,
        }
    }

    pub fn closed_circuit(diluent: GasMix, setpoint_bar: f64) -> Self {
        Self {
            gas: diluent,
            setpoint: Some(setpoint_bar),
        }
    }

    /// Inspired partial pressures at an absolute ambient pressure.
    ///
    /// Inert gases are reduced by the alveolar water vapour. On the loop the
    /// pO₂ is the setpoint, raised to the diluent's own pO₂ when that is
    /// higher and capped at the ambient pressure; the remaining inert share
    /// keeps the diluent's He:N₂ ratio.
    pub fn partial_pressures(&self, ambient_bar: f64) -> PartialPressures {
        let dry = (ambient_bar - WATER_VAPOUR_PRESSURE).max(0.0);
        match self.setpoint {
            None => PartialPressures {
                o2: self.gas.po2_at(ambient_bar),
                n2: dry * self.gas.n2(),
                he: dry * self.gas.he(),
            },
            Some(setpoint) => {
                let po2 = setpoint.max(self.gas.po2_at(ambient_bar)).min(ambient_bar);
                let inert = (dry - po2).max(0.0);
                let inert_fraction = self.gas.n2() + self.gas.he();
                if inert_fraction <= FRACTION_TOLERANCE {
                    return PartialPressures {
                        o2: po2,
                        n2: 0.0,
                        he: 0.0,
                    };
                }
                PartialPressures {
                    o2: po2,
                    n2: inert * self.gas.n2() / inert_fraction,
                    he: inert * self.gas.he() / inert_fraction,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_invariant() {
        for (o2, he) in [(0.21, 0.0), (0.18, 0.45), (1.0, 0.0), (0.1, 0.9), (0.5, 0.0)] {
            let mix = GasMix::new(o2, he).unwrap();
            assert!(
                (mix.fractions_sum() - 1.0).abs() < FRACTION_TOLERANCE,
                "fractions of {mix} should sum to 1"
            );
        }
    }

    #[test]
    fn test_invalid_mixes_rejected() {
        assert!(matches!(
            GasMix::new(0.6, 0.5),
            Err(PlanError::InvalidGasMix { .. })
        ));
        assert!(GasMix::new(-0.1, 0.0).is_err());
        assert!(GasMix::new(0.21, -0.01).is_err());
        assert!(GasMix::new(f64::NAN, 0.0).is_err());
        assert!(GasMix::nitrox(120.0).is_err());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(GasMix::air().to_string(), "air");
        assert_eq!(GasMix::oxygen().to_string(), "oxygen");
        assert_eq!(GasMix::nitrox(32.0).unwrap().to_string(), "EAN32");
        assert_eq!(GasMix::trimix(21.0, 35.0).unwrap().to_string(), "Tx21/35");
    }

    #[test]
    fn test_max_operating_depth() {
        let env = Environment::sea_level();
        let ean50 = GasMix::nitrox(50.0).unwrap();
        let mod_m = ean50.max_operating_depth(&env, 1.6);
        assert!((mod_m - 21.65).abs() < 0.1, "EAN50 MOD at 1.6 should be ~21.6 m, got {mod_m}");

        let o2 = GasMix::oxygen();
        let mod_m = o2.max_operating_depth(&env, 1.6);
        assert!((mod_m - 5.8).abs() < 0.1, "O2 MOD at 1.6 should be ~5.8 m, got {mod_m}");
    }

    #[test]
    fn test_min_operating_depth() {
        let env = Environment::sea_level();
        // Air is breathable from the surface.
        assert_eq!(GasMix::air().min_operating_depth(&env, 0.16), 0.0);

        let tx10 = GasMix::trimix(10.0, 70.0).unwrap();
        let min_m = tx10.min_operating_depth(&env, 0.16);
        assert!((min_m - 5.8).abs() < 0.1, "Tx10/70 needs ~5.8 m for 0.16 bar, got {min_m}");
    }

    #[test]
    fn test_open_circuit_partial_pressures() {
        let breathing = Breathing::open_circuit(GasMix::trimix(21.0, 35.0).unwrap());
        let pp = breathing.partial_pressures(4.0);
        assert!((pp.o2 - 0.84).abs() < 1e-9);
        assert!((pp.he - (4.0 - WATER_VAPOUR_PRESSURE) * 0.35).abs() < 1e-9);
        assert!((pp.n2 - (4.0 - WATER_VAPOUR_PRESSURE) * 0.44).abs() < 1e-9);
    }

    #[test]
    fn test_closed_circuit_holds_setpoint() {
        let breathing = Breathing::closed_circuit(GasMix::air(), 1.3);
        let pp = breathing.partial_pressures(5.0);
        assert!((pp.o2 - 1.3).abs() < 1e-9);
        // No helium in the diluent, all inert share is nitrogen.
        assert_eq!(pp.he, 0.0);
        assert!((pp.n2 - (5.0 - WATER_VAPOUR_PRESSURE - 1.3)).abs() < 1e-9);
    }

    #[test]
    fn test_closed_circuit_shallow_caps_at_ambient() {
        let breathing = Breathing::closed_circuit(GasMix::air(), 1.3);
        let pp = breathing.partial_pressures(1.1);
        assert!((pp.o2 - 1.1).abs() < 1e-9);
        assert_eq!(pp.n2, 0.0);
    }

    #[test]
    fn test_closed_circuit_diluent_above_setpoint() {
        let breathing = Breathing::closed_circuit(GasMix::air(), 0.7);
        let pp = breathing.partial_pressures(6.0);
        assert!((pp.o2 - 6.0 * AIR_FO2).abs() < 1e-9);
    }
}
