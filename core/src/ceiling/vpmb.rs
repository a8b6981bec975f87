//! Varying Permeability Model with Boyle's-law compensation (VPM-B).
//!
//! Pressures are in bar and radii in µm, so surface tension constants are
//! expressed in bar·µm.

use super::{most_restrictive, Ceiling, CeilingStrategy, PassVerdict};
use crate::buhlmann::{TissueState, NUM_COMPARTMENTS};

/// Critical nucleus radius for N2 (µm).
pub const CRITICAL_RADIUS_N2: f64 = 0.55;
/// Critical nucleus radius for He (µm).
pub const CRITICAL_RADIUS_HE: f64 = 0.45;
/// Critical radius multipliers for conservatism levels 0–5.
pub const CONSERVATISM_MULTIPLIERS: [f64; 6] = [1.0, 1.05, 1.12, 1.22, 1.35, 1.5];
/// Surface tension γ (bar·µm).
pub const SURFACE_TENSION_GAMMA: f64 = 0.179;
/// Skin compression γc (bar·µm).
pub const SKIN_COMPRESSION_GAMMA_C: f64 = 2.57;
/// Nuclei regeneration time constant (min).
pub const REGENERATION_TIME_CONSTANT: f64 = 20160.0;
/// Critical volume parameter λ (bar·min).
pub const CRITICAL_VOLUME_LAMBDA: f64 = 230.3;
/// Gradient onset of impermeability (bar).
pub const ONSET_OF_IMPERMEABILITY: f64 = 8.3;
/// O2, CO2 and water vapour in tissue (bar).
pub const PRESSURE_OTHER_GASES: f64 = 0.136;
/// Passes whose deco time differ by less than this are converged.
pub const CONVERGENCE_SEC: u32 = 60;

const MIN_DECO_TIME_MIN: f64 = 1.0;
const ROOT_ITERATIONS: usize = 100;

/// One value per inert gas.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PerGas {
    n2: f64,
    he: f64,
}

impl PerGas {
    /// Weighted by the compartment's current N2/He loading.
    fn weighted(&self, p_n2: f64, p_he: f64) -> f64 {
        let total = p_n2 + p_he;
        if total > 1e-10 {
            (self.n2 * p_n2 + self.he * p_he) / total
        } else {
            self.n2
        }
    }
}

#[derive(Debug, Clone)]
pub struct VpmB {
    conservatism: u8,
    surface_pressure: f64,
    max_crushing: [f64; NUM_COMPARTMENTS],
    exposure_min: f64,
    initial: [PerGas; NUM_COMPARTMENTS],
    adjusted_crushing: [PerGas; NUM_COMPARTMENTS],
    allowable: [PerGas; NUM_COMPARTMENTS],
    first_stop: Option<f64>,
}

impl VpmB {
    pub fn new(conservatism: u8, surface_pressure: f64) -> Self {
        let mut model = Self {
            conservatism,
            surface_pressure,
            max_crushing: [0.0; NUM_COMPARTMENTS],
            exposure_min: 0.0,
            initial: [PerGas::default(); NUM_COMPARTMENTS],
            adjusted_crushing: [PerGas::default(); NUM_COMPARTMENTS],
            allowable: [PerGas::default(); NUM_COMPARTMENTS],
            first_stop: None,
        };
        model.derive_gradients();
        model
    }

    fn multiplier(&self) -> f64 {
        let level = (self.conservatism as usize).min(CONSERVATISM_MULTIPLIERS.len() - 1);
        CONSERVATISM_MULTIPLIERS[level]
    }

    /// Initial allowable gradients from the recorded crushing history.
    fn derive_gradients(&mut self) {
        let multiplier = self.multiplier();
        let regeneration = 1.0 - (-self.exposure_min / REGENERATION_TIME_CONSTANT).exp();
        let gamma = SURFACE_TENSION_GAMMA;
        let gamma_c = SKIN_COMPRESSION_GAMMA_C;

        for i in 0..NUM_COMPARTMENTS {
            let crush = self.max_crushing[i];
            let mut initial = PerGas::default();
            let mut adjusted = PerGas::default();
            for (radius, slot_g, slot_c) in [
                (CRITICAL_RADIUS_N2, &mut initial.n2, &mut adjusted.n2),
                (CRITICAL_RADIUS_HE, &mut initial.he, &mut adjusted.he),
            ] {
                let critical = radius * multiplier;
                let crushed = 1.0 / (crush / (2.0 * (gamma_c - gamma)) + 1.0 / critical);
                let regenerated = crushed + (critical - crushed) * regeneration;
                *slot_g = 2.0 * gamma * (gamma_c - gamma) / (regenerated * gamma_c);
                *slot_c = if critical - crushed > 1e-12 {
                    crush * crushed * (critical - regenerated) / (regenerated * (critical - crushed))
                } else {
                    0.0
                };
            }
            self.initial[i] = initial;
            self.adjusted_crushing[i] = adjusted;
        }
        self.allowable = self.initial;
    }

    /// Critical-volume relaxation of the gradients for a total ascent time.
    fn apply_critical_volume(&mut self, deco_time_min: f64) {
        let gamma = SURFACE_TENSION_GAMMA;
        let gamma_c = SKIN_COMPRESSION_GAMMA_C;
        let t = deco_time_min.max(MIN_DECO_TIME_MIN);
        for i in 0..NUM_COMPARTMENTS {
            let crush = self.adjusted_crushing[i];
            self.allowable[i].n2 = relaxed_gradient(self.initial[i].n2, crush.n2, t, gamma, gamma_c);
            self.allowable[i].he = relaxed_gradient(self.initial[i].he, crush.he, t, gamma, gamma_c);
        }
    }

    /// Allowable gradients for a stop at `ambient_bar`, expanded by Boyle's
    /// law when shallower than the first stop.
    fn gradients_at(&self, i: usize, ambient_bar: f64) -> PerGas {
        match self.first_stop {
            Some(first) if ambient_bar < first - 1e-9 => PerGas {
                n2: boyle_gradient(self.allowable[i].n2, first, ambient_bar),
                he: boyle_gradient(self.allowable[i].he, first, ambient_bar),
            },
            _ => self.allowable[i],
        }
    }

    fn tolerated(&self, tissues: &TissueState, i: usize, at_ambient_bar: f64) -> f64 {
        let (p_n2, p_he) = (tissues.p_n2(i), tissues.p_he(i));
        let gradient = self.gradients_at(i, at_ambient_bar).weighted(p_n2, p_he);
        p_n2 + p_he + PRESSURE_OTHER_GASES - gradient
    }
}

/// Larger root of `G² − B·G + C = 0` from the critical-volume algorithm.
fn relaxed_gradient(initial: f64, adjusted_crush: f64, t_min: f64, gamma: f64, gamma_c: f64) -> f64 {
    let b = initial + CRITICAL_VOLUME_LAMBDA * gamma / (gamma_c * t_min);
    let c = gamma * gamma * CRITICAL_VOLUME_LAMBDA * adjusted_crush / (gamma_c * gamma_c * t_min);
    let discriminant = (b * b - 4.0 * c).max(0.0);
    (b + discriminant.sqrt()) / 2.0
}

/// Gradient after the bubble held at `first_bar` expands isothermally to
/// `next_bar`.
fn boyle_gradient(gradient: f64, first_bar: f64, next_bar: f64) -> f64 {
    if gradient <= 0.0 {
        return gradient;
    }
    let gamma = SURFACE_TENSION_GAMMA;
    let r1 = 2.0 * gamma / gradient;
    let c = (first_bar + 2.0 * gamma / r1) * r1.powi(3);
    let f = |r: f64| next_bar * r.powi(3) + 2.0 * gamma * r * r - c;

    let mut lo = r1;
    let mut hi = r1 * (first_bar / next_bar).cbrt();
    for _ in 0..ROOT_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if f(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    2.0 * gamma / ((lo + hi) / 2.0)
}

impl CeilingStrategy for VpmB {
    fn label(&self) -> String {
        format!("VPM-B +{}", self.conservatism)
    }

    fn record_exposure(&mut self, tissues: &TissueState, ambient_bar: f64, duration_sec: u32) {
        for i in 0..NUM_COMPARTMENTS {
            let inner = tissues.inert_pressure(i) + PRESSURE_OTHER_GASES;
            let crush = (ambient_bar - inner).clamp(0.0, ONSET_OF_IMPERMEABILITY);
            if crush > self.max_crushing[i] {
                self.max_crushing[i] = crush;
            }
        }
        self.exposure_min += duration_sec as f64 / 60.0;
    }

    fn prepare_ascent(&mut self, _tissues: &TissueState, _ambient_bar: f64) {
        self.derive_gradients();
        tracing::debug!(
            leading_crush_bar = self.max_crushing[0],
            exposure_min = self.exposure_min,
            "VPM-B initial gradients derived"
        );
    }

    fn begin_pass(&mut self) {
        self.first_stop = None;
    }

    fn note_deco_stop(&mut self, ambient_bar: f64) {
        if self.first_stop.is_none() {
            self.first_stop = Some(ambient_bar);
        }
    }

    fn ceiling(&self, tissues: &TissueState, at_ambient_bar: f64) -> Ceiling {
        let (max, leading) = most_restrictive(
            (0..NUM_COMPARTMENTS).map(|i| self.tolerated(tissues, i, at_ambient_bar)),
        );
        Ceiling {
            pressure_bar: max.max(self.surface_pressure),
            leading_compartment: leading,
        }
    }

    fn finish_pass(&mut self, deco_time_sec: u32, previous_sec: Option<u32>) -> PassVerdict {
        if deco_time_sec == 0 {
            return PassVerdict::Final;
        }
        if let Some(previous) = previous_sec {
            if deco_time_sec.abs_diff(previous) < CONVERGENCE_SEC {
                return PassVerdict::Final;
            }
        }
        self.apply_critical_volume(deco_time_sec as f64 / 60.0);
        tracing::debug!(deco_time_sec, "VPM-B critical volume pass");
        PassVerdict::Repeat
    }
}
