//! Bühlmann ZHL-16B tissue simulation.
//!
//! Implements the 16-compartment inert-gas loading model using the Schreiner
//! equation, so that a linear depth change between two ambient pressures is
//! integrated exactly. N₂ and He are tracked independently per compartment
//! and combined (Workman/Baker weighting) for M-value and gradient factor
//! queries. Also reports SurfGF (Surface Gradient Factor), the gradient
//! factor the diver would reach by ascending directly to the surface.

use std::f64::consts::LN_2;

use crate::error::{PlanError, Result};
use crate::gas::{Breathing, AIR_FO2, WATER_VAPOUR_PRESSURE};

// ============================================================================
// ZHL-16B Compartment Constants (Bühlmann)
// ============================================================================

/// Number of tissue compartments.
pub const NUM_COMPARTMENTS: usize = 16;

/// N2 half-times in minutes for compartments 1b–16.
const N2_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

/// He half-times in minutes for compartments 1b–16.
const HE_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

/// N2 'a' coefficients (bar) for ZHL-16B.
const A_N2: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6667, 0.5600, 0.4947, 0.4500, 0.4187, 0.3798, 0.3497, 0.3223,
    0.2850, 0.2737, 0.2523, 0.2327,
];

/// N2 'b' coefficients (dimensionless) for ZHL-16B.
const B_N2: [f64; NUM_COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

/// He 'a' coefficients (bar).
const A_HE: [f64; NUM_COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

/// He 'b' coefficients (dimensionless).
const B_HE: [f64; NUM_COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

/// Tolerance below the surface pressure accepted for ambient inputs.
const AMBIENT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Tissue State
// ============================================================================

/// Inert-gas loading of the 16 compartments.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueState {
    /// N2 partial pressure in each compartment (bar).
    p_n2: [f64; NUM_COMPARTMENTS],
    /// He partial pressure in each compartment (bar).
    p_he: [f64; NUM_COMPARTMENTS],
    surface_pressure: f64,
}

impl TissueState {
    /// Initialise tissues at surface equilibrium (breathing air).
    pub fn surface_equilibrium(surface_pressure: f64) -> Self {
        let p_n2_surface = (surface_pressure - WATER_VAPOUR_PRESSURE) * (1.0 - AIR_FO2);
        TissueState {
            p_n2: [p_n2_surface; NUM_COMPARTMENTS],
            p_he: [0.0; NUM_COMPARTMENTS],
            surface_pressure,
        }
    }

    pub fn surface_pressure(&self) -> f64 {
        self.surface_pressure
    }

    /// Load all compartments for `duration_sec` while the ambient pressure
    /// changes linearly from `start_bar` to `end_bar`.
    ///
    /// Inspired pressures are taken at both ends of the interval and
    /// interpolated linearly, which is exact for open circuit and a close
    /// approximation on the loop.
    pub fn advance(
        &mut self,
        start_bar: f64,
        end_bar: f64,
        breathing: &Breathing,
        duration_sec: u32,
    ) -> Result<()> {
        if duration_sec == 0 {
            return Err(PlanError::ZeroStep);
        }
        let floor = self.surface_pressure - AMBIENT_TOLERANCE;
        for ambient in [start_bar, end_bar] {
            if !(ambient >= floor) {
                return Err(PlanError::AmbientBelowSurface {
                    ambient_bar: ambient,
                    surface_bar: self.surface_pressure,
                });
            }
        }

        let t_min = duration_sec as f64 / 60.0;
        let start = breathing.partial_pressures(start_bar);
        let end = breathing.partial_pressures(end_bar);
        let rate_n2 = (end.n2 - start.n2) / t_min;
        let rate_he = (end.he - start.he) / t_min;

        for i in 0..NUM_COMPARTMENTS {
            self.p_n2[i] = schreiner(self.p_n2[i], start.n2, rate_n2, N2_HALF_TIMES[i], t_min);
            self.p_he[i] = schreiner(self.p_he[i], start.he, rate_he, HE_HALF_TIMES[i], t_min);
        }
        Ok(())
    }

    pub fn p_n2(&self, i: usize) -> f64 {
        self.p_n2[i]
    }

    pub fn p_he(&self, i: usize) -> f64 {
        self.p_he[i]
    }

    /// Combined inert-gas pressure of one compartment.
    pub fn inert_pressure(&self, i: usize) -> f64 {
        self.p_n2[i] + self.p_he[i]
    }

    /// Combined inert-gas pressure of every compartment.
    pub fn loadings(&self) -> [f64; NUM_COMPARTMENTS] {
        let mut loadings = [0.0; NUM_COMPARTMENTS];
        for (i, loading) in loadings.iter_mut().enumerate() {
            *loading = self.inert_pressure(i);
        }
        loadings
    }

    /// Bühlmann a/b coefficients weighted by the compartment's N2/He loading.
    pub fn coefficients(&self, i: usize) -> (f64, f64) {
        let p_total = self.inert_pressure(i);
        if p_total > 1e-10 {
            let a = (A_N2[i] * self.p_n2[i] + A_HE[i] * self.p_he[i]) / p_total;
            let b = (B_N2[i] * self.p_n2[i] + B_HE[i] * self.p_he[i]) / p_total;
            (a, b)
        } else {
            (A_N2[i], B_N2[i])
        }
    }

    /// Raw Bühlmann M-value of a compartment at an ambient pressure.
    pub fn m_value(&self, i: usize, ambient_pressure: f64) -> f64 {
        let (a, b) = self.coefficients(i);
        a + ambient_pressure / b
    }

    /// Compute the Surface Gradient Factor (%) and leading compartment index
    /// in a single pass over all compartments.
    pub fn surface_gf_and_leading(&self) -> (f64, usize) {
        self.gf_and_leading(self.surface_pressure)
    }

    /// Highest compartment gradient factor (%) at an ambient pressure.
    pub fn gf_and_leading(&self, ambient_pressure: f64) -> (f64, usize) {
        let mut max_gf: f64 = 0.0;
        let mut leading: usize = 0;
        for i in 0..NUM_COMPARTMENTS {
            let gf = self.compartment_gf(i, ambient_pressure);
            if gf > max_gf {
                max_gf = gf;
                leading = i;
            }
        }
        (max_gf, leading)
    }

    /// Gradient factor for a single compartment at the given ambient pressure.
    fn compartment_gf(&self, i: usize, ambient_pressure: f64) -> f64 {
        let p_total = self.inert_pressure(i);
        let denom = self.m_value(i, ambient_pressure) - ambient_pressure;

        if denom > 1e-10 {
            ((p_total - ambient_pressure) / denom) * 100.0
        } else {
            0.0
        }
    }
}

/// Schreiner equation: compartment pressure after `t` minutes when the
/// inspired pressure starts at `p_inspired` and changes by `rate` bar/min.
fn schreiner(p0: f64, p_inspired: f64, rate: f64, half_time_min: f64, t: f64) -> f64 {
    let k = LN_2 / half_time_min;
    p_inspired + rate * (t - 1.0 / k) - (p_inspired - p0 - rate / k) * (-k * t).exp()
}

// ============================================================================
// Tests
// ============================================================================
