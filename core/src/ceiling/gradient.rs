//! Bühlmann ceiling with gradient factors.

use super::{most_restrictive, Ceiling, CeilingStrategy};
use crate::buhlmann::{TissueState, NUM_COMPARTMENTS};

const BISECTION_ITERATIONS: usize = 60;

#[derive(Debug, Clone)]
pub struct GradientFactors {
    gf_low: f64,
    gf_high: f64,
    low_at_max_depth: bool,
    surface_pressure: f64,
    max_ambient: f64,
    /// Pressure where GF low applies, set by `prepare_ascent`.
    anchor: Option<f64>,
}

impl GradientFactors {
    /// Gradient factors are fractions (0.3 for 30%).
    pub fn new(gf_low: f64, gf_high: f64, low_at_max_depth: bool, surface_pressure: f64) -> Self {
        Self {
            gf_low,
            gf_high,
            low_at_max_depth,
            surface_pressure,
            max_ambient: surface_pressure,
            anchor: None,
        }
    }

    /// Gradient factor applying at an ambient pressure.
    pub fn gf_at(&self, ambient_bar: f64) -> f64 {
        let anchor = match self.anchor {
            Some(anchor) if anchor > self.surface_pressure + 1e-9 => anchor,
            _ => return self.gf_high,
        };
        if ambient_bar >= anchor {
            return self.gf_low;
        }
        let fraction = ((ambient_bar - self.surface_pressure) / (anchor - self.surface_pressure))
            .clamp(0.0, 1.0);
        self.gf_high + (self.gf_low - self.gf_high) * fraction
    }

    /// Lowest ambient pressure each compartment tolerates at gradient factor `gf`.
    fn tolerated(tissues: &TissueState, i: usize, gf: f64) -> f64 {
        let (a, b) = tissues.coefficients(i);
        (tissues.inert_pressure(i) - a * gf) / (gf / b + 1.0 - gf)
    }

    fn tolerated_all(&self, tissues: &TissueState, gf: f64) -> (f64, usize) {
        most_restrictive((0..NUM_COMPARTMENTS).map(|i| Self::tolerated(tissues, i, gf)))
    }

    fn permits(&self, tissues: &TissueState, ambient_bar: f64) -> bool {
        let (tolerated, _) = self.tolerated_all(tissues, self.gf_at(ambient_bar));
        tolerated <= ambient_bar
    }
}

impl CeilingStrategy for GradientFactors {
    fn label(&self) -> String {
        format!(
            "ZHL-16B GF {:.0}/{:.0}",
            self.gf_low * 100.0,
            self.gf_high * 100.0
        )
    }

    fn record_exposure(&mut self, _tissues: &TissueState, ambient_bar: f64, _duration_sec: u32) {
        self.max_ambient = self.max_ambient.max(ambient_bar);
    }

    fn prepare_ascent(&mut self, tissues: &TissueState, ambient_bar: f64) {
        let anchor = if self.low_at_max_depth {
            self.max_ambient.max(ambient_bar)
        } else {
            let (first, _) = self.tolerated_all(tissues, self.gf_low);
            first.max(self.surface_pressure)
        };
        tracing::debug!(anchor_bar = anchor, "gradient factor anchor set");
        self.anchor = Some(anchor);
    }

    fn ceiling(&self, tissues: &TissueState, _at_ambient_bar: f64) -> Ceiling {
        let surface = self.surface_pressure;
        if self.permits(tissues, surface) {
            let (_, leading) = self.tolerated_all(tissues, self.gf_high);
            return Ceiling {
                pressure_bar: surface,
                leading_compartment: leading,
            };
        }

        // GF low is the most conservative factor, so its ceiling is an upper bound.
        let (upper, _) = self.tolerated_all(tissues, self.gf_low);
        let mut lo = surface;
        let mut hi = upper.max(surface);
        for _ in 0..BISECTION_ITERATIONS {
            let mid = (lo + hi) / 2.0;
            if self.permits(tissues, mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let (_, leading) = self.tolerated_all(tissues, self.gf_at(hi));
        Ceiling {
            pressure_bar: hi,
            leading_compartment: leading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::{Breathing, GasMix};
    use crate::pressure::Environment;

    fn loaded(env: &Environment, depth_m: f64, minutes: u32) -> TissueState {
        let mut tissues = TissueState::surface_equilibrium(env.surface_pressure());
        let p = env.ambient_pressure(depth_m);
        let air = Breathing::open_circuit(GasMix::air());
        for _ in 0..minutes {
            tissues.advance(p, p, &air, 60).unwrap();
        }
        tissues
    }

    fn prepared(gf_low: f64, gf_high: f64, env: &Environment, depth_m: f64, tissues: &TissueState) -> GradientFactors {
        let mut gf = GradientFactors::new(gf_low, gf_high, true, env.surface_pressure());
        let p = env.ambient_pressure(depth_m);
        gf.record_exposure(tissues, p, 60);
        gf.prepare_ascent(tissues, p);
        gf
    }

    #[test]
    fn test_surface_equilibrium_has_surface_ceiling() {
        let env = Environment::sea_level();
        let tissues = TissueState::surface_equilibrium(env.surface_pressure());
        let gf = prepared(0.3, 0.7, &env, 0.0, &tissues);
        let ceiling = gf.ceiling(&tissues, env.surface_pressure());
        assert_eq!(ceiling.pressure_bar, env.surface_pressure());
    }

    #[test]
    fn test_deco_dive_has_ceiling_below_surface() {
        let env = Environment::sea_level();
        let tissues = loaded(&env, 40.0, 30);
        let gf = prepared(0.3, 0.7, &env, 40.0, &tissues);
        let ceiling = gf.ceiling(&tissues, env.surface_pressure());
        let depth = ceiling.depth(&env);
        assert!(depth > 3.0 && depth < 40.0, "40m/30min GF 30/70 ceiling should need stops, got {depth} m");
    }

    #[test]
    fn test_ceiling_is_self_consistent() {
        let env = Environment::sea_level();
        let tissues = loaded(&env, 45.0, 25);
        let gf = prepared(0.3, 0.85, &env, 45.0, &tissues);
        let ceiling = gf.ceiling(&tissues, env.surface_pressure());
        let (tolerated, _) = gf.tolerated_all(&tissues, gf.gf_at(ceiling.pressure_bar));
        assert!(
            (tolerated - ceiling.pressure_bar).abs() < 1e-6,
            "tolerated {tolerated} should match ceiling {}",
            ceiling.pressure_bar
        );
    }

    #[test]
    fn test_lower_gradient_factors_are_more_conservative() {
        let env = Environment::sea_level();
        let tissues = loaded(&env, 40.0, 30);
        let strict = prepared(0.3, 0.7, &env, 40.0, &tissues).ceiling(&tissues, 1.0);
        let relaxed = prepared(1.0, 1.0, &env, 40.0, &tissues).ceiling(&tissues, 1.0);
        assert!(strict.pressure_bar > relaxed.pressure_bar);
    }

    #[test]
    fn test_gf_interpolation() {
        let env = Environment::sea_level();
        let tissues = TissueState::surface_equilibrium(env.surface_pressure());
        let gf = prepared(0.3, 0.7, &env, 40.0, &tissues);
        let anchor = env.ambient_pressure(40.0);
        assert!((gf.gf_at(anchor) - 0.3).abs() < 1e-9);
        assert!((gf.gf_at(anchor + 1.0) - 0.3).abs() < 1e-9);
        assert!((gf.gf_at(env.surface_pressure()) - 0.7).abs() < 1e-9);
        let mid = (anchor + env.surface_pressure()) / 2.0;
        assert!((gf.gf_at(mid) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_first_ceiling_anchor_is_shallower() {
        let env = Environment::sea_level();
        let tissues = loaded(&env, 40.0, 30);
        let p = env.ambient_pressure(40.0);
        let mut first_stop = GradientFactors::new(0.3, 0.7, false, env.surface_pressure());
        first_stop.record_exposure(&tissues, p, 60);
        first_stop.prepare_ascent(&tissues, p);
        // Anchored higher in the water column, GF low applies at shallower depth.
        let max_depth = prepared(0.3, 0.7, &env, 40.0, &tissues);
        let ambient = env.ambient_pressure(12.0);
        assert!(first_stop.gf_at(ambient) < max_depth.gf_at(ambient));
    }
}
