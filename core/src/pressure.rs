//! Depth and pressure conversions for the dive environment.
//!
//! Depth is metres of water below the surface, pressure is absolute bar.

/// Standard sea-level atmospheric pressure (bar).
pub const STANDARD_SURFACE_PRESSURE: f64 = 1.01325;

/// Standard gravity (m/s²).
const GRAVITY: f64 = 9.80665;

/// Sea water density (kg/m³), EN 13319.
pub const SEA_WATER_DENSITY: f64 = 1030.0;

/// Fresh water density (kg/m³).
pub const FRESH_WATER_DENSITY: f64 = 1000.0;

/// Surface pressure and water density for one plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment {
    surface_pressure_bar: f64,
    water_density_kg_m3: f64,
}

impl Environment {
    pub fn new(surface_pressure_bar: f64, water_density_kg_m3: f64) -> Self {
        Self {
            surface_pressure_bar,
            water_density_kg_m3,
        }
    }

    /// Sea level, salt water.
    pub fn sea_level() -> Self {
        Self::new(STANDARD_SURFACE_PRESSURE, SEA_WATER_DENSITY)
    }

    /// Surface pressure derived from altitude with the barometric formula.
    pub fn at_altitude(altitude_m: f64, water_density_kg_m3: f64) -> Self {
        let surface = STANDARD_SURFACE_PRESSURE * (1.0 - 2.25577e-5 * altitude_m).powf(5.25588);
        Self::new(surface, water_density_kg_m3)
    }

    pub fn surface_pressure(&self) -> f64 {
        self.surface_pressure_bar
    }

    /// Hydrostatic pressure gradient (bar per metre).
    pub fn bar_per_meter(&self) -> f64 {
        self.water_density_kg_m3 * GRAVITY / 100_000.0
    }

    /// Absolute pressure at `depth_m`. Negative depths are treated as the surface.
    pub fn ambient_pressure(&self, depth_m: f64) -> f64 {
        self.surface_pressure_bar + depth_m.max(0.0) * self.bar_per_meter()
    }

    /// Depth at which the absolute pressure equals `pressure_bar`, never negative.
    pub fn depth_at(&self, pressure_bar: f64) -> f64 {
        ((pressure_bar - self.surface_pressure_bar) / self.bar_per_meter()).max(0.0)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::sea_level()
    }
}
