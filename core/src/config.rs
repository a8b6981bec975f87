//! Planner configuration.
//!
//! Every section has serde defaults, so a TOML document only needs to name
//! the values that differ from a recreational sea-level plan.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::pressure::{Environment, SEA_WATER_DENSITY};

/// Complete configuration for one plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct PlannerConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub rates: RateConfig,

    #[serde(default)]
    pub stops: StopConfig,

    #[serde(default)]
    pub gas: GasConfig,

    #[serde(default)]
    pub limits: LimitConfig,
}

/// Surface conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Measured surface pressure; overrides `altitude_m` when set.
    #[serde(default)]
    pub surface_pressure_bar: Option<f64>,

    #[serde(default)]
    pub altitude_m: f64,

    #[serde(default = "default_water_density")]
    pub water_density_kg_m3: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            surface_pressure_bar: None,
            altitude_m: 0.0,
            water_density_kg_m3: default_water_density(),
        }
    }
}

impl EnvironmentConfig {
    pub fn to_environment(&self) -> Environment {
        match self.surface_pressure_bar {
            Some(surface) => Environment::new(surface, self.water_density_kg_m3),
            None => Environment::at_altitude(self.altitude_m, self.water_density_kg_m3),
        }
    }
}

/// Decompression model selected for the plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// ZHL-16B with gradient factors (percent).
    Buhlmann {
        #[serde(default = "default_gf_low")]
        gf_low: u8,
        #[serde(default = "default_gf_high")]
        gf_high: u8,
        /// Anchor GF low at the deepest depth instead of the first ceiling.
        #[serde(default = "default_true")]
        gf_low_at_max_depth: bool,
    },
    /// VPM-B with conservatism 0 (none) to 5.
    Vpmb {
        #[serde(default)]
        conservatism: u8,
    },
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Buhlmann {
            gf_low: default_gf_low(),
            gf_high: default_gf_high(),
            gf_low_at_max_depth: true,
        }
    }
}

/// Descent and ascent rates (m/min).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default = "default_descent_rate")]
    pub descent_m_min: f64,

    /// Ascent rate deeper than `shallow_threshold_m`.
    #[serde(default = "default_deep_ascent_rate")]
    pub deep_ascent_m_min: f64,

    #[serde(default = "default_shallow_ascent_rate")]
    pub shallow_ascent_m_min: f64,

    #[serde(default = "default_shallow_threshold")]
    pub shallow_threshold_m: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            descent_m_min: default_descent_rate(),
            deep_ascent_m_min: default_deep_ascent_rate(),
            shallow_ascent_m_min: default_shallow_ascent_rate(),
            shallow_threshold_m: default_shallow_threshold(),
        }
    }
}

impl RateConfig {
    /// Ascent rate applying at `depth_m`.
    pub fn ascent_rate_at(&self, depth_m: f64) -> f64 {
        if depth_m > self.shallow_threshold_m {
            self.deep_ascent_m_min
        } else {
            self.shallow_ascent_m_min
        }
    }
}

/// Stop placement, gas switching and simulation step sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopConfig {
    #[serde(default = "default_stop_increment")]
    pub stop_increment_m: f64,

    #[serde(default = "default_last_stop")]
    pub last_stop_m: f64,

    #[serde(default = "default_true")]
    pub safety_stop: bool,

    #[serde(default = "default_safety_stop_depth")]
    pub safety_stop_depth_m: f64,

    #[serde(default = "default_safety_stop_duration")]
    pub safety_stop_duration_sec: u32,

    /// Minimum maximum depth for a safety stop.
    #[serde(default = "default_safety_stop_threshold")]
    pub safety_stop_threshold_m: f64,

    #[serde(default)]
    pub switch_only_at_required_stops: bool,

    #[serde(default = "default_min_switch_duration")]
    pub min_switch_duration_sec: u32,

    /// Transit and level step.
    #[serde(default = "default_time_step")]
    pub time_step_sec: u32,

    /// Stop extension step.
    #[serde(default = "default_stop_step")]
    pub stop_step_sec: u32,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            stop_increment_m: default_stop_increment(),
            last_stop_m: default_last_stop(),
            safety_stop: true,
            safety_stop_depth_m: default_safety_stop_depth(),
            safety_stop_duration_sec: default_safety_stop_duration(),
            safety_stop_threshold_m: default_safety_stop_threshold(),
            switch_only_at_required_stops: false,
            min_switch_duration_sec: default_min_switch_duration(),
            time_step_sec: default_time_step(),
            stop_step_sec: default_stop_step(),
        }
    }
}

/// Consumption and oxygen limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_sac_bottom")]
    pub sac_bottom_l_min: f64,

    #[serde(default = "default_sac_deco")]
    pub sac_deco_l_min: f64,

    #[serde(default = "default_bottom_max_po2")]
    pub bottom_max_po2: f64,

    #[serde(default = "default_deco_max_po2")]
    pub deco_max_po2: f64,

    #[serde(default = "default_min_po2")]
    pub min_po2: f64,

    #[serde(default = "default_reserve_sac_factor")]
    pub reserve_sac_factor: f64,

    #[serde(default = "default_problem_solving_min")]
    pub problem_solving_min: f64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            sac_bottom_l_min: default_sac_bottom(),
            sac_deco_l_min: default_sac_deco(),
            bottom_max_po2: default_bottom_max_po2(),
            deco_max_po2: default_deco_max_po2(),
            min_po2: default_min_po2(),
            reserve_sac_factor: default_reserve_sac_factor(),
            problem_solving_min: default_problem_solving_min(),
        }
    }
}

/// Upper bound accepted for `max_deco_time_min` (one week).
pub const MAX_DECO_TIME_LIMIT_MIN: u32 = 7 * 24 * 60;

/// Computation budget. Exceeding any limit aborts the plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Longest ascent accepted in one pass.
    #[serde(default = "default_max_deco_time")]
    pub max_deco_time_min: u32,

    /// Wall-clock limit, 0 disables it.
    #[serde(default = "default_max_wall_clock")]
    pub max_wall_clock_sec: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_passes: default_max_passes(),
            max_deco_time_min: default_max_deco_time(),
            max_wall_clock_sec: default_max_wall_clock(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_water_density() -> f64 {
    SEA_WATER_DENSITY
}

fn default_gf_low() -> u8 {
    30
}

fn default_gf_high() -> u8 {
    70
}

fn default_descent_rate() -> f64 {
    18.0
}

fn default_deep_ascent_rate() -> f64 {
    9.0
}

fn default_shallow_ascent_rate() -> f64 {
    3.0
}

fn default_shallow_threshold() -> f64 {
    6.0
}

fn default_stop_increment() -> f64 {
    3.0
}

fn default_last_stop() -> f64 {
    3.0
}

fn default_safety_stop_depth() -> f64 {
    5.0
}

fn default_safety_stop_duration() -> u32 {
    180
}

fn default_safety_stop_threshold() -> f64 {
    10.0
}

fn default_min_switch_duration() -> u32 {
    60
}

fn default_time_step() -> u32 {
    10
}

fn default_stop_step() -> u32 {
    60
}

fn default_sac_bottom() -> f64 {
    20.0
}

fn default_sac_deco() -> f64 {
    17.0
}

fn default_bottom_max_po2() -> f64 {
    1.4
}

fn default_deco_max_po2() -> f64 {
    1.6
}

fn default_min_po2() -> f64 {
    0.16
}

fn default_reserve_sac_factor() -> f64 {
    4.0
}

fn default_problem_solving_min() -> f64 {
    2.0
}

fn default_max_steps() -> u64 {
    100_000
}

fn default_max_passes() -> u32 {
    12
}

fn default_max_deco_time() -> u32 {
    48 * 60
}

fn default_max_wall_clock() -> u64 {
    30
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl PlannerConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PlannerConfig =
            toml::from_str(contents).map_err(|e| PlanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PlanError::Config(format!("failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PlanError::Config(msg));

        let env = &self.environment;
        if let Some(surface) = env.surface_pressure_bar {
            if !(0.5..=1.1).contains(&surface) {
                return fail(format!("surface pressure {surface} bar out of range 0.5-1.1"));
            }
        }
        if !(-500.0..=8000.0).contains(&env.altitude_m) {
            return fail(format!("altitude {} m out of range", env.altitude_m));
        }
        if !(990.0..=1050.0).contains(&env.water_density_kg_m3) {
            return fail(format!(
                "water density {} kg/m3 out of range 990-1050",
                env.water_density_kg_m3
            ));
        }

        match self.model {
            ModelConfig::Buhlmann {
                gf_low, gf_high, ..
            } => {
                if gf_low == 0 || gf_high == 0 || gf_low > 100 || gf_high > 100 {
                    return fail(format!("gradient factors {gf_low}/{gf_high} out of range 1-100"));
                }
                if gf_low > gf_high {
                    return fail(format!("GF low {gf_low} exceeds GF high {gf_high}"));
                }
            }
            ModelConfig::Vpmb { conservatism } => {
                if conservatism > 5 {
                    return fail(format!("VPM-B conservatism {conservatism} out of range 0-5"));
                }
            }
        }

        let rates = &self.rates;
        for (name, value) in [
            ("descent rate", rates.descent_m_min),
            ("deep ascent rate", rates.deep_ascent_m_min),
            ("shallow ascent rate", rates.shallow_ascent_m_min),
        ] {
            if !positive(value) {
                return fail(format!("{name} must be positive"));
            }
        }
        if !(rates.shallow_threshold_m.is_finite() && rates.shallow_threshold_m >= 0.0) {
            return fail("shallow threshold must not be negative".to_string());
        }

        let stops = &self.stops;
        if !positive(stops.stop_increment_m) {
            return fail("stop increment must be positive".to_string());
        }
        if !positive(stops.last_stop_m) {
            return fail("last stop depth must be positive".to_string());
        }
        if stops.safety_stop && !positive(stops.safety_stop_depth_m) {
            return fail("safety stop depth must be positive".to_string());
        }
        if stops.time_step_sec == 0 || stops.stop_step_sec == 0 {
            return fail("time steps must be positive".to_string());
        }

        let gas = &self.gas;
        if !positive(gas.sac_bottom_l_min) || !positive(gas.sac_deco_l_min) {
            return fail("SAC rates must be positive".to_string());
        }
        if !positive(gas.min_po2)
            || !positive(gas.bottom_max_po2)
            || !positive(gas.deco_max_po2)
            || gas.min_po2 >= gas.bottom_max_po2
            || gas.min_po2 >= gas.deco_max_po2
        {
            return fail("pO2 limits must be positive with min below max".to_string());
        }
        if !positive(gas.reserve_sac_factor) || !(gas.problem_solving_min >= 0.0) {
            return fail("reserve parameters out of range".to_string());
        }

        let limits = &self.limits;
        if limits.max_steps == 0 || limits.max_passes == 0 {
            return fail("computation limits must be positive".to_string());
        }
        if !(1..=MAX_DECO_TIME_LIMIT_MIN).contains(&limits.max_deco_time_min) {
            return fail(format!(
                "maximum deco time {} min out of range 1-{MAX_DECO_TIME_LIMIT_MIN}",
                limits.max_deco_time_min
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.model,
            ModelConfig::Buhlmann {
                gf_low: 30,
                gf_high: 70,
                gf_low_at_max_depth: true
            }
        );
        assert_eq!(config.stops.time_step_sec, 10);
        assert_eq!(config.stops.stop_step_sec, 60);
        assert_eq!(config.gas.reserve_sac_factor, 4.0);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = PlannerConfig {
            model: ModelConfig::Vpmb { conservatism: 3 },
            ..PlannerConfig::default()
        };
        let toml_str = config.to_toml_string().unwrap();
        let parsed = PlannerConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[model]
kind = "buhlmann"
gf_low = 50
gf_high = 80

[gas]
sac_bottom_l_min = 15.0
"#;
        let config = PlannerConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.model,
            ModelConfig::Buhlmann {
                gf_low: 50,
                gf_high: 80,
                gf_low_at_max_depth: true
            }
        );
        assert_eq!(config.gas.sac_bottom_l_min, 15.0);
        // Defaults should still apply
        assert_eq!(config.gas.sac_deco_l_min, 17.0);
        assert_eq!(config.rates.descent_m_min, 18.0);
    }

    #[test]
    fn test_environment_selection() {
        let mut env = EnvironmentConfig::default();
        assert!((env.to_environment().surface_pressure() - 1.01325).abs() < 1e-9);

        env.altitude_m = 2000.0;
        assert!(env.to_environment().surface_pressure() < 0.82);

        env.surface_pressure_bar = Some(0.9);
        assert_eq!(env.to_environment().surface_pressure(), 0.9);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PlannerConfig::default();
        config.model = ModelConfig::Buhlmann {
            gf_low: 80,
            gf_high: 40,
            gf_low_at_max_depth: true,
        };
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));

        let mut config = PlannerConfig::default();
        config.model = ModelConfig::Vpmb { conservatism: 6 };
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));

        let mut config = PlannerConfig::default();
        config.rates.descent_m_min = 0.0;
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));

        let mut config = PlannerConfig::default();
        config.environment.surface_pressure_bar = Some(2.0);
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));
    }

    #[test]
    fn test_deco_time_limit_bounds() {
        let mut config = PlannerConfig::default();
        config.limits.max_deco_time_min = MAX_DECO_TIME_LIMIT_MIN;
        assert!(config.validate().is_ok());

        config.limits.max_deco_time_min = u32::MAX / 10;
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));

        config.limits.max_deco_time_min = 0;
        assert!(matches!(config.validate(), Err(PlanError::Config(_))));

        let toml_str = "[limits]\nmax_deco_time_min = 429496729\n";
        assert!(matches!(
            PlannerConfig::from_toml_str(toml_str),
            Err(PlanError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            PlannerConfig::from_toml_str("[model]\nkind = \"rgbm\""),
            Err(PlanError::Config(_))
        ));
    }

    #[test]
    fn test_ascent_rate_bands() {
        let rates = RateConfig::default();
        assert_eq!(rates.ascent_rate_at(30.0), 9.0);
        assert_eq!(rates.ascent_rate_at(6.0), 3.0);
        assert_eq!(rates.ascent_rate_at(3.0), 3.0);
    }
}
