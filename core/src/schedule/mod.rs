//! Stop scheduler.
//!
//! Walks the user's waypoints, then ascends level by level, holding
//! decompression stops until the ceiling clears the next level. The ascent is
//! repeated from the same bottom snapshot while the ceiling strategy asks for
//! another pass (VPM-B critical-volume iteration).

pub mod budget;
pub mod segment;

pub use budget::{CancelToken, ComputeBudget};
pub use segment::{PlanSegment, SegmentKind, SegmentLog};

use crate::buhlmann::{TissueState, NUM_COMPARTMENTS};
use crate::ceiling::{strategy_for, CeilingStrategy, PassVerdict};
use crate::config::PlannerConfig;
use crate::consumption::{self, CylinderUsage};
use crate::error::{PlanError, Result};
use crate::gas::{Breathing, GasRegistry, MAX_GAS_MIXES};
use crate::oxygen::{ExposureAccumulator, OxygenTracker};
use crate::pressure::Environment;
use crate::warning::{Warning, WarningKind};

const DEPTH_EPSILON: f64 = 1e-6;
const MIN_SETPOINT: f64 = 0.16;
const MAX_SETPOINT: f64 = 2.0;

/// A planned depth held for `duration_sec` after arriving from the previous
/// waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub depth_m: f64,
    pub duration_sec: u32,
    pub cylinder: usize,
    /// Closed-circuit setpoint (bar); the cylinder is then the diluent.
    pub setpoint: Option<f64>,
}

impl Waypoint {
    pub fn new(depth_m: f64, duration_sec: u32, cylinder: usize) -> Self {
        Self {
            depth_m,
            duration_sec,
            cylinder,
            setpoint: None,
        }
    }

    pub fn with_setpoint(mut self, setpoint_bar: f64) -> Self {
        self.setpoint = Some(setpoint_bar);
        self
    }
}

/// Scheduler state, logged on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Descending,
    Bottom,
    AscentTransition,
    DecoStop,
    GasSwitch,
    SafetyStop,
    Surfaced,
    Aborted,
}

/// Tissue and gas state at the end of a simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSample {
    pub runtime_sec: u32,
    pub depth_m: f64,
    pub po2: f64,
    pub pn2: f64,
    pub phe: f64,
    pub ceiling_m: f64,
    /// Gradient factor on immediate surfacing (%).
    pub surface_gf: f64,
    pub leading_compartment: usize,
    pub loadings: [f64; NUM_COMPARTMENTS],
}

/// The computed plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DivePlan {
    pub model: String,
    pub segments: Vec<PlanSegment>,
    pub samples: Vec<ProfileSample>,
    pub exposure: ExposureAccumulator,
    pub warnings: Vec<Warning>,
    pub gas_usage: Vec<CylinderUsage>,
    pub max_depth_m: f64,
    pub ascent_start_sec: u32,
    pub runtime_sec: u32,
    /// Ascent passes computed before the schedule was accepted.
    pub passes: u32,
}

impl DivePlan {
    pub fn has_deco_stops(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.kind == SegmentKind::DecoStop)
    }
}

/// Plans dives against one configuration and gas registry.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    registry: GasRegistry,
    cancel: Option<CancelToken>,
}

impl Planner {
    pub fn new(config: PlannerConfig, registry: GasRegistry) -> Result<Self> {
        config.validate()?;
        registry.validate()?;
        Ok(Self {
            config,
            registry,
            cancel: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Cylinders with the pressures projected by the last plan.
    pub fn registry(&self) -> &GasRegistry {
        &self.registry
    }

    /// Compute a plan. Fails before simulating on invalid waypoints, and
    /// discards the partial plan when the budget runs out or the plan is
    /// cancelled.
    pub fn plan(&mut self, waypoints: &[Waypoint]) -> Result<DivePlan> {
        self.validate_waypoints(waypoints)?;
        let result = self.run(waypoints);
        match &result {
            Err(err) if err.is_abort() => {
                tracing::warn!(phase = ?Phase::Aborted, error = %err, "plan aborted");
            }
            Err(err) => tracing::error!(error = %err, "plan failed"),
            Ok(_) => {}
        }
        result
    }

    fn validate_waypoints(&self, waypoints: &[Waypoint]) -> Result<()> {
        if waypoints.is_empty() {
            return Err(PlanError::EmptyProfile);
        }
        for (index, wp) in waypoints.iter().enumerate() {
            if !(wp.depth_m.is_finite() && wp.depth_m >= 0.0) {
                return Err(PlanError::InvalidDepth {
                    index,
                    depth_m: wp.depth_m,
                });
            }
            if wp.duration_sec == 0 {
                return Err(PlanError::InvalidDuration { index });
            }
            let cylinder = self.registry.get(wp.cylinder)?;
            if let Some(setpoint) = wp.setpoint {
                if !(MIN_SETPOINT..=MAX_SETPOINT).contains(&setpoint) {
                    return Err(PlanError::InvalidSetpoint {
                        index,
                        setpoint_bar: setpoint,
                    });
                }
            }
            let reason = match (wp.setpoint.is_some(), cylinder.is_diluent()) {
                (true, false) => Some("setpoint given for an open-circuit cylinder"),
                (false, true) => Some("diluent breathed without a setpoint"),
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(PlanError::CircuitMismatch {
                    index,
                    cylinder: wp.cylinder,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    fn run(&mut self, waypoints: &[Waypoint]) -> Result<DivePlan> {
        let env = self.config.environment.to_environment();
        let first = &waypoints[0];
        let mut state = DiveState::new(&env, first.cylinder, first.setpoint);

        let (state, model, passes, ascent_start_sec, max_depth_m) = {
            let mut engine = Engine {
                config: &self.config,
                registry: &self.registry,
                env,
                strategy: strategy_for(&self.config.model, env.surface_pressure()),
                budget: ComputeBudget::new(&self.config.limits, self.cancel.clone()),
            };
            tracing::debug!(model = %engine.strategy.label(), waypoints = waypoints.len(), "planning dive");

            if self.registry.len() > MAX_GAS_MIXES {
                state.warn(
                    WarningKind::TooManyGasMixes {
                        requested: self.registry.len(),
                        supported: MAX_GAS_MIXES,
                    },
                    None,
                );
            }
            engine.sample(&mut state)?;
            engine.follow_waypoints(&mut state, waypoints)?;

            let max_depth_m = waypoints.iter().map(|w| w.depth_m).fold(0.0, f64::max);
            let ascent_start_sec = state.runtime_sec;
            let ambient = env.ambient_pressure(state.depth_m);
            engine.strategy.prepare_ascent(&state.tissues, ambient);

            let (state, passes) = engine.ascend_until_final(state, max_depth_m)?;
            (state, engine.strategy.label(), passes, ascent_start_sec, max_depth_m)
        };

        let DiveState {
            runtime_sec,
            oxygen,
            segments,
            samples,
            mut warnings,
            ..
        } = state;
        let segments = segments.into_vec();

        let (gas_usage, gas_warnings) = consumption::estimate(
            &segments,
            &mut self.registry,
            &env,
            &self.config.gas,
            ascent_start_sec,
            max_depth_m,
        );
        warnings.extend(gas_warnings);
        warnings.sort_by_key(|w| w.runtime_sec);

        let exposure = oxygen.exposure();
        tracing::info!(
            model = %model,
            runtime_sec,
            segments = segments.len(),
            warnings = warnings.len(),
            cns_percent = exposure.cns_percent,
            otu = exposure.otu,
            "plan computed"
        );

        Ok(DivePlan {
            model,
            segments,
            samples,
            exposure,
            warnings,
            gas_usage,
            max_depth_m,
            ascent_start_sec,
            runtime_sec,
            passes,
        })
    }
}

/// Everything one simulated dive mutates.
#[derive(Debug, Clone)]
struct DiveState {
    runtime_sec: u32,
    depth_m: f64,
    tissues: TissueState,
    oxygen: OxygenTracker,
    segments: SegmentLog,
    samples: Vec<ProfileSample>,
    warnings: Vec<Warning>,
    cylinder: usize,
    setpoint: Option<f64>,
    phase: Phase,
}

impl DiveState {
    fn new(env: &Environment, cylinder: usize, setpoint: Option<f64>) -> Self {
        Self {
            runtime_sec: 0,
            depth_m: 0.0,
            tissues: TissueState::surface_equilibrium(env.surface_pressure()),
            oxygen: OxygenTracker::new(),
            segments: SegmentLog::default(),
            samples: Vec::new(),
            warnings: Vec::new(),
            cylinder,
            setpoint,
            phase: Phase::Descending,
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!(
                from = ?self.phase,
                to = ?phase,
                runtime_sec = self.runtime_sec,
                depth_m = self.depth_m,
                "phase change"
            );
            self.phase = phase;
        }
    }

    fn in_user_profile(&self) -> bool {
        matches!(self.phase, Phase::Descending | Phase::Bottom)
    }

    fn warn(&mut self, kind: WarningKind, cylinder: Option<usize>) {
        self.warnings.push(Warning {
            kind,
            runtime_sec: self.runtime_sec,
            depth_m: self.depth_m,
            cylinder,
        });
    }
}

/// Whole seconds needed to cover `distance_m` at `rate_m_min`.
fn transit_seconds(distance_m: f64, rate_m_min: f64) -> u32 {
    (distance_m / rate_m_min * 60.0 - 1e-6).ceil().max(1.0) as u32
}

struct Engine<'a> {
    config: &'a PlannerConfig,
    registry: &'a GasRegistry,
    env: Environment,
    strategy: Box<dyn CeilingStrategy>,
    budget: ComputeBudget,
}

impl Engine<'_> {
    fn breathing(&self, state: &DiveState) -> Result<Breathing> {
        let gas = self.registry.get(state.cylinder)?.gas;
        Ok(match state.setpoint {
            Some(setpoint) => Breathing::closed_circuit(gas, setpoint),
            None => Breathing::open_circuit(gas),
        })
    }

    fn sample(&self, state: &mut DiveState) -> Result<()> {
        let ambient = self.env.ambient_pressure(state.depth_m);
        let pp = self.breathing(state)?.partial_pressures(ambient);
        let ceiling = self.strategy.ceiling(&state.tissues, ambient);
        let (surface_gf, leading_compartment) = state.tissues.surface_gf_and_leading();
        state.samples.push(ProfileSample {
            runtime_sec: state.runtime_sec,
            depth_m: state.depth_m,
            po2: pp.o2,
            pn2: pp.n2,
            phe: pp.he,
            ceiling_m: ceiling.depth(&self.env),
            surface_gf,
            leading_compartment,
            loadings: state.tissues.loadings(),
        });
        Ok(())
    }

    /// Simulate one step from the current depth to `end_depth_m`.
    fn step(
        &mut self,
        state: &mut DiveState,
        kind: SegmentKind,
        end_depth_m: f64,
        duration_sec: u32,
        rate_m_min: Option<f64>,
    ) -> Result<()> {
        self.budget.tick()?;
        let breathing = self.breathing(state)?;
        let start_bar = self.env.ambient_pressure(state.depth_m);
        let end_bar = self.env.ambient_pressure(end_depth_m);
        state
            .tissues
            .advance(start_bar, end_bar, &breathing, duration_sec)?;

        let config = self.config;
        let gas = &config.gas;
        let max_po2 = if state.in_user_profile() {
            self.strategy
                .record_exposure(&state.tissues, end_bar, duration_sec);
            gas.bottom_max_po2
        } else {
            gas.deco_max_po2
        };
        let po2 = breathing.partial_pressures((start_bar + end_bar) / 2.0).o2;
        for kind in state.oxygen.record(po2, gas.min_po2, max_po2, duration_sec) {
            state.warn(kind, Some(state.cylinder));
        }

        state.segments.push(PlanSegment {
            kind,
            start_runtime_sec: state.runtime_sec,
            duration_sec,
            start_depth_m: state.depth_m,
            end_depth_m,
            cylinder: state.cylinder,
            gas: breathing.gas,
            setpoint: state.setpoint,
            rate_m_min,
        });
        state.runtime_sec += duration_sec;
        state.depth_m = end_depth_m;
        self.sample(state)
    }

    /// Move to `target_m` at the configured rates in time-step slices.
    fn transit(&mut self, state: &mut DiveState, target_m: f64, kind: SegmentKind) -> Result<()> {
        let config = self.config;
        let rates = &config.rates;
        let time_step = config.stops.time_step_sec;
        let descending = target_m > state.depth_m;
        while (state.depth_m - target_m).abs() > DEPTH_EPSILON {
            let rate = if descending {
                rates.descent_m_min
            } else {
                rates.ascent_rate_at(state.depth_m)
            };
            let remaining = (target_m - state.depth_m).abs();
            let slice = rate * time_step as f64 / 60.0;
            let (next, duration) = if remaining <= slice + DEPTH_EPSILON {
                (target_m, transit_seconds(remaining, rate))
            } else if descending {
                (state.depth_m + slice, time_step)
            } else {
                (state.depth_m - slice, time_step)
            };
            self.step(state, kind, next, duration, Some(rate))?;
        }
        Ok(())
    }

    /// Stay at the current depth for `duration_sec` in `chunk_sec` steps.
    fn hold(
        &mut self,
        state: &mut DiveState,
        kind: SegmentKind,
        duration_sec: u32,
        chunk_sec: u32,
    ) -> Result<()> {
        let mut left = duration_sec;
        while left > 0 {
            let duration = left.min(chunk_sec);
            self.step(state, kind, state.depth_m, duration, None)?;
            left -= duration;
        }
        Ok(())
    }

    fn switch_gas(&mut self, state: &mut DiveState, cylinder: usize, setpoint: Option<f64>) -> Result<()> {
        self.budget.tick()?;
        let gas = self.registry.get(cylinder)?.gas;
        let previous = state.phase;
        state.enter(Phase::GasSwitch);
        state.cylinder = cylinder;
        state.setpoint = setpoint;
        state.segments.push(PlanSegment {
            kind: SegmentKind::GasSwitch,
            start_runtime_sec: state.runtime_sec,
            duration_sec: 0,
            start_depth_m: state.depth_m,
            end_depth_m: state.depth_m,
            cylinder,
            gas,
            setpoint,
            rate_m_min: None,
        });
        state.enter(previous);
        self.sample(state)
    }

    fn follow_waypoints(&mut self, state: &mut DiveState, waypoints: &[Waypoint]) -> Result<()> {
        let config = self.config;
        let gas = &config.gas;
        let time_step = config.stops.time_step_sec;

        for wp in waypoints {
            if wp.cylinder != state.cylinder || wp.setpoint != state.setpoint {
                self.switch_gas(state, wp.cylinder, wp.setpoint)?;
            }

            if wp.setpoint.is_none() {
                let mix = self.registry.get(wp.cylinder)?.gas;
                let too_deep = wp.depth_m
                    > mix.max_operating_depth(&self.env, gas.bottom_max_po2) + DEPTH_EPSILON;
                let hypoxic =
                    wp.depth_m < mix.min_operating_depth(&self.env, gas.min_po2) - DEPTH_EPSILON;
                if too_deep || hypoxic {
                    let po2 = mix.po2_at(self.env.ambient_pressure(wp.depth_m));
                    state.warn(WarningKind::GasUnbreathable { po2 }, Some(wp.cylinder));
                }
            }

            if wp.depth_m > state.depth_m + DEPTH_EPSILON {
                state.enter(Phase::Descending);
                self.transit(state, wp.depth_m, SegmentKind::Descent)?;
            } else if wp.depth_m < state.depth_m - DEPTH_EPSILON {
                self.planned_ascent(state, wp.depth_m)?;
            }

            state.enter(Phase::Bottom);
            self.hold(state, SegmentKind::Bottom, wp.duration_sec, time_step)?;
        }
        Ok(())
    }

    /// A user-planned ascent; warns once if it breaks the ceiling.
    fn planned_ascent(&mut self, state: &mut DiveState, target_m: f64) -> Result<()> {
        let config = self.config;
        let rates = &config.rates;
        let time_step = config.stops.time_step_sec;
        let mut warned = false;
        while state.depth_m - target_m > DEPTH_EPSILON {
            let rate = rates.ascent_rate_at(state.depth_m);
            let slice = rate * time_step as f64 / 60.0;
            let remaining = state.depth_m - target_m;
            let (next, duration) = if remaining <= slice + DEPTH_EPSILON {
                (target_m, transit_seconds(remaining, rate))
            } else {
                (state.depth_m - slice, time_step)
            };
            self.step(state, SegmentKind::AscentTransition, next, duration, Some(rate))?;

            let ambient = self.env.ambient_pressure(state.depth_m);
            let ceiling = self.strategy.ceiling(&state.tissues, ambient);
            if !warned && !ceiling.permits(ambient) {
                warned = true;
                let ceiling_m = ceiling.depth(&self.env);
                state.warn(WarningKind::CeilingViolated { ceiling_m }, Some(state.cylinder));
            }
        }
        Ok(())
    }

    fn ascend_until_final(&mut self, snapshot: DiveState, max_depth_m: f64) -> Result<(DiveState, u32)> {
        let max_passes = self.config.limits.max_passes;
        let mut previous = None;
        for pass in 1..=max_passes {
            self.strategy.begin_pass();
            let mut attempt = snapshot.clone();
            self.ascend(&mut attempt, snapshot.runtime_sec, max_depth_m)?;
            let deco_time = attempt.runtime_sec - snapshot.runtime_sec;
            match self.strategy.finish_pass(deco_time, previous) {
                PassVerdict::Final => return Ok((attempt, pass)),
                PassVerdict::Repeat => {
                    tracing::debug!(pass, deco_time_sec = deco_time, "repeating ascent pass");
                    previous = Some(deco_time);
                }
            }
        }
        Err(PlanError::ExcessiveTime {
            reason: format!("no convergence after {max_passes} ascent passes"),
        })
    }

    fn check_deco_time(&self, state: &DiveState, ascent_start_sec: u32) -> Result<()> {
        let limit_min = self.config.limits.max_deco_time_min;
        let elapsed = u64::from(state.runtime_sec.saturating_sub(ascent_start_sec));
        if elapsed > u64::from(limit_min) * 60 {
            return Err(PlanError::ExcessiveTime {
                reason: format!("ascent longer than {limit_min} min"),
            });
        }
        Ok(())
    }

    /// Next level above `depth_m`: a multiple of the stop increment, the
    /// surface below the last stop, or the safety stop when one is due.
    fn next_level(&self, depth_m: f64, safety_due: bool) -> f64 {
        let stops = &self.config.stops;
        let mut next = ((depth_m - DEPTH_EPSILON) / stops.stop_increment_m).floor() * stops.stop_increment_m;
        if next < stops.last_stop_m - DEPTH_EPSILON {
            next = 0.0;
        }
        if safety_due
            && depth_m > stops.safety_stop_depth_m + DEPTH_EPSILON
            && next < stops.safety_stop_depth_m - DEPTH_EPSILON
        {
            next = stops.safety_stop_depth_m;
        }
        next.max(0.0)
    }

    /// Better open-circuit gas than the current one at `depth_m`, if any.
    fn better_gas(&self, state: &DiveState, depth_m: f64) -> Result<Option<usize>> {
        let gas = &self.config.gas;
        let ambient = self.env.ambient_pressure(depth_m);
        let Some(best) = self.registry.best_gas_at(ambient, gas.min_po2, gas.deco_max_po2) else {
            return Ok(None);
        };
        if best == state.cylinder {
            return Ok(None);
        }
        let current = self.registry.get(state.cylinder)?.gas;
        let candidate = self.registry.get(best)?.gas;
        let richer = candidate.o2() > current.o2() + 1e-9
            || ((candidate.o2() - current.o2()).abs() <= 1e-9 && candidate.he() < current.he() - 1e-9);
        Ok(richer.then_some(best))
    }

    fn ascend(&mut self, state: &mut DiveState, ascent_start_sec: u32, max_depth_m: f64) -> Result<()> {
        let config = self.config;
        let stops = &config.stops;
        let closed_circuit = state.setpoint.is_some();
        let safety_eligible = stops.safety_stop && max_depth_m >= stops.safety_stop_threshold_m;
        let mut deco_stopped = false;
        let mut safety_done = false;
        let mut pending_switch: Option<usize> = None;

        state.enter(Phase::AscentTransition);
        while state.depth_m > DEPTH_EPSILON {
            let safety_due = safety_eligible && !deco_stopped && !safety_done;
            let next = self.next_level(state.depth_m, safety_due);
            let next_bar = self.env.ambient_pressure(next);

            while !self.strategy.ceiling(&state.tissues, next_bar).permits(next_bar) {
                if !deco_stopped {
                    deco_stopped = true;
                    tracing::debug!(depth_m = state.depth_m, "first decompression stop");
                }
                let here = self.env.ambient_pressure(state.depth_m);
                self.strategy.note_deco_stop(here);
                if let Some(cylinder) = pending_switch.take() {
                    self.switch_gas(state, cylinder, None)?;
                }
                state.enter(Phase::DecoStop);
                self.hold(state, SegmentKind::DecoStop, stops.stop_step_sec, stops.stop_step_sec)?;
                self.check_deco_time(state, ascent_start_sec)?;
            }

            state.enter(Phase::AscentTransition);
            self.transit(state, next, SegmentKind::AscentTransition)?;
            self.check_deco_time(state, ascent_start_sec)?;
            if next <= DEPTH_EPSILON {
                break;
            }

            if !closed_circuit {
                if let Some(cylinder) = self.better_gas(state, next)? {
                    if stops.switch_only_at_required_stops {
                        pending_switch = Some(cylinder);
                    } else {
                        self.switch_gas(state, cylinder, None)?;
                        if stops.min_switch_duration_sec > 0 {
                            state.enter(Phase::DecoStop);
                            self.hold(
                                state,
                                SegmentKind::DecoStop,
                                stops.min_switch_duration_sec,
                                stops.time_step_sec,
                            )?;
                        }
                    }
                }
            }

            if safety_due && (next - stops.safety_stop_depth_m).abs() < DEPTH_EPSILON {
                safety_done = true;
                state.enter(Phase::SafetyStop);
                self.hold(
                    state,
                    SegmentKind::SafetyStop,
                    stops.safety_stop_duration_sec,
                    stops.time_step_sec,
                )?;
            }
        }
        state.enter(Phase::Surfaced);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::gas::{Cylinder, GasMix};

    fn air_registry() -> GasRegistry {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 24.0, 232.0));
        registry
    }

    fn planner(config: PlannerConfig, registry: GasRegistry) -> Planner {
        Planner::new(config, registry).unwrap()
    }

    #[test]
    fn test_validation_errors_before_scheduling() {
        let mut p = planner(PlannerConfig::default(), air_registry());
        assert_eq!(p.plan(&[]), Err(PlanError::EmptyProfile));
        assert_eq!(
            p.plan(&[Waypoint::new(20.0, 0, 0)]),
            Err(PlanError::InvalidDuration { index: 0 })
        );
        assert!(matches!(
            p.plan(&[Waypoint::new(-1.0, 60, 0)]),
            Err(PlanError::InvalidDepth { index: 0, .. })
        ));
        assert_eq!(
            p.plan(&[Waypoint::new(20.0, 60, 0), Waypoint::new(20.0, 60, 3)]),
            Err(PlanError::GasNotFound(3))
        );
        assert!(matches!(
            p.plan(&[Waypoint::new(20.0, 60, 0).with_setpoint(3.0)]),
            Err(PlanError::InvalidSetpoint { index: 0, .. })
        ));
    }

    #[test]
    fn test_next_level_sequence() {
        let config = PlannerConfig::default();
        let registry = air_registry();
        let engine = Engine {
            config: &config,
            registry: &registry,
            env: Environment::sea_level(),
            strategy: strategy_for(&config.model, 1.01325),
            budget: ComputeBudget::new(&config.limits, None),
        };
        assert_eq!(engine.next_level(40.0, false), 39.0);
        assert_eq!(engine.next_level(39.0, false), 36.0);
        assert_eq!(engine.next_level(6.0, false), 3.0);
        assert_eq!(engine.next_level(3.0, false), 0.0);
        assert_eq!(engine.next_level(6.0, true), 5.0);
        assert_eq!(engine.next_level(5.0, true), 3.0);
    }

    #[test]
    fn test_descent_and_bottom_segments() {
        let mut p = planner(PlannerConfig::default(), air_registry());
        let plan = p.plan(&[Waypoint::new(18.0, 10 * 60, 0)]).unwrap();
        assert_eq!(plan.segments[0].kind, SegmentKind::Descent);
        assert_eq!(plan.segments[0].duration_sec, 60);
        assert_eq!(plan.segments[0].end_depth_m, 18.0);
        assert_eq!(plan.segments[1].kind, SegmentKind::Bottom);
        assert_eq!(plan.segments[1].duration_sec, 600);
        assert_eq!(plan.ascent_start_sec, 660);
        assert_eq!(plan.samples.first().map(|s| s.runtime_sec), Some(0));
    }

    #[test]
    fn test_safety_stop_on_shallow_no_deco_dive() {
        let mut p = planner(PlannerConfig::default(), air_registry());
        let plan = p.plan(&[Waypoint::new(18.0, 10 * 60, 0)]).unwrap();
        let safety: Vec<_> = plan
            .segments
            .iter()
            .filter(|s| s.kind == SegmentKind::SafetyStop)
            .collect();
        assert_eq!(safety.len(), 1);
        assert_eq!(safety[0].duration_sec, 180);
        assert_eq!(safety[0].start_depth_m, 5.0);
        assert!(!plan.has_deco_stops());
    }

    #[test]
    fn test_no_safety_stop_below_threshold() {
        let mut p = planner(PlannerConfig::default(), air_registry());
        let plan = p.plan(&[Waypoint::new(8.0, 10 * 60, 0)]).unwrap();
        assert!(plan.segments.iter().all(|s| s.kind != SegmentKind::SafetyStop));
    }

    #[test]
    fn test_deco_gas_switch() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 24.0, 232.0));
        registry.add(Cylinder::new(GasMix::nitrox(50.0).unwrap(), 11.0, 207.0));
        let mut p = planner(PlannerConfig::default(), registry);
        let plan = p.plan(&[Waypoint::new(45.0, 25 * 60, 0)]).unwrap();

        let switch = plan
            .segments
            .iter()
            .find(|s| s.kind == SegmentKind::GasSwitch)
            .expect("switch to EAN50");
        assert_eq!(switch.cylinder, 1);
        assert_eq!(switch.duration_sec, 0);
        assert!(switch.start_depth_m <= 21.65, "EAN50 switch at {} m", switch.start_depth_m);
        // Every later segment breathes the deco gas.
        assert!(plan
            .segments
            .iter()
            .filter(|s| s.start_runtime_sec > switch.start_runtime_sec)
            .all(|s| s.cylinder == 1));
    }

    #[test]
    fn test_closed_circuit_never_switches_on_ascent() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 3.0, 200.0).as_diluent());
        registry.add(Cylinder::new(GasMix::nitrox(50.0).unwrap(), 11.0, 207.0));
        let mut p = planner(PlannerConfig::default(), registry);
        let plan = p
            .plan(&[Waypoint::new(40.0, 30 * 60, 0).with_setpoint(1.3)])
            .unwrap();
        assert!(plan.segments.iter().all(|s| s.kind != SegmentKind::GasSwitch));
        assert!(plan.segments.iter().all(|s| s.setpoint == Some(1.3)));
    }

    #[test]
    fn test_user_ascent_above_ceiling_warns() {
        let mut p = planner(PlannerConfig::default(), air_registry());
        let plan = p
            .plan(&[Waypoint::new(45.0, 30 * 60, 0), Waypoint::new(3.0, 60, 0)])
            .unwrap();
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w.kind, WarningKind::CeilingViolated { .. })));
    }

    #[test]
    fn test_waypoint_circuit_must_match_cylinder() {
        let mut registry = air_registry();
        registry.add(Cylinder::new(GasMix::air(), 3.0, 200.0).as_diluent());
        let mut p = planner(PlannerConfig::default(), registry);

        assert!(matches!(
            p.plan(&[Waypoint::new(30.0, 600, 0).with_setpoint(1.3)]),
            Err(PlanError::CircuitMismatch {
                index: 0,
                cylinder: 0,
                ..
            })
        ));
        assert!(matches!(
            p.plan(&[Waypoint::new(30.0, 600, 0), Waypoint::new(20.0, 600, 1)]),
            Err(PlanError::CircuitMismatch {
                index: 1,
                cylinder: 1,
                ..
            })
        ));
        assert!(p
            .plan(&[Waypoint::new(30.0, 600, 1).with_setpoint(1.3)])
            .is_ok());
    }

    #[test]
    fn test_hypoxic_gas_at_shallow_waypoint_warns() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::trimix(10.0, 70.0).unwrap(), 11.0, 200.0));
        let mut p = planner(PlannerConfig::default(), registry);
        let plan = p.plan(&[Waypoint::new(3.0, 5 * 60, 0)]).unwrap();
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w.kind, WarningKind::GasUnbreathable { .. })));
    }

    #[test]
    fn test_unbreathable_gas_warns() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::oxygen(), 11.0, 200.0));
        let mut p = planner(PlannerConfig::default(), registry);
        let plan = p.plan(&[Waypoint::new(20.0, 5 * 60, 0)]).unwrap();
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w.kind, WarningKind::GasUnbreathable { .. })));
        assert!(plan
            .warnings
            .iter()
            .any(|w| matches!(w.kind, WarningKind::Po2High { .. })));
    }

    #[test]
    fn test_too_many_gas_mixes_warns() {
        let mut registry = air_registry();
        for _ in 0..MAX_GAS_MIXES {
            registry.add(Cylinder::new(GasMix::air(), 11.0, 200.0));
        }
        let mut p = planner(PlannerConfig::default(), registry);
        let plan = p.plan(&[Waypoint::new(10.0, 5 * 60, 0)]).unwrap();
        assert!(plan.warnings.iter().any(|w| matches!(
            w.kind,
            WarningKind::TooManyGasMixes {
                requested: 17,
                supported: 16
            }
        )));
    }

    #[test]
    fn test_vpmb_iterates_passes() {
        crate::logging::init_test();
        let config = PlannerConfig {
            model: ModelConfig::Vpmb { conservatism: 2 },
            ..PlannerConfig::default()
        };
        let mut p = planner(config, air_registry());
        let plan = p.plan(&[Waypoint::new(45.0, 25 * 60, 0)]).unwrap();
        assert!(plan.passes >= 2, "VPM-B should repeat at least once, got {}", plan.passes);
        assert!(plan.has_deco_stops());
        assert_eq!(plan.model, "VPM-B +2");
    }
}
