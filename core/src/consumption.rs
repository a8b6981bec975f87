//! Gas consumption projected from SAC rates.
//!
//! Volumes are surface-equivalent litres; cylinder pressure follows the
//! ideal-gas projection `litres / water volume`.

use crate::config::GasConfig;
use crate::gas::{GasMix, GasRegistry};
use crate::pressure::Environment;
use crate::schedule::{PlanSegment, SegmentKind};
use crate::warning::{Warning, WarningKind};

/// Projected use of one cylinder over the whole plan.
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderUsage {
    pub cylinder: usize,
    pub gas: GasMix,
    pub start_pressure_bar: f64,
    pub end_pressure_bar: f64,
    pub used_l: f64,
}

/// Litres drawn by one segment, `0.0` on the loop.
pub fn segment_litres(segment: &PlanSegment, env: &Environment, gas: &GasConfig) -> f64 {
    if segment.is_closed_circuit() || segment.duration_sec == 0 {
        return 0.0;
    }
    let sac = match segment.kind {
        SegmentKind::Descent | SegmentKind::Bottom => gas.sac_bottom_l_min,
        SegmentKind::AscentTransition
        | SegmentKind::DecoStop
        | SegmentKind::SafetyStop
        | SegmentKind::GasSwitch => gas.sac_deco_l_min,
    };
    let ambient = env.ambient_pressure(segment.mean_depth_m());
    sac * ambient / env.surface_pressure() * segment.duration_sec as f64 / 60.0
}

/// Draw every segment from its cylinder and report shortfalls.
///
/// Cylinders are restored to their start pressure first, so the registry
/// ends up holding the projected end pressures.
pub fn estimate(
    segments: &[PlanSegment],
    registry: &mut GasRegistry,
    env: &Environment,
    gas: &GasConfig,
    ascent_start_sec: u32,
    max_depth_m: f64,
) -> (Vec<CylinderUsage>, Vec<Warning>) {
    let count = registry.len();
    let mut used = vec![0.0; count];
    let mut before_ascent = vec![0.0; count];
    let mut ascent = vec![0.0; count];
    let mut ran_out: Vec<Option<&PlanSegment>> = vec![None; count];

    registry.restore_all();

    for segment in segments {
        let Ok(cylinder) = registry.get_mut(segment.cylinder) else {
            continue;
        };
        let litres = segment_litres(segment, env, gas);
        if litres <= 0.0 {
            continue;
        }
        let i = segment.cylinder;
        used[i] += litres;
        if segment.start_runtime_sec >= ascent_start_sec {
            ascent[i] += litres;
        } else {
            before_ascent[i] += litres;
        }
        let shortfall = cylinder.consume(litres);
        if shortfall > 0.0 && ran_out[i].is_none() {
            ran_out[i] = Some(segment);
        }
    }

    let mut warnings = Vec::new();
    for (i, segment) in ran_out.iter().enumerate() {
        if let (Some(segment), Ok(cylinder)) = (segment, registry.get(i)) {
            warnings.push(Warning {
                kind: WarningKind::InsufficientGas {
                    required_l: used[i],
                    available_l: cylinder.start_volume_l(),
                },
                runtime_sec: segment.end_runtime_sec(),
                depth_m: segment.end_depth_m,
                cylinder: Some(i),
            });
        }
    }

    // Minimum gas for the cylinder breathed at the deepest point.
    let deepest = segments
        .iter()
        .find(|s| !s.is_closed_circuit() && s.start_depth_m.max(s.end_depth_m) >= max_depth_m - 1e-6);
    if let Some(segment) = deepest {
        let i = segment.cylinder;
        if let Ok(cylinder) = registry.get(i) {
            let bottom_ratio = env.ambient_pressure(max_depth_m) / env.surface_pressure();
            let reserve_l = gas.reserve_sac_factor
                * (gas.problem_solving_min * gas.sac_bottom_l_min * bottom_ratio + ascent[i]);
            let remaining_l = cylinder.start_volume_l() - before_ascent[i];
            if remaining_l < reserve_l {
                warnings.push(Warning {
                    kind: WarningKind::InsufficientReserve {
                        reserve_l,
                        remaining_l,
                    },
                    runtime_sec: ascent_start_sec,
                    depth_m: max_depth_m,
                    cylinder: Some(i),
                });
            }
        }
    }

    let usage = registry
        .iter()
        .map(|(i, cylinder)| CylinderUsage {
            cylinder: i,
            gas: cylinder.gas,
            start_pressure_bar: cylinder.start_pressure_bar,
            end_pressure_bar: cylinder.current_pressure(),
            used_l: used[i],
        })
        .collect();
    (usage, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::Cylinder;

    fn segment(kind: SegmentKind, start: u32, minutes: u32, depth: f64, cylinder: usize) -> PlanSegment {
        PlanSegment {
            kind,
            start_runtime_sec: start,
            duration_sec: minutes * 60,
            start_depth_m: depth,
            end_depth_m: depth,
            cylinder,
            gas: GasMix::air(),
            setpoint: None,
            rate_m_min: None,
        }
    }

    fn env() -> Environment {
        Environment::new(1.0, 1019.716)
    }

    #[test]
    fn test_litres_scale_with_pressure_and_sac() {
        // 1 bar surface and 0.1 bar/m: 10 m is exactly 2 bar.
        let gas = GasConfig::default();
        let bottom = segment(SegmentKind::Bottom, 0, 10, 10.0, 0);
        let litres = segment_litres(&bottom, &env(), &gas);
        assert!((litres - 20.0 * 2.0 * 10.0).abs() < 1e-3, "got {litres}");

        let stop = segment(SegmentKind::DecoStop, 0, 10, 10.0, 0);
        let litres = segment_litres(&stop, &env(), &gas);
        assert!((litres - 17.0 * 2.0 * 10.0).abs() < 1e-3, "got {litres}");
    }

    #[test]
    fn test_closed_circuit_draws_nothing() {
        let mut ccr = segment(SegmentKind::Bottom, 0, 30, 30.0, 0);
        ccr.setpoint = Some(1.3);
        assert_eq!(segment_litres(&ccr, &env(), &GasConfig::default()), 0.0);
    }

    #[test]
    fn test_pressure_projection() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 12.0, 200.0));
        let segments = [segment(SegmentKind::Bottom, 0, 10, 10.0, 0)];
        let (usage, warnings) =
            estimate(&segments, &mut registry, &env(), &GasConfig::default(), 600, 10.0);
        assert!((usage[0].used_l - 400.0).abs() < 1e-3);
        let expected = 200.0 - 400.0 / 12.0;
        assert!((usage[0].end_pressure_bar - expected).abs() < 1e-3);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_insufficient_gas_warns_once() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 3.0, 200.0));
        let segments = [
            segment(SegmentKind::Bottom, 0, 10, 30.0, 0),
            segment(SegmentKind::Bottom, 600, 10, 30.0, 0),
        ];
        let (usage, warnings) =
            estimate(&segments, &mut registry, &env(), &GasConfig::default(), 1200, 30.0);
        assert_eq!(usage[0].end_pressure_bar, 0.0);
        let shortfalls: Vec<_> = warnings
            .iter()
            .filter(|w| matches!(w.kind, WarningKind::InsufficientGas { .. }))
            .collect();
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].runtime_sec, 600);
        assert_eq!(shortfalls[0].cylinder, Some(0));
    }

    #[test]
    fn test_reserve_applies_to_bottom_cylinder() {
        let mut registry = GasRegistry::new();
        registry.add(Cylinder::new(GasMix::air(), 12.0, 200.0));
        registry.add(Cylinder::new(GasMix::oxygen(), 3.0, 200.0));
        // 2400 l in the back gas, 1600 l of it used before the ascent.
        let segments = [
            segment(SegmentKind::Bottom, 0, 20, 30.0, 0),
            segment(SegmentKind::AscentTransition, 1200, 3, 15.0, 0),
            segment(SegmentKind::DecoStop, 1380, 10, 6.0, 1),
        ];
        let (_, warnings) =
            estimate(&segments, &mut registry, &env(), &GasConfig::default(), 1200, 30.0);
        let reserve = warnings
            .iter()
            .find(|w| matches!(w.kind, WarningKind::InsufficientReserve { .. }))
            .expect("reserve warning");
        assert_eq!(reserve.cylinder, Some(0));
        assert_eq!(reserve.runtime_sec, 1200);
    }
}
