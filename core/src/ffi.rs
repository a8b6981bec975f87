//! Flat records and functions exported to the host application.

use crate::config::PlannerConfig;
use crate::error::{PlanError, Result};
use crate::gas::{self, Cylinder, GasRegistry};
use crate::render;
use crate::schedule::{Planner, SegmentKind, Waypoint};
use crate::warning::WarningKind;

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCylinder {
    /// Gas name such as `air`, `EAN32` or `Tx18/45`.
    pub gas: String,
    pub size_l: f64,
    pub working_pressure_bar: f64,
    /// Defaults to the working pressure.
    pub start_pressure_bar: Option<f64>,
    pub diluent: bool,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWaypoint {
    pub depth_m: f64,
    pub duration_sec: u32,
    pub cylinder: u32,
    pub setpoint_bar: Option<f64>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPlanRequest {
    pub cylinders: Vec<FfiCylinder>,
    pub waypoints: Vec<FfiWaypoint>,
    /// Planner configuration as TOML; defaults when absent.
    pub config_toml: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGasMix {
    pub name: String,
    pub o2: f64,
    pub he: f64,
    pub n2: f64,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSample {
    pub runtime_sec: u32,
    pub depth_m: f64,
    pub po2: f64,
    pub pn2: f64,
    pub phe: f64,
    pub ceiling_m: f64,
    pub surface_gf: f64,
    pub leading_compartment: u32,
    pub loadings: Vec<f64>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSegment {
    pub kind: String,
    pub start_runtime_sec: u32,
    pub duration_sec: u32,
    pub start_depth_m: f64,
    pub end_depth_m: f64,
    pub cylinder: u32,
    pub gas: String,
    pub setpoint_bar: Option<f64>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWarning {
    pub kind: String,
    pub message: String,
    pub runtime_sec: u32,
    pub depth_m: f64,
    pub cylinder: Option<u32>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCylinderUsage {
    pub cylinder: u32,
    pub gas: String,
    pub start_pressure_bar: f64,
    pub end_pressure_bar: f64,
    pub used_l: f64,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPlanResult {
    pub model: String,
    pub runtime_sec: u32,
    pub text: String,
    pub cns_percent: f64,
    pub otu: f64,
    pub segments: Vec<FfiSegment>,
    pub samples: Vec<FfiSample>,
    pub warnings: Vec<FfiWarning>,
    pub cylinders: Vec<FfiCylinderUsage>,
}

fn segment_kind_name(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Descent => "descent",
        SegmentKind::Bottom => "bottom",
        SegmentKind::AscentTransition => "ascent",
        SegmentKind::DecoStop => "deco_stop",
        SegmentKind::SafetyStop => "safety_stop",
        SegmentKind::GasSwitch => "gas_switch",
    }
}

fn warning_kind_name(kind: &WarningKind) -> &'static str {
    match kind {
        WarningKind::Po2High { .. } => "po2_high",
        WarningKind::Po2Low { .. } => "po2_low",
        WarningKind::CnsExceeded { .. } => "cns_exceeded",
        WarningKind::InsufficientGas { .. } => "insufficient_gas",
        WarningKind::InsufficientReserve { .. } => "insufficient_reserve",
        WarningKind::TooManyGasMixes { .. } => "too_many_gas_mixes",
        WarningKind::GasUnbreathable { .. } => "gas_unbreathable",
        WarningKind::CeilingViolated { .. } => "ceiling_violated",
    }
}

fn build_registry(cylinders: &[FfiCylinder]) -> Result<GasRegistry> {
    let mut registry = GasRegistry::new();
    for spec in cylinders {
        let mix = gas::parse_gas(&spec.gas)?;
        let mut cylinder = Cylinder::new(mix, spec.size_l, spec.working_pressure_bar);
        if let Some(start) = spec.start_pressure_bar {
            cylinder = cylinder.with_start_pressure(start);
        }
        if spec.diluent {
            cylinder = cylinder.as_diluent();
        }
        registry.add(cylinder);
    }
    Ok(registry)
}

/// Compute and render a dive plan.
#[uniffi::export]
pub fn compute_plan(request: FfiPlanRequest) -> std::result::Result<FfiPlanResult, PlanError> {
    let config = match &request.config_toml {
        Some(contents) => PlannerConfig::from_toml_str(contents)?,
        None => PlannerConfig::default(),
    };
    let registry = build_registry(&request.cylinders)?;
    let waypoints: Vec<Waypoint> = request
        .waypoints
        .iter()
        .map(|w| Waypoint {
            depth_m: w.depth_m,
            duration_sec: w.duration_sec,
            cylinder: w.cylinder as usize,
            setpoint: w.setpoint_bar,
        })
        .collect();

    let mut planner = Planner::new(config, registry)?;
    let plan = planner.plan(&waypoints)?;
    let rendered = render::render(&plan)?;

    Ok(FfiPlanResult {
        model: plan.model.clone(),
        runtime_sec: plan.runtime_sec,
        text: rendered.text,
        cns_percent: plan.exposure.cns_percent,
        otu: plan.exposure.otu,
        segments: plan
            .segments
            .iter()
            .map(|s| FfiSegment {
                kind: segment_kind_name(s.kind).to_string(),
                start_runtime_sec: s.start_runtime_sec,
                duration_sec: s.duration_sec,
                start_depth_m: s.start_depth_m,
                end_depth_m: s.end_depth_m,
                cylinder: s.cylinder as u32,
                gas: s.gas.to_string(),
                setpoint_bar: s.setpoint,
            })
            .collect(),
        samples: rendered
            .samples
            .into_iter()
            .map(|s| FfiSample {
                runtime_sec: s.runtime_sec,
                depth_m: s.depth_m,
                po2: s.po2,
                pn2: s.pn2,
                phe: s.phe,
                ceiling_m: s.ceiling_m,
                surface_gf: s.surface_gf,
                leading_compartment: s.leading_compartment as u32,
                loadings: s.loadings.to_vec(),
            })
            .collect(),
        warnings: plan
            .warnings
            .iter()
            .map(|w| FfiWarning {
                kind: warning_kind_name(&w.kind).to_string(),
                message: w.kind.to_string(),
                runtime_sec: w.runtime_sec,
                depth_m: w.depth_m,
                cylinder: w.cylinder.map(|c| c as u32),
            })
            .collect(),
        cylinders: plan
            .gas_usage
            .iter()
            .map(|u| FfiCylinderUsage {
                cylinder: u.cylinder as u32,
                gas: u.gas.to_string(),
                start_pressure_bar: u.start_pressure_bar,
                end_pressure_bar: u.end_pressure_bar,
                used_l: u.used_l,
            })
            .collect(),
    })
}

/// Parse a gas name into its fractions.
#[uniffi::export]
pub fn parse_gas(name: String) -> std::result::Result<FfiGasMix, PlanError> {
    let mix = gas::parse_gas(&name)?;
    Ok(FfiGasMix {
        name: mix.to_string(),
        o2: mix.o2(),
        he: mix.he(),
        n2: mix.n2(),
    })
}

/// Route engine logs to stderr at `level` unless RUST_LOG is set.
#[uniffi::export]
pub fn init_logging(level: String) {
    crate::logging::init_with_level(&level);
}
