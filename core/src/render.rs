//! Plain-text plan and profile samples for display.

use crate::error::{PlanError, Result};
use crate::schedule::{DivePlan, PlanSegment, ProfileSample, SegmentKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPlan {
    pub samples: Vec<ProfileSample>,
    pub text: String,
}

/// `m:ss`, or `h:mm:ss` from one hour.
pub fn format_runtime(seconds: u32) -> String {
    let (h, m, s) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

fn format_depth(depth_m: f64) -> String {
    if (depth_m - depth_m.round()).abs() < 0.05 {
        format!("{:.0}m", depth_m)
    } else {
        format!("{:.1}m", depth_m)
    }
}

fn gas_note(segment: &PlanSegment) -> String {
    match segment.setpoint {
        Some(setpoint) => format!(" ({} SP {:.1})", segment.gas, setpoint),
        None => format!(" ({})", segment.gas),
    }
}

fn segment_line(segment: &PlanSegment) -> String {
    let runtime = format_runtime(segment.end_runtime_sec());
    let depth = format_depth(segment.end_depth_m);
    match segment.kind {
        SegmentKind::Descent | SegmentKind::AscentTransition => format!(
            "Transition to {} at rate {:.0} m/min - runtime {}{}",
            depth,
            segment.rate_m_min.unwrap_or_default(),
            runtime,
            gas_note(segment)
        ),
        SegmentKind::Bottom => format!(
            "Stay at {} for {} - runtime {}{}",
            depth,
            format_runtime(segment.duration_sec),
            runtime,
            gas_note(segment)
        ),
        SegmentKind::DecoStop => format!(
            "Stay at {} for {} - runtime {}{} deco stop",
            depth,
            format_runtime(segment.duration_sec),
            runtime,
            gas_note(segment)
        ),
        SegmentKind::SafetyStop => format!(
            "Stay at {} for {} - runtime {}{} safety stop",
            depth,
            format_runtime(segment.duration_sec),
            runtime,
            gas_note(segment)
        ),
        SegmentKind::GasSwitch => {
            let gas = match segment.setpoint {
                Some(setpoint) => format!("{} SP {:.1}", segment.gas, setpoint),
                None => segment.gas.to_string(),
            };
            format!("Switch gas to {} at {} - runtime {}", gas, depth, runtime)
        }
    }
}

/// Render a computed plan. An empty segment list is a caller error.
pub fn render(plan: &DivePlan) -> Result<RenderedPlan> {
    if plan.segments.is_empty() {
        return Err(PlanError::EmptyPlan);
    }

    let mut lines = vec![format!("Model: {}", plan.model)];
    lines.extend(plan.segments.iter().map(segment_line));
    lines.push(format!("CNS: {:.0}%", plan.exposure.cns_percent));
    lines.push(format!("OTU: {:.0}", plan.exposure.otu));
    lines.extend(plan.gas_usage.iter().map(|usage| {
        format!(
            "Cylinder {} ({}): {:.0} l, {:.0} -> {:.0} bar",
            usage.cylinder,
            usage.gas,
            usage.used_l,
            usage.start_pressure_bar,
            usage.end_pressure_bar
        )
    }));
    lines.extend(plan.warnings.iter().map(|warning| format!("Warning: {warning}")));
    let mut text = lines.join("\n");
    text.push('\n');

    let mut samples = plan.samples.clone();
    samples.sort_by_key(|s| s.runtime_sec);
    Ok(RenderedPlan { samples, text })
}
