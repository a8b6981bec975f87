use crate::gas::GasMix;

/// What a plan segment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Descent,
    Bottom,
    AscentTransition,
    DecoStop,
    SafetyStop,
    /// Zero-duration marker where the breathing gas changes.
    GasSwitch,
}

impl SegmentKind {
    /// Level segments hold one depth for their whole duration.
    pub fn is_level(&self) -> bool {
        match self {
            SegmentKind::Bottom
            | SegmentKind::DecoStop
            | SegmentKind::SafetyStop
            | SegmentKind::GasSwitch => true,
            SegmentKind::Descent | SegmentKind::AscentTransition => false,
        }
    }
}

/// One piece of the computed profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSegment {
    pub kind: SegmentKind,
    pub start_runtime_sec: u32,
    pub duration_sec: u32,
    pub start_depth_m: f64,
    pub end_depth_m: f64,
    pub cylinder: usize,
    pub gas: GasMix,
    pub setpoint: Option<f64>,
    /// Nominal rate for transits (m/min).
    pub rate_m_min: Option<f64>,
}

impl PlanSegment {
    pub fn end_runtime_sec(&self) -> u32 {
        self.start_runtime_sec + self.duration_sec
    }

    pub fn mean_depth_m(&self) -> f64 {
        (self.start_depth_m + self.end_depth_m) / 2.0
    }

    pub fn is_closed_circuit(&self) -> bool {
        self.setpoint.is_some()
    }

    /// True if `next` continues this segment without a change of kind,
    /// breathing gas or rate.
    fn continues_with(&self, next: &PlanSegment) -> bool {
        self.kind == next.kind
            && self.kind != SegmentKind::GasSwitch
            && self.cylinder == next.cylinder
            && self.setpoint == next.setpoint
            && self.rate_m_min == next.rate_m_min
            && self.end_runtime_sec() == next.start_runtime_sec
            && (self.end_depth_m - next.start_depth_m).abs() < 1e-9
            && (!self.kind.is_level() || (next.start_depth_m - next.end_depth_m).abs() < 1e-9)
    }
}

/// Append-only segment list that merges consecutive steps of the same kind.
#[derive(Debug, Clone, Default)]
pub struct SegmentLog {
    segments: Vec<PlanSegment>,
}

impl SegmentLog {
    pub fn push(&mut self, segment: PlanSegment) {
        if let Some(last) = self.segments.last_mut() {
            if last.continues_with(&segment) {
                last.duration_sec += segment.duration_sec;
                last.end_depth_m = segment.end_depth_m;
                return;
            }
        }
        self.segments.push(segment);
    }

    pub fn as_slice(&self) -> &[PlanSegment] {
        &self.segments
    }

    pub fn into_vec(self) -> Vec<PlanSegment> {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(kind: SegmentKind, start: u32, duration: u32, depth: f64) -> PlanSegment {
        PlanSegment {
            kind,
            start_runtime_sec: start,
            duration_sec: duration,
            start_depth_m: depth,
            end_depth_m: depth,
            cylinder: 0,
            gas: GasMix::air(),
            setpoint: None,
            rate_m_min: None,
        }
    }

    #[test]
    fn test_consecutive_steps_merge() {
        let mut log = SegmentLog::default();
        log.push(level(SegmentKind::DecoStop, 600, 60, 6.0));
        log.push(level(SegmentKind::DecoStop, 660, 60, 6.0));
        assert_eq!(log.as_slice().len(), 1);
        assert_eq!(log.as_slice()[0].duration_sec, 120);
        assert_eq!(log.as_slice()[0].end_runtime_sec(), 720);
    }

    #[test]
    fn test_transit_steps_merge_and_extend_depth() {
        let mut log = SegmentLog::default();
        let step = |start: u32, from: f64, to: f64| PlanSegment {
            start_depth_m: from,
            end_depth_m: to,
            rate_m_min: Some(18.0),
            ..level(SegmentKind::Descent, start, 10, from)
        };
        log.push(step(0, 0.0, 3.0));
        log.push(step(10, 3.0, 6.0));
        let merged = &log.as_slice()[0];
        assert_eq!(log.as_slice().len(), 1);
        assert_eq!(merged.end_depth_m, 6.0);
        assert_eq!(merged.duration_sec, 20);
    }

    #[test]
    fn test_different_depth_or_kind_starts_new_segment() {
        let mut log = SegmentLog::default();
        log.push(level(SegmentKind::DecoStop, 0, 60, 9.0));
        log.push(level(SegmentKind::DecoStop, 60, 60, 6.0));
        log.push(level(SegmentKind::SafetyStop, 120, 60, 6.0));
        log.push(level(SegmentKind::GasSwitch, 180, 0, 6.0));
        log.push(level(SegmentKind::GasSwitch, 180, 0, 6.0));
        assert_eq!(log.as_slice().len(), 5);
    }
}
