//! Oxygen toxicity: CNS clock and pulmonary OTUs.

use crate::warning::WarningKind;

/// NOAA single-exposure limits: (upper pO₂ bound in bar, minutes).
const CNS_LIMITS: [(f64, f64); 11] = [
    (0.6, 720.0),
    (0.7, 570.0),
    (0.8, 450.0),
    (0.9, 360.0),
    (1.0, 300.0),
    (1.1, 240.0),
    (1.2, 210.0),
    (1.3, 180.0),
    (1.4, 150.0),
    (1.5, 120.0),
    (1.6, 45.0),
];

/// pO₂ at or below which neither clock runs.
pub const OXYGEN_THRESHOLD: f64 = 0.5;

const OTU_EXPONENT: f64 = 0.83;

/// Single-exposure CNS limit in minutes, `None` below the threshold.
pub fn cns_limit_min(po2: f64) -> Option<f64> {
    if po2 <= OXYGEN_THRESHOLD {
        return None;
    }
    if let Some(&(_, limit)) = CNS_LIMITS.iter().find(|(bound, _)| po2 <= *bound + 1e-9) {
        return Some(limit);
    }
    // Log-linear extrapolation beyond the last band.
    let (p1, t1) = CNS_LIMITS[CNS_LIMITS.len() - 2];
    let (p2, t2) = CNS_LIMITS[CNS_LIMITS.len() - 1];
    let slope = (t2.ln() - t1.ln()) / (p2 - p1);
    Some((t2.ln() + slope * (po2 - p2)).exp())
}

/// OTUs accrued per minute at `po2`.
pub fn otu_per_min(po2: f64) -> f64 {
    if po2 <= OXYGEN_THRESHOLD {
        0.0
    } else {
        (po2 / OXYGEN_THRESHOLD).powf(OTU_EXPONENT)
    }
}

/// Running oxygen exposure. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExposureAccumulator {
    pub cns_percent: f64,
    pub otu: f64,
}

impl ExposureAccumulator {
    pub fn accumulate(&mut self, po2: f64, duration_sec: u32) {
        let minutes = duration_sec as f64 / 60.0;
        if let Some(limit) = cns_limit_min(po2) {
            self.cns_percent += 100.0 * minutes / limit;
        }
        self.otu += minutes * otu_per_min(po2);
    }
}

/// Exposure plus the excursion state used to warn once per excursion.
#[derive(Debug, Clone, Default)]
pub struct OxygenTracker {
    exposure: ExposureAccumulator,
    above_limit: bool,
    below_limit: bool,
    cns_warned: bool,
}

impl OxygenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exposure(&self) -> ExposureAccumulator {
        self.exposure
    }

    /// Charge a step breathed at `po2` and report newly started excursions.
    pub fn record(
        &mut self,
        po2: f64,
        min_po2: f64,
        max_po2: f64,
        duration_sec: u32,
    ) -> Vec<WarningKind> {
        self.exposure.accumulate(po2, duration_sec);
        let mut warnings = Vec::new();

        let high = po2 > max_po2 + 1e-9;
        if high && !self.above_limit {
            warnings.push(WarningKind::Po2High {
                po2,
                limit: max_po2,
            });
        }
        self.above_limit = high;

        let low = po2 < min_po2 - 1e-9;
        if low && !self.below_limit {
            warnings.push(WarningKind::Po2Low {
                po2,
                limit: min_po2,
            });
        }
        self.below_limit = low;

        if self.exposure.cns_percent > 100.0 && !self.cns_warned {
            self.cns_warned = true;
            warnings.push(WarningKind::CnsExceeded {
                cns_percent: self.exposure.cns_percent,
            });
        }
        warnings
    }
}
