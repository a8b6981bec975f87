use std::fmt;

/// Non-fatal conditions found while planning.
#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    /// pO₂ above the limit for the phase (bar).
    Po2High { po2: f64, limit: f64 },
    /// pO₂ below the hypoxic limit (bar).
    Po2Low { po2: f64, limit: f64 },
    CnsExceeded { cns_percent: f64 },
    /// The plan needs more gas than the cylinder holds (litres).
    InsufficientGas { required_l: f64, available_l: f64 },
    /// Gas left at the start of the ascent does not cover the minimum gas.
    InsufficientReserve { reserve_l: f64, remaining_l: f64 },
    TooManyGasMixes { requested: usize, supported: usize },
    /// The waypoint gas is outside the bottom pO₂ limits at the waypoint depth.
    GasUnbreathable { po2: f64 },
    /// A user-planned ascent went above the decompression ceiling.
    CeilingViolated { ceiling_m: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub runtime_sec: u32,
    pub depth_m: f64,
    pub cylinder: Option<usize>,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Po2High { po2, limit } => {
                write!(f, "high pO2 {po2:.2} bar exceeds {limit:.2} bar")
            }
            WarningKind::Po2Low { po2, limit } => {
                write!(f, "low pO2 {po2:.2} bar below {limit:.2} bar")
            }
            WarningKind::CnsExceeded { cns_percent } => {
                write!(f, "CNS exposure {cns_percent:.0}% exceeds 100%")
            }
            WarningKind::InsufficientGas {
                required_l,
                available_l,
            } => write!(
                f,
                "not enough gas: {required_l:.0} l required, {available_l:.0} l available"
            ),
            WarningKind::InsufficientReserve {
                reserve_l,
                remaining_l,
            } => write!(
                f,
                "minimum gas {reserve_l:.0} l not met, {remaining_l:.0} l left at ascent"
            ),
            WarningKind::TooManyGasMixes {
                requested,
                supported,
            } => write!(
                f,
                "{requested} gas mixes supplied, only the first {supported} are used for switching"
            ),
            WarningKind::GasUnbreathable { po2 } => {
                write!(f, "gas is not breathable at this depth (pO2 {po2:.2} bar)")
            }
            WarningKind::CeilingViolated { ceiling_m } => {
                write!(f, "planned ascent violates ceiling at {ceiling_m:.1} m")
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02} at {:.0} m: {}",
            self.runtime_sec / 60,
            self.runtime_sec % 60,
            self.depth_m,
            self.kind
        )?;
        if let Some(cylinder) = self.cylinder {
            write!(f, " (cylinder {})", cylinder)?;
        }
        Ok(())
    }
}
