use thiserror::Error;

/// Result alias used throughout the planner.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Error type for plan configuration and computation.
///
/// Configuration variants are raised before scheduling starts. `ExcessiveTime`
/// and `Cancelled` abort a running plan; the partial plan is discarded.
#[derive(Error, Debug, Clone, PartialEq, uniffi::Error)]
#[uniffi(flat_error)]
pub enum PlanError {
    #[error("invalid gas mix: O2 {o2:.4}, He {he:.4}")]
    InvalidGasMix { o2: f64, he: f64 },

    #[error("gas name parse error at position {position}: {message}")]
    GasNameParse { position: usize, message: String },

    #[error("cylinder {0} not found")]
    GasNotFound(usize),

    #[error("invalid cylinder {index}: {reason}")]
    InvalidCylinder { index: usize, reason: String },

    #[error("no waypoints supplied")]
    EmptyProfile,

    #[error("waypoint {index} has non-positive duration")]
    InvalidDuration { index: usize },

    #[error("waypoint {index} has invalid depth {depth_m} m")]
    InvalidDepth { index: usize, depth_m: f64 },

    #[error("waypoint {index} has invalid setpoint {setpoint_bar} bar")]
    InvalidSetpoint { index: usize, setpoint_bar: f64 },

    #[error("waypoint {index} breathes cylinder {cylinder} on the wrong circuit: {reason}")]
    CircuitMismatch {
        index: usize,
        cylinder: usize,
        reason: String,
    },

    #[error("tissue step duration must be positive")]
    ZeroStep,

    #[error("ambient pressure {ambient_bar:.3} bar is below surface pressure {surface_bar:.3} bar")]
    AmbientBelowSurface { ambient_bar: f64, surface_bar: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("decompression calculation aborted due to excessive time ({reason})")]
    ExcessiveTime { reason: String },

    #[error("plan computation cancelled")]
    Cancelled,

    #[error("plan has no segments")]
    EmptyPlan,
}

impl PlanError {
    /// True for the errors that stop a plan after scheduling started.
    pub fn is_abort(&self) -> bool {
        matches!(self, PlanError::ExcessiveTime { .. } | PlanError::Cancelled)
    }
}
