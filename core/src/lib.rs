pub mod buhlmann;
pub mod ceiling;
pub mod config;
pub mod consumption;
pub mod error;
pub mod ffi;
pub mod gas;
pub mod logging;
pub mod oxygen;
pub mod pressure;
pub mod render;
pub mod schedule;
pub mod warning;

uniffi::setup_scaffolding!();

pub use buhlmann::{TissueState, NUM_COMPARTMENTS};
pub use ceiling::{Ceiling, CeilingStrategy, GradientFactors, PassVerdict, VpmB};
pub use config::{ModelConfig, PlannerConfig};
pub use consumption::CylinderUsage;
pub use error::{PlanError, Result};
pub use gas::{Breathing, Cylinder, CylinderUse, GasMix, GasRegistry};
pub use oxygen::ExposureAccumulator;
pub use pressure::Environment;
pub use render::{render, RenderedPlan};
pub use schedule::{
    CancelToken, DivePlan, Phase, PlanSegment, Planner, ProfileSample, SegmentKind, Waypoint,
};
pub use warning::{Warning, WarningKind};
