//! Heating control: mode, targets, target policy and the valve itself.

pub mod mode;
pub mod policy;
pub mod radiator;
pub mod targets;
pub mod valve;

pub use mode::{Mode, ModeState};
pub use policy::{PolicyInputs, compute_target_temp};
pub use radiator::{RadiatorEnv, RadiatorValve};
pub use targets::TempControl;
pub use valve::{ValveInputs, ValveState, compute_required_percent_open};
