//! Orientation fusion
//!
//! Turns device attitude samples and touch gestures into the look
//! orientation used for projection.

mod fuser;
mod types;

pub use fuser::{FusionTuning, OrientationFuser, MIN_SMOOTHING};
pub use types::{wrap_angle, Attitude, GestureDelta, Orientation, SensorSample};
