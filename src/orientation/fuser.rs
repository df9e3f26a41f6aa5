//! Sensor and gesture fusion
//!
//! Combines the device attitude with the user's pan offset into a single
//! look orientation, once per tick.

use std::f32::consts::FRAC_PI_2;

use glam::Quat;
use serde::{Deserialize, Serialize};

use super::{wrap_angle, GestureDelta, Orientation, SensorSample};
use crate::config::ViewConfig;

/// Smallest usable smoothing factor; anything lower would effectively freeze the view
pub const MIN_SMOOTHING: f32 = 0.01;

/// Tunable fusion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionTuning {
    /// Fraction of the remaining sensor error closed per tick (0.01-1.0, 1.0 = unfiltered)
    #[serde(rename = "smoothing", default = "default_smoothing")]
    pub smoothing: f32,
    /// Radians of rotation per point of pan
    #[serde(rename = "panSensitivity", default = "default_pan_sensitivity")]
    pub pan_sensitivity: f32,
}

fn default_smoothing() -> f32 {
    0.35
}

fn default_pan_sensitivity() -> f32 {
    0.005
}

impl Default for FusionTuning {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            pan_sensitivity: default_pan_sensitivity(),
        }
    }
}

impl FusionTuning {
    /// Clamp values into their usable ranges
    pub fn sanitize(&mut self) {
        self.smoothing = if self.smoothing.is_finite() {
            self.smoothing.clamp(MIN_SMOOTHING, 1.0)
        } else {
            default_smoothing()
        };
        if !self.pan_sensitivity.is_finite() || self.pan_sensitivity < 0.0 {
            self.pan_sensitivity = default_pan_sensitivity();
        }
    }
}

/// Fuses sensor attitude and gesture offsets into an [`Orientation`]
#[derive(Debug, Clone)]
pub struct OrientationFuser {
    tuning: FusionTuning,
    /// Low-pass filtered sensor attitude
    filtered: Option<Quat>,
    /// Most recent raw sensor attitude
    target: Option<Quat>,
    /// Sensor yaw treated as "forward" (set by recenter)
    yaw_reference: f32,
    /// Accumulated gesture yaw offset
    gesture_yaw: f32,
    /// Accumulated gesture pitch offset
    gesture_pitch: f32,
    /// Output of the previous tick
    last: Orientation,
}

impl Default for OrientationFuser {
    fn default() -> Self {
        Self::new(FusionTuning::default())
    }
}

impl OrientationFuser {
    /// Create a fuser with the given tuning
    pub fn new(mut tuning: FusionTuning) -> Self {
        tuning.sanitize();
        Self {
            tuning,
            filtered: None,
            target: None,
            yaw_reference: 0.0,
            gesture_yaw: 0.0,
            gesture_pitch: 0.0,
            last: Orientation::default(),
        }
    }

    /// Advance one tick and return the fused orientation
    pub fn tick(
        &mut self,
        sample: Option<SensorSample>,
        gesture: GestureDelta,
        config: &ViewConfig,
    ) -> Orientation {
        let sensors_enabled = !config.sensors_disabled();
        let gestures_enabled = !config.touch_gestures_disabled();

        if !sensors_enabled && !gestures_enabled {
            return self.last;
        }

        let base = if sensors_enabled {
            self.advance_filter(sample);
            self.sensor_orientation()
        } else {
            Orientation::default()
        };

        let (yaw_offset, pitch_offset) = if gestures_enabled {
            self.apply_gesture(gesture, base.pitch);
            (self.gesture_yaw, self.gesture_pitch)
        } else {
            (0.0, 0.0)
        };

        // Pan offsets are added in Euler space: yaw turns about world +Y, not the
        // rolled view axis, so a tilted device still pans along the horizon
        self.last = Orientation::new(base.yaw + yaw_offset, base.pitch + pitch_offset, base.roll);
        self.last
    }

    fn advance_filter(&mut self, sample: Option<SensorSample>) {
        if let Some(sample) = sample {
            self.target = Some(sample.attitude.to_quat());
        }
        let Some(target) = self.target else {
            return;
        };
        self.filtered = Some(match self.filtered {
            // First reading: nothing to smooth against yet
            None => target,
            Some(filtered) => filtered.slerp(target, self.tuning.smoothing).normalize(),
        });
    }

    fn sensor_orientation(&self) -> Orientation {
        match self.filtered {
            Some(filtered) => {
                let raw = Orientation::from_quat(filtered);
                Orientation::new(raw.yaw - self.yaw_reference, raw.pitch, raw.roll)
            }
            None => Orientation::default(),
        }
    }

    fn apply_gesture(&mut self, gesture: GestureDelta, base_pitch: f32) {
        let sensitivity = self.tuning.pan_sensitivity;
        // Content follows the finger: dragging right turns the view left (+yaw),
        // dragging down tilts it up (+pitch)
        if gesture.pan_x.is_finite() {
            self.gesture_yaw = wrap_angle(self.gesture_yaw + gesture.pan_x * sensitivity);
        }
        if gesture.pan_y.is_finite() {
            self.gesture_pitch += gesture.pan_y * sensitivity;
        }
        // Keep the combined pitch within +-90 degrees so the view never flips,
        // and so dragging past the pole does not wind up a hidden offset
        self.gesture_pitch = self
            .gesture_pitch
            .clamp(-FRAC_PI_2 - base_pitch, FRAC_PI_2 - base_pitch);
    }

    /// Output of the most recent tick
    pub fn orientation(&self) -> Orientation {
        self.last
    }

    /// Current tuning
    pub fn tuning(&self) -> &FusionTuning {
        &self.tuning
    }

    /// Replace tuning (values are clamped)
    pub fn set_tuning(&mut self, mut tuning: FusionTuning) {
        tuning.sanitize();
        self.tuning = tuning;
    }

    /// Make the current device heading the forward direction and clear the pan offset
    pub fn recenter(&mut self) {
        if let Some(filtered) = self.filtered {
            self.yaw_reference = Orientation::from_quat(filtered).yaw;
        }
        self.gesture_yaw = 0.0;
        self.gesture_pitch = 0.0;
        tracing::debug!("OrientationFuser: recentered at yaw {:.3}", self.yaw_reference);
    }

    /// Forget all sensor history and offsets
    pub fn reset(&mut self) {
        self.filtered = None;
        self.target = None;
        self.yaw_reference = 0.0;
        self.gesture_yaw = 0.0;
        self.gesture_pitch = 0.0;
        self.last = Orientation::default();
    }
}
