//! Orientation value types
//!
//! Angles are radians. Euler order is YXZ: yaw about +Y, then pitch about +X,
//! then roll about +Z, matching a camera looking down -Z with +Y up.

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::time::Duration;

use glam::{EulerRot, Quat, Vec3};

/// Wrap an angle into (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// View orientation derived each tick from sensor and gesture input
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// Horizontal look angle, (-PI, PI]
    pub yaw: f32,
    /// Vertical look angle, [-PI/2, PI/2]
    pub pitch: f32,
    /// Tilt around the look axis, (-PI, PI]
    pub roll: f32,
}

impl Orientation {
    /// Create a normalized orientation
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        let pitch = if pitch.is_finite() { pitch } else { 0.0 };
        Self {
            yaw: wrap_angle(yaw),
            pitch: pitch.clamp(-FRAC_PI_2, FRAC_PI_2),
            roll: wrap_angle(roll),
        }
    }

    /// Build from a rotation quaternion
    pub fn from_quat(rotation: Quat) -> Self {
        let (yaw, pitch, roll) = rotation.normalize().to_euler(EulerRot::YXZ);
        Self::new(yaw, pitch, roll)
    }

    /// Rotation that takes the camera frame to world space
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }

    /// Unit vector the camera looks along
    pub fn look_direction(&self) -> Vec3 {
        self.to_quat() * Vec3::NEG_Z
    }
}

/// Raw device attitude as delivered by the motion provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attitude {
    /// Attitude quaternion
    Quaternion(Quat),
    /// Euler angles in radians (YXZ order)
    Euler { yaw: f32, pitch: f32, roll: f32 },
}

impl Attitude {
    /// Normalized rotation for this attitude
    pub fn to_quat(&self) -> Quat {
        match *self {
            Attitude::Quaternion(q) => {
                if q.is_finite() && q.length_squared() > f32::EPSILON {
                    q.normalize()
                } else {
                    Quat::IDENTITY
                }
            }
            Attitude::Euler { yaw, pitch, roll } => Orientation::new(yaw, pitch, roll).to_quat(),
        }
    }
}

/// A single attitude reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub attitude: Attitude,
    /// Time since the provider started
    pub timestamp: Duration,
}

impl SensorSample {
    pub fn new(attitude: Attitude, timestamp: Duration) -> Self {
        Self { attitude, timestamp }
    }
}

/// Gesture input accumulated between two ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureDelta {
    /// Horizontal pan in points (positive = finger moves right)
    pub pan_x: f32,
    /// Vertical pan in points (positive = finger moves down)
    pub pan_y: f32,
    /// Multiplicative pinch scale (1.0 = no pinch, > 1.0 = spread)
    pub pinch_scale: f32,
}

impl Default for GestureDelta {
    fn default() -> Self {
        Self::NONE
    }
}

impl GestureDelta {
    /// No gesture input
    pub const NONE: Self = Self {
        pan_x: 0.0,
        pan_y: 0.0,
        pinch_scale: 1.0,
    };

    pub fn pan(dx: f32, dy: f32) -> Self {
        Self {
            pan_x: dx,
            pan_y: dy,
            ..Self::NONE
        }
    }

    pub fn pinch(scale: f32) -> Self {
        Self {
            pinch_scale: scale,
            ..Self::NONE
        }
    }

    /// Fold another delta into this one: pans add, pinches multiply
    pub fn accumulate(&mut self, other: GestureDelta) {
        if other.pan_x.is_finite() && other.pan_y.is_finite() {
            self.pan_x += other.pan_x;
            self.pan_y += other.pan_y;
        }
        if other.pinch_scale.is_finite() && other.pinch_scale > 0.0 {
            self.pinch_scale *= other.pinch_scale;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pan_x == 0.0 && self.pan_y == 0.0 && self.pinch_scale == 1.0
    }
}
