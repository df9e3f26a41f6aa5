//! View configuration
//!
//! Flags and values the caller toggles between frames. Every setter keeps
//! the clamping invariants so the engine never sees an out-of-range fov or
//! volume.

use serde::{Deserialize, Serialize};

/// Minimum diagonal field of view in degrees
pub const MIN_FOV: f32 = 60.0;
/// Maximum diagonal field of view in degrees
pub const MAX_FOV: f32 = 120.0;
/// Default diagonal field of view in degrees
pub const DEFAULT_FOV: f32 = 90.0;

/// Clamp a diagonal fov (degrees) into the supported range.
///
/// Non-finite input falls back to [`DEFAULT_FOV`].
pub fn clamp_fov(fov: f32) -> f32 {
    if fov.is_finite() {
        fov.clamp(MIN_FOV, MAX_FOV)
    } else {
        DEFAULT_FOV
    }
}

/// Configuration for a panoramic view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// When set, pan and pinch gestures are ignored
    #[serde(rename = "touchGesturesDisabled", default)]
    touch_gestures_disabled: bool,
    /// When set, device attitude does not rotate the view
    #[serde(rename = "sensorsDisabled", default)]
    sensors_disabled: bool,
    /// Split the viewport into two halves for head-mounted viewing
    #[serde(rename = "vrModeEnabled", default)]
    vr_mode_enabled: bool,
    /// Portrait splits VR mode top/bottom, landscape splits left/right
    #[serde(rename = "orientationPortrait", default)]
    orientation_portrait: bool,
    /// Show the preview image instead of video frames
    #[serde(rename = "previewImageMode", default)]
    preview_image_mode: bool,
    /// Playback volume (0.0-1.0)
    #[serde(rename = "volume", default = "default_volume")]
    volume: f32,
    /// Keep audio audible when the device silent switch is on
    #[serde(rename = "overrideSilentSwitch", default)]
    override_silent_switch: bool,
    /// Initial diagonal fov in degrees (60-120)
    #[serde(rename = "initialFov", default = "default_fov")]
    initial_fov: f32,
}

fn default_volume() -> f32 {
    1.0
}

fn default_fov() -> f32 {
    DEFAULT_FOV
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            touch_gestures_disabled: false,
            sensors_disabled: false,
            vr_mode_enabled: false,
            orientation_portrait: false,
            preview_image_mode: false,
            volume: default_volume(),
            override_silent_switch: false,
            initial_fov: default_fov(),
        }
    }
}

impl ViewConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_gestures_disabled(&self) -> bool {
        self.touch_gestures_disabled
    }

    pub fn set_touch_gestures_disabled(&mut self, disabled: bool) {
        self.touch_gestures_disabled = disabled;
    }

    pub fn sensors_disabled(&self) -> bool {
        self.sensors_disabled
    }

    pub fn set_sensors_disabled(&mut self, disabled: bool) {
        self.sensors_disabled = disabled;
    }

    pub fn vr_mode_enabled(&self) -> bool {
        self.vr_mode_enabled
    }

    pub fn set_vr_mode_enabled(&mut self, enabled: bool) {
        self.vr_mode_enabled = enabled;
    }

    pub fn orientation_portrait(&self) -> bool {
        self.orientation_portrait
    }

    pub fn set_orientation_portrait(&mut self, portrait: bool) {
        self.orientation_portrait = portrait;
    }

    pub fn preview_image_mode(&self) -> bool {
        self.preview_image_mode
    }

    pub fn set_preview_image_mode(&mut self, enabled: bool) {
        self.preview_image_mode = enabled;
    }

    /// Get volume (always within 0.0-1.0)
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set volume, clamped to 0.0-1.0. NaN is ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            tracing::debug!("ViewConfig: ignoring NaN volume");
            return;
        }
        let clamped = volume.clamp(0.0, 1.0);
        if clamped != volume {
            tracing::debug!("ViewConfig: volume {} clamped to {}", volume, clamped);
        }
        self.volume = clamped;
    }

    pub fn override_silent_switch(&self) -> bool {
        self.override_silent_switch
    }

    pub fn set_override_silent_switch(&mut self, override_switch: bool) {
        self.override_silent_switch = override_switch;
    }

    /// Get initial fov in degrees (always within 60-120)
    pub fn initial_fov(&self) -> f32 {
        self.initial_fov
    }

    /// Set initial fov, clamped to 60-120 degrees. NaN is ignored.
    pub fn set_initial_fov(&mut self, fov: f32) {
        if fov.is_nan() {
            tracing::debug!("ViewConfig: ignoring NaN fov");
            return;
        }
        let clamped = clamp_fov(fov);
        if clamped != fov {
            tracing::debug!("ViewConfig: fov {} clamped to {}", fov, clamped);
        }
        self.initial_fov = clamped;
    }

    /// Re-apply clamping after deserialization
    pub fn sanitize(&mut self) {
        let volume = if self.volume.is_nan() { default_volume() } else { self.volume };
        self.volume = volume.clamp(0.0, 1.0);
        self.initial_fov = clamp_fov(self.initial_fov);
    }
}
