//! Settings management for the panorama engine
//!
//! Handles loading/saving of engine settings as XML, either from an explicit
//! path or from the per-user config directory.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ViewConfig;
use crate::orientation::FusionTuning;
use crate::playback::PlaybackTuning;
use crate::projection::{DEFAULT_FAR, DEFAULT_NEAR};

/// Engine settings stored in `settings.xml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "PanoramaSettings")]
pub struct EngineSettings {
    /// Initial view configuration
    #[serde(rename = "view", default)]
    pub view: ViewConfig,

    /// Sensor smoothing and gesture sensitivity
    #[serde(rename = "fusion", default)]
    pub fusion: FusionTuning,

    /// Progress rate limiting and seek handling
    #[serde(rename = "playback", default)]
    pub playback: PlaybackTuning,

    /// Display refresh rate (24-240); bounds the snapshot wait
    #[serde(rename = "targetFps", default = "default_target_fps")]
    pub target_fps: u32,

    /// Near clipping plane
    #[serde(rename = "nearPlane", default = "default_near_plane")]
    pub near_plane: f32,

    /// Far clipping plane
    #[serde(rename = "farPlane", default = "default_far_plane")]
    pub far_plane: f32,
}

fn default_target_fps() -> u32 {
    60
}

fn default_near_plane() -> f32 {
    DEFAULT_NEAR
}

fn default_far_plane() -> f32 {
    DEFAULT_FAR
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            fusion: FusionTuning::default(),
            playback: PlaybackTuning::default(),
            target_fps: default_target_fps(),
            near_plane: default_near_plane(),
            far_plane: default_far_plane(),
        }
    }
}

impl EngineSettings {
    /// Clamp every value into its valid range
    pub fn sanitize(&mut self) {
        self.view.sanitize();
        self.fusion.sanitize();
        self.playback.sanitize();
        self.target_fps = self.target_fps.clamp(24, 240);
    }

    /// Duration of one display frame at the target rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.clamp(24, 240) as f64)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: EngineSettings = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(SettingsError::Io)?;
            }
        }
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings path in the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("panorama-view");
            p.push("settings.xml");
            p
        })
    }

    /// Load from the config directory, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load settings from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the config directory
    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = Self::default_path() else {
            return Err(SettingsError::NoConfigDir);
        };
        self.save_to_file(&path)
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for SettingsError {}
