//! Media and render collaborators
//!
//! Decoding, texture upload, license checks and drawing live outside this
//! crate. The engine talks to them only through the traits defined here.

use std::path::PathBuf;
use std::time::Duration;

use image::RgbaImage;

use crate::error::ViewError;
use crate::handoff::MediaEventSender;
use crate::playback::MediaCommand;
use crate::projection::ProjectionResult;

/// Location of a video, image or license
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Remote or bundled resource, e.g. `https://...` or `asset://...`
    Url(String),
    /// Local file
    File(PathBuf),
}

impl MediaSource {
    pub fn url(url: impl Into<String>) -> Self {
        MediaSource::Url(url.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        MediaSource::File(path.into())
    }

    /// Reject sources that cannot possibly be opened
    pub fn validate(&self, what: &str) -> Result<(), ViewError> {
        match self {
            MediaSource::Url(url) => {
                let url = url.trim();
                match url.split_once("://") {
                    Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok(()),
                    _ => Err(ViewError::Initialization(format!("{} URL is not valid: {:?}", what, url))),
                }
            }
            MediaSource::File(path) => {
                if path.as_os_str().is_empty() {
                    Err(ViewError::Initialization(format!("{} path is empty", what)))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::Url(url) => write!(f, "{}", url),
            MediaSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// License file location; validation belongs to the pipeline
pub type LicenseSource = MediaSource;

/// Still image to show
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Image loaded by the pipeline
    Location(MediaSource),
    /// Already decoded equirectangular pixels
    Pixels(RgbaImage),
}

impl ImageSource {
    pub fn validate(&self) -> Result<(), ViewError> {
        match self {
            ImageSource::Location(source) => source.validate("Image"),
            ImageSource::Pixels(image) => {
                if image.width() == 0 || image.height() == 0 {
                    Err(ViewError::Initialization("Image has no pixels".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Everything the pipeline needs to open a video
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub video: MediaSource,
    pub preview: Option<MediaSource>,
    pub license: LicenseSource,
    /// Show the preview image instead of video frames
    pub preview_image_mode: bool,
    pub volume: f32,
    pub override_silent_switch: bool,
}

/// Everything the pipeline needs to show a still image
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub image: ImageSource,
    pub license: LicenseSource,
}

/// Decoder and texture source
///
/// `open_*` must return promptly; readiness, progress and failures arrive
/// later through the given [`MediaEventSender`].
pub trait MediaPipeline: Send {
    fn open_video(&mut self, request: &VideoRequest, events: MediaEventSender) -> Result<(), ViewError>;

    fn open_image(&mut self, request: &ImageRequest, events: MediaEventSender) -> Result<(), ViewError>;

    /// Apply a transport command
    fn apply(&mut self, command: MediaCommand);

    fn set_volume(&mut self, _volume: f32, _override_silent_switch: bool) {}

    fn set_preview_mode(&mut self, _enabled: bool) {}

    /// Stop decoding and release the source. No events may be sent afterwards.
    fn close(&mut self);
}

/// Where finished projections go
pub trait RenderSink: Send {
    /// Draw the current frame with the given projection(s)
    fn present(&mut self, projection: &ProjectionResult);

    /// Return the next completed frame, waiting at most `timeout`
    fn capture_frame(&mut self, timeout: Duration) -> Option<RgbaImage>;
}

/// Brighten a frame toward white.
///
/// `strength` is 0-100; 0 leaves the frame untouched, 100 is pure white.
/// Alpha is preserved.
pub fn apply_flash(mut frame: RgbaImage, strength: u8) -> RgbaImage {
    let strength = strength.min(100) as u32;
    if strength == 0 {
        return frame;
    }
    for pixel in frame.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            let c = *channel as u32;
            *channel = (c + ((255 - c) * strength + 50) / 100).min(255) as u8;
        }
    }
    frame
}
