//! Panorama View
//!
//! Orientation-driven 360° projection and playback-state engine. Fuses
//! device attitude and touch gestures into a view orientation, plans the
//! mono or split-screen (VR) projection for each frame, and reconciles
//! play/pause/seek commands with events from an external media pipeline.

pub mod config;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod listener;
pub mod media;
pub mod orientation;
pub mod playback;
pub mod projection;
pub mod sensors;
pub mod settings;
pub mod sim;
pub mod telemetry;

pub use config::{clamp_fov, ViewConfig, DEFAULT_FOV, MAX_FOV, MIN_FOV};
pub use engine::ViewEngine;
pub use error::ViewError;
pub use handoff::{GestureInput, MediaEventSender, MediaMailbox};
pub use listener::ViewListener;
pub use media::{ImageSource, LicenseSource, MediaPipeline, MediaSource, RenderSink};
pub use orientation::{Attitude, GestureDelta, Orientation, OrientationFuser, SensorSample};
pub use playback::{MediaCommand, MediaEvent, PlaybackState, PlaybackStateMachine};
pub use projection::{EyeProjection, ProjectionPlanner, ProjectionResult, SplitAxis, Viewport};
pub use sensors::{MotionProvider, SamplePublisher, SensorHub, SensorSubscription};
pub use settings::EngineSettings;
