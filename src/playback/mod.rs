//! Playback state and media pipeline messaging
//!
//! The state machine owns position, duration and the buffered horizon; the
//! engine feeds it user commands and pipeline events and forwards the
//! resulting commands and notifications.

mod events;
mod machine;

pub use events::{MediaCommand, MediaEvent, Notification, Step};
pub use machine::{PlaybackState, PlaybackStateMachine, PlaybackTuning, SourceKind};
