//! Messages exchanged with the media collaborator and the listener

use crate::error::ViewError;

/// Event reported by the media pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// First frame decoded; the source can be played
    ReadyToPlay,
    /// Playback stalled waiting for data
    BufferingStarted,
    /// Enough data buffered to continue
    BufferingEnded,
    /// Decoder position and buffered horizon, seconds
    ProgressUpdate { current_time: f64, available_time: f64 },
    /// Total duration became known or changed, seconds
    DurationChanged(f64),
    /// Decoder consumed the last frame
    ReachedEnd,
    /// Unrecoverable decode failure
    DecodeFailed(String),
}

impl MediaEvent {
    /// Progress updates are coalesced; everything else is delivered in order
    pub fn is_progress(&self) -> bool {
        matches!(self, MediaEvent::ProgressUpdate { .. })
    }
}

/// Instruction for the media pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCommand {
    Play,
    Pause,
    /// Seek to a position in seconds (already clamped)
    Seek(f64),
}

/// Notification for the registered listener
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ReadyToPlay,
    ReachedEnd,
    Progress {
        current_time: f64,
        available_time: f64,
        total_duration: f64,
    },
    BufferingChanged(bool),
    Error(ViewError),
}

/// Side effects produced by a single state machine input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub commands: Vec<MediaCommand>,
    pub notifications: Vec<Notification>,
}

impl Step {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command(&mut self, command: MediaCommand) {
        self.commands.push(command);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.notifications.is_empty()
    }

    /// Append another step's effects after this one's
    pub fn extend(&mut self, other: Step) {
        self.commands.extend(other.commands);
        self.notifications.extend(other.notifications);
    }
}
