//! Listener callbacks
//!
//! Every callback is optional; the default implementations do nothing.
//! Callbacks run on the update thread, from inside engine calls.

use crate::error::ViewError;
use crate::playback::Notification;

/// Receives playback notifications from a [`ViewEngine`](crate::ViewEngine)
pub trait ViewListener: Send {
    /// The video played through to its end
    fn video_did_reach_end(&mut self) {}

    /// The source is ready to be played
    fn ready_to_play_video(&mut self) {}

    /// Position, buffered horizon or duration changed (seconds)
    fn did_update_progress(&mut self, _current_time: f64, _available_time: f64, _total_duration: f64) {}

    /// Playback started or stopped waiting for data
    fn did_change_buffering_status(&mut self, _buffering: bool) {}

    /// An operation was rejected or the decoder failed
    fn did_fail(&mut self, _error: &ViewError) {}
}

/// Route a notification to the matching callback
pub(crate) fn dispatch(listener: &mut dyn ViewListener, notification: &Notification) {
    match notification {
        Notification::ReadyToPlay => listener.ready_to_play_video(),
        Notification::ReachedEnd => listener.video_did_reach_end(),
        Notification::Progress {
            current_time,
            available_time,
            total_duration,
        } => listener.did_update_progress(*current_time, *available_time, *total_duration),
        Notification::BufferingChanged(buffering) => listener.did_change_buffering_status(*buffering),
        Notification::Error(error) => listener.did_fail(error),
    }
}
