//! Playback state machine
//!
//! Reconciles user commands (play/pause/seek) with asynchronous events from
//! the media pipeline. Every input returns a [`Step`] describing the commands
//! to forward to the pipeline and the notifications to deliver. All inputs
//! are applied on the update thread; nothing here touches a clock directly,
//! callers pass `now` in.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{MediaCommand, MediaEvent, Notification, Step};
use crate::error::ViewError;

/// Slack when comparing positions against the buffered horizon
const TIME_EPSILON: f64 = 1e-3;

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No source initialized
    #[default]
    Uninitialized,
    /// Source opened, waiting for the first frame
    Loading,
    /// First frame available, not yet played
    ReadyPaused,
    Playing,
    Paused,
    /// Reached the end of the video
    Ended,
    /// Unrecoverable decode failure; terminal until re-initialized
    Failed,
}

impl PlaybackState {
    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            PlaybackState::Uninitialized => "uninitialized",
            PlaybackState::Loading => "loading",
            PlaybackState::ReadyPaused => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Failed => "failed",
        }
    }
}

/// Kind of source being shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Video,
    /// Single still frame; never plays
    Image,
}

/// Tunable playback parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackTuning {
    /// Minimum time between two progress notifications
    #[serde(rename = "progressIntervalMs", default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// After a seek, progress reports farther than this from the target are stale
    #[serde(rename = "seekSettleTolerance", default = "default_seek_settle_tolerance")]
    pub seek_settle_tolerance: f64,
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_seek_settle_tolerance() -> f64 {
    1.5
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            seek_settle_tolerance: default_seek_settle_tolerance(),
        }
    }
}

impl PlaybackTuning {
    /// Clamp values into their usable ranges
    pub fn sanitize(&mut self) {
        self.progress_interval_ms = self.progress_interval_ms.min(5_000);
        if !self.seek_settle_tolerance.is_finite() || self.seek_settle_tolerance <= 0.0 {
            self.seek_settle_tolerance = default_seek_settle_tolerance();
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Seek waiting to be confirmed by the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingSeek {
    target: f64,
    /// Target lies beyond the buffered horizon; progress is suspended
    awaiting_buffer: bool,
}

/// Playback position and state, owned by the update thread
#[derive(Debug, Clone)]
pub struct PlaybackStateMachine {
    tuning: PlaybackTuning,
    state: PlaybackState,
    source: Option<SourceKind>,
    current_time: f64,
    /// None until the pipeline reports a duration
    total_duration: Option<f64>,
    available_time: f64,
    ready_notified: bool,
    /// Buffering as reported by the pipeline
    media_buffering: bool,
    /// Last buffering flag delivered to the listener
    buffering_reported: bool,
    pending_seek: Option<PendingSeek>,
    /// Progress changed since the last notification
    progress_dirty: bool,
    last_progress_at: Option<Instant>,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new(PlaybackTuning::default())
    }
}

impl PlaybackStateMachine {
    /// Create a state machine in `Uninitialized`
    pub fn new(mut tuning: PlaybackTuning) -> Self {
        tuning.sanitize();
        Self {
            tuning,
            state: PlaybackState::Uninitialized,
            source: None,
            current_time: 0.0,
            total_duration: None,
            available_time: 0.0,
            ready_notified: false,
            media_buffering: false,
            buffering_reported: false,
            pending_seek: None,
            progress_dirty: false,
            last_progress_at: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source
    }

    /// True for every state except `Playing`
    pub fn is_paused(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    /// Current position in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Total duration in seconds (0.0 while unknown)
    pub fn total_duration(&self) -> f64 {
        self.total_duration.unwrap_or(0.0)
    }

    /// Buffered horizon in seconds
    pub fn available_time(&self) -> f64 {
        self.available_time
    }

    /// Whether playback is currently held up waiting for data
    pub fn is_buffering(&self) -> bool {
        self.buffering_visible()
    }

    /// Start a new session for a freshly opened source
    pub fn begin(&mut self, kind: SourceKind) -> Step {
        let step = self.reset();
        self.state = PlaybackState::Loading;
        self.source = Some(kind);
        tracing::debug!("Playback: loading {:?} source", kind);
        step
    }

    /// Return to `Uninitialized`, dropping all session state
    pub fn reset(&mut self) -> Step {
        let mut step = Step::new();
        let tuning = self.tuning.clone();
        let was_buffering = self.buffering_reported;
        *self = Self::new(tuning);
        if was_buffering {
            step.notify(Notification::BufferingChanged(false));
        }
        step
    }

    /// Start or resume playback, optionally seeking first
    pub fn play(&mut self, seek: Option<f64>, now: Instant) -> Result<Step, ViewError> {
        self.check_source("play()")?;
        if self.source == Some(SourceKind::Image) {
            return Err(ViewError::invalid_state("play() on a still image"));
        }

        let mut step = Step::new();
        match self.state {
            PlaybackState::Playing => {
                if let Some(target) = seek {
                    step.extend(self.apply_seek(target, now));
                }
                return Ok(step);
            }
            PlaybackState::Ended => {
                // Restart from the top unless an explicit offset was given
                step.extend(self.apply_seek(seek.unwrap_or(0.0), now));
            }
            _ => {
                if let Some(target) = seek {
                    step.extend(self.apply_seek(target, now));
                }
            }
        }

        self.transition(PlaybackState::Playing);
        step.command(MediaCommand::Play);
        Ok(step)
    }

    /// Pause playback; a no-op unless currently playing
    pub fn pause(&mut self) -> Result<Step, ViewError> {
        if self.state == PlaybackState::Uninitialized {
            return Err(ViewError::invalid_state("pause() before a source was initialized"));
        }
        let mut step = Step::new();
        if self.state == PlaybackState::Playing {
            self.transition(PlaybackState::Paused);
            step.command(MediaCommand::Pause);
        }
        Ok(step)
    }

    /// Seek to `time` seconds, clamped to the known duration
    pub fn seek_to(&mut self, time: f64, now: Instant) -> Result<Step, ViewError> {
        self.check_source("seekTo()")?;
        if self.source == Some(SourceKind::Image) {
            return Err(ViewError::invalid_state("seekTo() on a still image"));
        }
        match self.state {
            PlaybackState::Loading => Err(ViewError::invalid_state("seekTo() while the source is loading")),
            PlaybackState::Ended => {
                let step = self.apply_seek(time, now);
                self.transition(PlaybackState::Paused);
                Ok(step)
            }
            _ => Ok(self.apply_seek(time, now)),
        }
    }

    /// Apply an event from the media pipeline
    pub fn on_event(&mut self, event: MediaEvent, now: Instant) -> Step {
        let mut step = Step::new();

        if let MediaEvent::DecodeFailed(reason) = event {
            if self.state != PlaybackState::Failed {
                tracing::error!("Playback: decode failed in state {}: {}", self.state.display_name(), reason);
                self.transition(PlaybackState::Failed);
                self.pending_seek = None;
                self.media_buffering = false;
                self.update_buffering(&mut step);
                step.notify(Notification::Error(ViewError::Decode(reason)));
            }
            return step;
        }

        if matches!(self.state, PlaybackState::Uninitialized | PlaybackState::Failed) {
            tracing::debug!("Playback: ignoring {:?} in state {}", event, self.state.display_name());
            return step;
        }

        match event {
            MediaEvent::ReadyToPlay => {
                if self.state == PlaybackState::Loading {
                    self.transition(PlaybackState::ReadyPaused);
                }
                if !self.ready_notified {
                    self.ready_notified = true;
                    step.notify(Notification::ReadyToPlay);
                    self.emit_progress(&mut step, now);
                }
            }
            MediaEvent::BufferingStarted => {
                self.media_buffering = true;
                self.update_buffering(&mut step);
            }
            MediaEvent::BufferingEnded => {
                self.media_buffering = false;
                if let Some(pending) = self.pending_seek.as_mut() {
                    pending.awaiting_buffer = false;
                }
                self.update_buffering(&mut step);
            }
            MediaEvent::ProgressUpdate {
                current_time,
                available_time,
            } => self.on_progress(current_time, available_time, now, &mut step),
            MediaEvent::DurationChanged(duration) => {
                if duration.is_finite() && duration >= 0.0 {
                    self.total_duration = Some(duration);
                    self.current_time = self.current_time.min(duration);
                    self.available_time = self.available_time.min(duration);
                    self.progress_dirty = true;
                    self.maybe_emit_progress(&mut step, now);
                } else {
                    tracing::debug!("Playback: ignoring invalid duration {}", duration);
                }
            }
            MediaEvent::ReachedEnd => {
                if self.state == PlaybackState::Playing {
                    self.transition(PlaybackState::Ended);
                    if let Some(total) = self.total_duration {
                        self.current_time = total;
                        self.available_time = total;
                    }
                    self.pending_seek = None;
                    self.media_buffering = false;
                    self.update_buffering(&mut step);
                    self.emit_progress(&mut step, now);
                    step.notify(Notification::ReachedEnd);
                } else {
                    tracing::debug!("Playback: ignoring end in state {}", self.state.display_name());
                }
            }
            MediaEvent::DecodeFailed(_) => {}
        }
        step
    }

    /// Flush a progress notification held back by rate limiting
    pub fn poll(&mut self, now: Instant) -> Step {
        let mut step = Step::new();
        self.maybe_emit_progress(&mut step, now);
        step
    }

    fn check_source(&self, operation: &str) -> Result<(), ViewError> {
        match self.state {
            PlaybackState::Uninitialized => Err(ViewError::invalid_state(format!(
                "{} before a source was initialized",
                operation
            ))),
            PlaybackState::Failed => Err(ViewError::invalid_state(format!("{} after a decode failure", operation))),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            tracing::debug!("Playback: {} -> {}", self.state.display_name(), next.display_name());
            self.state = next;
        }
    }

    fn clamp_time(&self, time: f64) -> f64 {
        let upper = self.total_duration.unwrap_or(f64::INFINITY);
        if time.is_nan() {
            0.0
        } else if time == f64::INFINITY {
            self.total_duration.unwrap_or(0.0)
        } else {
            time.clamp(0.0, upper)
        }
    }

    fn apply_seek(&mut self, time: f64, now: Instant) -> Step {
        let mut step = Step::new();
        let target = self.clamp_time(time);
        let awaiting_buffer = target > self.available_time + TIME_EPSILON;
        tracing::debug!(
            "Playback: seek to {:.3}s (requested {:.3}s, buffered to {:.3}s)",
            target,
            time,
            self.available_time
        );

        self.current_time = target;
        self.pending_seek = Some(PendingSeek {
            target,
            awaiting_buffer,
        });
        step.command(MediaCommand::Seek(target));
        self.update_buffering(&mut step);
        self.emit_progress(&mut step, now);
        step
    }

    fn on_progress(&mut self, current_time: f64, available_time: f64, now: Instant, step: &mut Step) {
        if matches!(self.state, PlaybackState::Ended) {
            return;
        }
        if available_time.is_finite() {
            self.available_time = self.clamp_time(available_time);
            self.progress_dirty = true;
        }

        if let Some(mut pending) = self.pending_seek {
            if pending.awaiting_buffer {
                if self.available_time + TIME_EPSILON >= pending.target {
                    pending.awaiting_buffer = false;
                    self.pending_seek = Some(pending);
                    self.update_buffering(step);
                } else {
                    // Progress stays suspended at the seek target
                    self.maybe_emit_progress(step, now);
                    return;
                }
            }
            if !current_time.is_finite() || (current_time - pending.target).abs() > self.tuning.seek_settle_tolerance {
                tracing::trace!("Playback: discarding stale progress {:.3}s", current_time);
                self.maybe_emit_progress(step, now);
                return;
            }
            self.pending_seek = None;
            self.current_time = self.clamp_time(current_time);
        } else if current_time.is_finite() {
            let reported = self.clamp_time(current_time);
            self.current_time = if self.state == PlaybackState::Playing {
                self.current_time.max(reported)
            } else {
                reported
            };
        }

        self.progress_dirty = true;
        self.maybe_emit_progress(step, now);
    }

    fn progress_notification(&self) -> Notification {
        Notification::Progress {
            current_time: self.current_time,
            available_time: self.available_time,
            total_duration: self.total_duration(),
        }
    }

    fn emit_progress(&mut self, step: &mut Step, now: Instant) {
        step.notify(self.progress_notification());
        self.progress_dirty = false;
        self.last_progress_at = Some(now);
    }

    fn maybe_emit_progress(&mut self, step: &mut Step, now: Instant) {
        if !self.progress_dirty {
            return;
        }
        let due = match self.last_progress_at {
            Some(last) => now.saturating_duration_since(last) >= self.tuning.progress_interval(),
            None => true,
        };
        if due {
            self.emit_progress(step, now);
        }
    }

    fn buffering_visible(&self) -> bool {
        self.media_buffering || self.pending_seek.is_some_and(|p| p.awaiting_buffer)
    }

    fn update_buffering(&mut self, step: &mut Step) {
        let visible = self.buffering_visible();
        if visible != self.buffering_reported {
            self.buffering_reported = visible;
            step.notify(Notification::BufferingChanged(visible));
        }
    }
}
