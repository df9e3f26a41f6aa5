//! Simulated collaborators
//!
//! Stand-ins for the platform decoder, motion driver and renderer so the
//! engine can run headless in the demo binary and in tests. Each one runs
//! on its own background thread and hands off through the same types a
//! real implementation would.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use rand::Rng;

use crate::error::ViewError;
use crate::handoff::MediaEventSender;
use crate::media::{ImageRequest, MediaPipeline, RenderSink, VideoRequest};
use crate::orientation::{Attitude, SensorSample};
use crate::playback::{MediaCommand, MediaEvent};
use crate::projection::ProjectionResult;
use crate::sensors::{MotionProvider, SamplePublisher, SensorError};

/// Shared state between the decode thread and the pipeline handle
struct DecodeState {
    running: AtomicBool,
    playing: AtomicBool,
    /// Seek requested by the update thread, picked up by the decode thread
    seek_request: Mutex<Option<f64>>,
}

impl DecodeState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            seek_request: Mutex::new(None),
        }
    }
}

/// Timing of a simulated video
#[derive(Debug, Clone)]
pub struct SimulatedVideo {
    /// Total length in seconds
    pub duration: f64,
    /// Delay before the first frame is "decoded"
    pub open_latency: Duration,
    /// How far ahead of the position the buffer runs, in seconds
    pub buffer_ahead: f64,
    /// Stall time when seeking outside the buffer
    pub seek_stall: Duration,
    /// Progress report interval
    pub frame_interval: Duration,
}

impl Default for SimulatedVideo {
    fn default() -> Self {
        Self {
            duration: 10.0,
            open_latency: Duration::from_millis(200),
            buffer_ahead: 4.0,
            seek_stall: Duration::from_millis(150),
            frame_interval: Duration::from_millis(33),
        }
    }
}

/// Media pipeline that fakes decoding on a background thread
pub struct SimulatedPipeline {
    video: SimulatedVideo,
    state: Option<Arc<DecodeState>>,
    thread_handle: Option<JoinHandle<()>>,
    volume: f32,
}

impl SimulatedPipeline {
    pub fn new(video: SimulatedVideo) -> Self {
        Self {
            video,
            state: None,
            thread_handle: None,
            volume: 1.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn decode_loop(state: Arc<DecodeState>, events: MediaEventSender, video: SimulatedVideo) {
        thread::sleep(video.open_latency);
        events.send(MediaEvent::DurationChanged(video.duration));
        events.send(MediaEvent::ReadyToPlay);

        let mut position = 0.0_f64;
        let mut buffered = video.buffer_ahead.min(video.duration);
        let mut last_step = Instant::now();

        while state.running.load(Ordering::Acquire) && events.is_open() {
            let seek = state.seek_request.lock().take();
            if let Some(target) = seek {
                if target > buffered {
                    events.send(MediaEvent::BufferingStarted);
                    thread::sleep(video.seek_stall);
                    buffered = (target + video.buffer_ahead).min(video.duration);
                    events.send(MediaEvent::BufferingEnded);
                }
                position = target;
                events.send(MediaEvent::ProgressUpdate {
                    current_time: position,
                    available_time: buffered,
                });
                last_step = Instant::now();
            }

            if state.playing.load(Ordering::Acquire) {
                let now = Instant::now();
                position = (position + now.duration_since(last_step).as_secs_f64()).min(video.duration);
                last_step = now;
                buffered = (position + video.buffer_ahead).min(video.duration).max(buffered);
                events.send(MediaEvent::ProgressUpdate {
                    current_time: position,
                    available_time: buffered,
                });
                if position >= video.duration {
                    state.playing.store(false, Ordering::Release);
                    events.send(MediaEvent::ReachedEnd);
                }
            } else {
                last_step = Instant::now();
            }

            thread::sleep(video.frame_interval);
        }

        tracing::debug!("SimulatedPipeline decode thread stopped");
    }

    fn stop_thread(&mut self) {
        if let Some(state) = self.state.take() {
            state.running.store(false, Ordering::Release);
        }
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!("Failed to join decode thread: {:?}", e);
            }
        }
    }
}

impl MediaPipeline for SimulatedPipeline {
    fn open_video(&mut self, request: &VideoRequest, events: MediaEventSender) -> Result<(), ViewError> {
        self.stop_thread();
        self.volume = request.volume;

        let state = Arc::new(DecodeState::new());
        let state_clone = Arc::clone(&state);
        let video = self.video.clone();
        let handle = thread::Builder::new()
            .name("sim-decode".into())
            .spawn(move || Self::decode_loop(state_clone, events, video))
            .map_err(|e| ViewError::Initialization(format!("Failed to start decode thread: {}", e)))?;

        tracing::info!("SimulatedPipeline: opened {} ({:.1}s)", request.video, self.video.duration);
        self.state = Some(state);
        self.thread_handle = Some(handle);
        Ok(())
    }

    fn open_image(&mut self, _request: &ImageRequest, events: MediaEventSender) -> Result<(), ViewError> {
        self.stop_thread();
        // A still image is ready as soon as it is decoded
        events.send(MediaEvent::ReadyToPlay);
        Ok(())
    }

    fn apply(&mut self, command: MediaCommand) {
        let Some(state) = &self.state else {
            return;
        };
        match command {
            MediaCommand::Play => state.playing.store(true, Ordering::Release),
            MediaCommand::Pause => state.playing.store(false, Ordering::Release),
            MediaCommand::Seek(target) => *state.seek_request.lock() = Some(target),
        }
    }

    fn set_volume(&mut self, volume: f32, _override_silent_switch: bool) {
        self.volume = volume;
    }

    fn close(&mut self) {
        self.stop_thread();
    }
}

impl Drop for SimulatedPipeline {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

/// Motion provider that slowly sweeps the heading with random jitter
pub struct SyntheticMotion {
    /// Full turns per minute
    sweep_rpm: f32,
    /// Jitter amplitude in radians
    jitter: f32,
    rate: Duration,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticMotion {
    pub fn new(sweep_rpm: f32, jitter: f32, rate: Duration) -> Self {
        Self {
            sweep_rpm,
            jitter: jitter.abs(),
            rate,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    fn sample_loop(running: Arc<AtomicBool>, publisher: SamplePublisher, sweep_rpm: f32, jitter: f32, rate: Duration) {
        let mut rng = rand::rng();
        let started = Instant::now();

        while running.load(Ordering::Acquire) {
            let elapsed = started.elapsed();
            let turns = elapsed.as_secs_f32() * sweep_rpm / 60.0;
            let mut noise = || if jitter > 0.0 { rng.random_range(-jitter..jitter) } else { 0.0 };
            let yaw = turns * TAU + noise();
            let pitch = 0.2 * (turns * TAU).sin() + noise();
            publisher.publish(SensorSample::new(Attitude::Euler { yaw, pitch, roll: 0.0 }, elapsed));
            thread::sleep(rate);
        }
    }
}

impl MotionProvider for SyntheticMotion {
    fn start(&mut self, publisher: SamplePublisher) -> Result<(), SensorError> {
        self.stop();
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let (sweep_rpm, jitter, rate) = (self.sweep_rpm, self.jitter, self.rate);
        let handle = thread::Builder::new()
            .name("sim-motion".into())
            .spawn(move || Self::sample_loop(running, publisher, sweep_rpm, jitter, rate))
            .map_err(|e| SensorError::Unavailable(e.to_string()))?;
        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!("Failed to join motion thread: {:?}", e);
            }
        }
    }
}

impl Drop for SyntheticMotion {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Render sink that renders nothing; it counts frames and fabricates a
/// gradient image for snapshots
pub struct RecordingSink {
    width: u32,
    height: u32,
    presented: Arc<Mutex<u64>>,
    last: Option<ProjectionResult>,
}

impl RecordingSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            presented: Arc::new(Mutex::new(0)),
            last: None,
        }
    }

    /// Shared counter of presented frames
    pub fn frame_counter(&self) -> Arc<Mutex<u64>> {
        Arc::clone(&self.presented)
    }

    pub fn last_projection(&self) -> Option<&ProjectionResult> {
        self.last.as_ref()
    }
}

impl RenderSink for RecordingSink {
    fn present(&mut self, projection: &ProjectionResult) {
        *self.presented.lock() += 1;
        self.last = Some(*projection);
    }

    fn capture_frame(&mut self, _timeout: Duration) -> Option<RgbaImage> {
        // Nothing presented yet means no completed frame
        let projection = self.last.as_ref()?;
        let yaw_shift = projection
            .eyes()
            .first()
            .map(|eye| ((eye.look_dir.x + 1.0) * 127.5) as u8)
            .unwrap_or(0);
        Some(RgbaImage::from_fn(self.width, self.height, |x, y| {
            let r = ((x * 255) / self.width.max(1)) as u8;
            let g = ((y * 255) / self.height.max(1)) as u8;
            Rgba([r, g, yaw_shift, 255])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::MediaMailbox;
    use crate::media::MediaSource;
    use crate::orientation::Orientation;
    use crate::projection::{ProjectionPlanner, Viewport};
    use crate::sensors::SensorHub;

    fn fast_video() -> SimulatedVideo {
        SimulatedVideo {
            duration: 0.3,
            open_latency: Duration::from_millis(5),
            buffer_ahead: 0.1,
            seek_stall: Duration::from_millis(5),
            frame_interval: Duration::from_millis(5),
        }
    }

    fn request() -> VideoRequest {
        VideoRequest {
            video: MediaSource::url("sim://clip"),
            preview: None,
            license: MediaSource::file("/dev/null"),
            preview_image_mode: false,
            volume: 0.7,
            override_silent_switch: false,
        }
    }

    fn wait_for(mailbox: &MediaMailbox, seen: &mut Vec<MediaEvent>, pred: impl Fn(&MediaEvent) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let events = mailbox.drain();
            let found = events.iter().any(&pred);
            seen.extend(events);
            if found {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_simulated_video_plays_to_end() {
        let mailbox = MediaMailbox::new();
        let mut pipeline = SimulatedPipeline::new(fast_video());
        pipeline.open_video(&request(), mailbox.sender()).unwrap();
        assert_eq!(pipeline.volume(), 0.7);

        let mut seen = Vec::new();
        assert!(wait_for(&mailbox, &mut seen, |e| *e == MediaEvent::ReadyToPlay));
        assert!(seen.contains(&MediaEvent::DurationChanged(0.3)));

        pipeline.apply(MediaCommand::Play);
        assert!(wait_for(&mailbox, &mut seen, |e| *e == MediaEvent::ReachedEnd));
        pipeline.close();
    }

    #[test]
    fn test_seek_past_buffer_reports_buffering() {
        let mailbox = MediaMailbox::new();
        let mut pipeline = SimulatedPipeline::new(fast_video());
        pipeline.open_video(&request(), mailbox.sender()).unwrap();

        let mut seen = Vec::new();
        assert!(wait_for(&mailbox, &mut seen, |e| *e == MediaEvent::ReadyToPlay));
        pipeline.apply(MediaCommand::Seek(0.25));
        assert!(wait_for(&mailbox, &mut seen, |e| *e == MediaEvent::BufferingEnded));
        assert!(seen.contains(&MediaEvent::BufferingStarted));
    }

    #[test]
    fn test_closed_mailbox_stops_decode_thread() {
        let mailbox = MediaMailbox::new();
        let mut pipeline = SimulatedPipeline::new(fast_video());
        pipeline.open_video(&request(), mailbox.sender()).unwrap();
        mailbox.close();
        // Joins the thread; must not hang
        drop(pipeline);
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn test_synthetic_motion_delivers_samples() {
        let hub = SensorHub::new(Box::new(SyntheticMotion::new(6.0, 0.01, Duration::from_millis(2))));
        let subscription = hub.subscribe();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut sample = None;
        while sample.is_none() && Instant::now() < deadline {
            sample = subscription.take_latest();
            thread::sleep(Duration::from_millis(2));
        }
        assert!(sample.is_some());
        drop(subscription);
        assert!(!hub.is_active());
    }

    #[test]
    fn test_recording_sink_needs_a_frame() {
        let mut sink = RecordingSink::new(8, 4);
        assert!(sink.capture_frame(Duration::from_millis(16)).is_none());

        let projection = ProjectionPlanner::default().project(Orientation::default(), 90.0, false, false, Viewport::new(8, 4));
        sink.present(&projection);
        let frame = sink.capture_frame(Duration::from_millis(16)).unwrap();
        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(*sink.frame_counter().lock(), 1);
        assert!(sink.last_projection().is_some());
    }
}
