//! View engine
//!
//! Owns the view configuration and every per-view component, and is driven
//! by a single update thread: `tick()` once per display frame, plus the
//! transport and configuration calls. Producer threads (sensors, input,
//! media) only ever talk to it through the hand-off types in
//! [`handoff`](crate::handoff).

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::config::{clamp_fov, ViewConfig};
use crate::error::ViewError;
use crate::handoff::{GestureInput, MediaMailbox};
use crate::listener::{dispatch, ViewListener};
use crate::media::{apply_flash, ImageRequest, ImageSource, LicenseSource, MediaPipeline, MediaSource, RenderSink, VideoRequest};
use crate::orientation::{FusionTuning, Orientation, OrientationFuser};
use crate::playback::{Notification, PlaybackState, PlaybackStateMachine, SourceKind, Step};
use crate::projection::{ProjectionPlanner, ProjectionResult, Viewport};
use crate::sensors::{SensorHub, SensorSubscription};
use crate::settings::EngineSettings;
use crate::telemetry::{TickProfiler, TickStats};

/// 360° view of a video or still image
pub struct ViewEngine {
    config: ViewConfig,
    settings: EngineSettings,
    fuser: OrientationFuser,
    planner: ProjectionPlanner,
    playback: PlaybackStateMachine,
    pipeline: Box<dyn MediaPipeline>,
    sink: Box<dyn RenderSink>,
    listener: Option<Box<dyn ViewListener>>,
    sensor_hub: Option<Arc<SensorHub>>,
    sensors: Option<SensorSubscription>,
    gestures: GestureInput,
    /// Event mailbox of the open session, if any
    mailbox: Option<Arc<MediaMailbox>>,
    /// Current diagonal fov in degrees
    fov: f32,
    profiler: TickProfiler,
}

impl ViewEngine {
    /// Create an engine with no source and no sensors
    pub fn new(pipeline: Box<dyn MediaPipeline>, sink: Box<dyn RenderSink>, mut settings: EngineSettings) -> Self {
        settings.sanitize();
        let config = settings.view.clone();
        let fov = config.initial_fov();

        Self {
            fuser: OrientationFuser::new(settings.fusion.clone()),
            planner: ProjectionPlanner::new(settings.near_plane, settings.far_plane),
            playback: PlaybackStateMachine::new(settings.playback.clone()),
            profiler: TickProfiler::new(settings.frame_interval()),
            config,
            settings,
            pipeline,
            sink,
            listener: None,
            sensor_hub: None,
            sensors: None,
            gestures: GestureInput::new(),
            mailbox: None,
            fov,
        }
    }

    /// Attach the process-wide sensor hub; subscribes unless sensors are disabled
    pub fn with_sensor_hub(mut self, hub: Arc<SensorHub>) -> Self {
        self.sensor_hub = Some(hub);
        self.sync_sensors();
        self
    }

    // ---- sources ----

    /// Open a video. Any previous source is torn down first.
    pub fn init_video(
        &mut self,
        video: MediaSource,
        preview: Option<MediaSource>,
        license: LicenseSource,
    ) -> Result<(), ViewError> {
        self.close_session();

        let validated = video
            .validate("Video")
            .and_then(|_| preview.as_ref().map_or(Ok(()), |p| p.validate("Preview")))
            .and_then(|_| license.validate("License"));
        if let Err(e) = validated {
            return self.fail(e);
        }

        let request = VideoRequest {
            video,
            preview,
            license,
            preview_image_mode: self.config.preview_image_mode(),
            volume: self.config.volume(),
            override_silent_switch: self.config.override_silent_switch(),
        };
        tracing::info!("ViewEngine: opening video {}", request.video);

        let mailbox = MediaMailbox::new();
        let step = self.playback.begin(SourceKind::Video);
        self.apply_step(step);
        match self.pipeline.open_video(&request, mailbox.sender()) {
            Ok(()) => self.open_session(mailbox),
            Err(e) => self.abort_open(&mailbox, e),
        }
    }

    /// Show a still image. Any previous source is torn down first.
    pub fn init_image(&mut self, image: ImageSource, license: LicenseSource) -> Result<(), ViewError> {
        self.close_session();

        if let Err(e) = image.validate().and_then(|_| license.validate("License")) {
            return self.fail(e);
        }

        let request = ImageRequest { image, license };
        match &request.image {
            ImageSource::Location(source) => tracing::info!("ViewEngine: opening image {}", source),
            ImageSource::Pixels(pixels) => {
                tracing::info!("ViewEngine: opening {}x{} image", pixels.width(), pixels.height())
            }
        }

        let mailbox = MediaMailbox::new();
        let step = self.playback.begin(SourceKind::Image);
        self.apply_step(step);
        match self.pipeline.open_image(&request, mailbox.sender()) {
            Ok(()) => self.open_session(mailbox),
            Err(e) => self.abort_open(&mailbox, e),
        }
    }

    fn open_session(&mut self, mailbox: Arc<MediaMailbox>) -> Result<(), ViewError> {
        self.mailbox = Some(mailbox);
        self.sync_sensors();
        Ok(())
    }

    fn abort_open(&mut self, mailbox: &MediaMailbox, error: ViewError) -> Result<(), ViewError> {
        mailbox.close();
        self.pipeline.close();
        let step = self.playback.reset();
        self.apply_step(step);
        self.fail(error)
    }

    /// Close the current source, if any, and drop its pending events
    fn close_session(&mut self) {
        if let Some(mailbox) = self.mailbox.take() {
            mailbox.close();
            self.pipeline.close();
            if mailbox.dropped_count() > 0 {
                tracing::warn!("ViewEngine: session dropped {} media events", mailbox.dropped_count());
            }
            tracing::info!("ViewEngine: source closed");
        }
        let step = self.playback.reset();
        self.apply_step(step);
    }

    /// Release the source and the sensor subscription
    pub fn teardown(&mut self) {
        self.close_session();
        self.sensors = None;
    }

    // ---- transport ----

    /// Start or resume playback; after the end, restarts from the beginning
    pub fn play(&mut self) -> Result<(), ViewError> {
        let result = self.playback.play(None, Instant::now());
        self.run(result)
    }

    /// Seek to `time` seconds and play
    pub fn play_from(&mut self, time: f64) -> Result<(), ViewError> {
        let result = self.playback.play(Some(time), Instant::now());
        self.run(result)
    }

    pub fn pause(&mut self) -> Result<(), ViewError> {
        let result = self.playback.pause();
        self.run(result)
    }

    /// True unless the video is playing
    pub fn is_paused(&self) -> bool {
        self.playback.is_paused()
    }

    /// Seek to `time` seconds, clamped to the known duration
    pub fn seek_to(&mut self, time: f64) -> Result<(), ViewError> {
        let result = self.playback.seek_to(time, Instant::now());
        self.run(result)
    }

    /// Capture the next completed frame, brightened by `flash_strength` (0-100)
    pub fn take_snapshot(&mut self, flash_strength: i64) -> Result<RgbaImage, ViewError> {
        if self.playback.state() == PlaybackState::Uninitialized {
            return self.fail(ViewError::invalid_state("takeSnapshot() before a source was initialized"));
        }
        let strength = flash_strength.clamp(0, 100) as u8;
        if i64::from(strength) != flash_strength {
            tracing::debug!("ViewEngine: flash strength {} clamped to {}", flash_strength, strength);
        }

        match self.sink.capture_frame(self.settings.frame_interval()) {
            Some(frame) => Ok(apply_flash(frame, strength)),
            None => self.fail(ViewError::SnapshotTimeout),
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.playback.total_duration()
    }

    pub fn current_time(&self) -> f64 {
        self.playback.current_time()
    }

    pub fn available_time(&self) -> f64 {
        self.playback.available_time()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// Kind of the open source, if any
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.playback.source_kind()
    }

    // ---- per-frame update ----

    /// Run one update: apply media events, fuse input, plan and present
    pub fn tick(&mut self, viewport: Viewport) -> ProjectionResult {
        let started = Instant::now();
        self.pump_media(started);

        let sample = self.sensors.as_ref().and_then(|s| s.take_latest());
        let gesture = self.gestures.drain();
        let orientation = self.fuser.tick(sample, gesture, &self.config);
        if !self.config.touch_gestures_disabled() {
            self.apply_pinch(gesture.pinch_scale);
        }

        let projection = self.planner.project(
            orientation,
            self.fov,
            self.config.vr_mode_enabled(),
            self.config.orientation_portrait(),
            viewport,
        );
        self.sink.present(&projection);

        let step = self.playback.poll(Instant::now());
        self.apply_step(step);
        self.profiler.record(started.elapsed());
        projection
    }

    fn pump_media(&mut self, now: Instant) {
        let Some(mailbox) = self.mailbox.clone() else {
            return;
        };
        for event in mailbox.drain() {
            let step = self.playback.on_event(event, now);
            self.apply_step(step);
        }
    }

    fn apply_pinch(&mut self, scale: f32) {
        // Spreading the fingers (scale > 1) zooms in
        if scale.is_finite() && scale > 0.0 && scale != 1.0 {
            self.fov = clamp_fov(self.fov / scale);
        }
    }

    /// Orientation produced by the last tick
    pub fn orientation(&self) -> Orientation {
        self.fuser.orientation()
    }

    /// Current diagonal fov in degrees
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Make the current heading forward and clear pan offsets
    pub fn recenter(&mut self) {
        self.fuser.recenter();
    }

    /// Forget sensor history and gesture offsets; the view faces forward again
    pub fn reset_orientation(&mut self) {
        self.fuser.reset();
    }

    pub fn fusion_tuning(&self) -> &FusionTuning {
        self.fuser.tuning()
    }

    /// Replace smoothing and pan sensitivity (values are clamped)
    pub fn set_fusion_tuning(&mut self, tuning: FusionTuning) {
        self.fuser.set_tuning(tuning);
        self.settings.fusion = self.fuser.tuning().clone();
    }

    /// Handle for the input thread to report pans and pinches
    pub fn gesture_input(&self) -> GestureInput {
        self.gestures.clone()
    }

    pub fn tick_stats(&self) -> TickStats {
        self.profiler.stats()
    }

    // ---- configuration ----

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn touch_gestures_disabled(&self) -> bool {
        self.config.touch_gestures_disabled()
    }

    pub fn set_touch_gestures_disabled(&mut self, disabled: bool) {
        self.config.set_touch_gestures_disabled(disabled);
    }

    pub fn sensors_disabled(&self) -> bool {
        self.config.sensors_disabled()
    }

    /// Enable or disable device sensors; subscribes or unsubscribes immediately
    pub fn set_sensors_disabled(&mut self, disabled: bool) {
        self.config.set_sensors_disabled(disabled);
        self.sync_sensors();
    }

    pub fn vr_mode_enabled(&self) -> bool {
        self.config.vr_mode_enabled()
    }

    pub fn set_vr_mode_enabled(&mut self, enabled: bool) {
        self.config.set_vr_mode_enabled(enabled);
    }

    pub fn orientation_portrait(&self) -> bool {
        self.config.orientation_portrait()
    }

    pub fn set_orientation_portrait(&mut self, portrait: bool) {
        self.config.set_orientation_portrait(portrait);
    }

    pub fn preview_image_mode(&self) -> bool {
        self.config.preview_image_mode()
    }

    pub fn set_preview_image_mode(&mut self, enabled: bool) {
        self.config.set_preview_image_mode(enabled);
        if self.mailbox.is_some() {
            self.pipeline.set_preview_mode(enabled);
        }
    }

    pub fn volume(&self) -> f32 {
        self.config.volume()
    }

    /// Set volume (clamped to 0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.config.set_volume(volume);
        self.forward_volume();
    }

    pub fn override_silent_switch(&self) -> bool {
        self.config.override_silent_switch()
    }

    pub fn set_override_silent_switch(&mut self, override_switch: bool) {
        self.config.set_override_silent_switch(override_switch);
        self.forward_volume();
    }

    pub fn initial_fov(&self) -> f32 {
        self.config.initial_fov()
    }

    /// Set the fov (clamped to 60-120 degrees); also replaces the current fov
    pub fn set_initial_fov(&mut self, fov: f32) {
        self.config.set_initial_fov(fov);
        self.fov = self.config.initial_fov();
    }

    fn forward_volume(&mut self) {
        if self.mailbox.is_some() {
            self.pipeline
                .set_volume(self.config.volume(), self.config.override_silent_switch());
        }
    }

    fn sync_sensors(&mut self) {
        let wanted = !self.config.sensors_disabled();
        match (&self.sensor_hub, wanted, self.sensors.is_some()) {
            (Some(hub), true, false) => {
                self.sensors = Some(hub.subscribe());
                tracing::debug!("ViewEngine: subscribed to motion sensors");
            }
            (_, false, true) => {
                self.sensors = None;
                tracing::debug!("ViewEngine: unsubscribed from motion sensors");
            }
            _ => {}
        }
    }

    // ---- listener ----

    /// Register the listener, returning the one it replaces
    pub fn set_listener(&mut self, listener: Box<dyn ViewListener>) -> Option<Box<dyn ViewListener>> {
        self.listener.replace(listener)
    }

    pub fn take_listener(&mut self) -> Option<Box<dyn ViewListener>> {
        self.listener.take()
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    fn run(&mut self, result: Result<Step, ViewError>) -> Result<(), ViewError> {
        match result {
            Ok(step) => {
                self.apply_step(step);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail<T>(&mut self, error: ViewError) -> Result<T, ViewError> {
        tracing::warn!("ViewEngine: {}", error);
        self.notify(&Notification::Error(error.clone()));
        Err(error)
    }

    fn apply_step(&mut self, step: Step) {
        for command in step.commands {
            self.pipeline.apply(command);
        }
        for notification in &step.notifications {
            self.notify(notification);
        }
    }

    fn notify(&mut self, notification: &Notification) {
        if let Some(listener) = self.listener.as_mut() {
            dispatch(&mut **listener, notification);
        }
    }
}

impl Drop for ViewEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::MediaEventSender;
    use crate::orientation::{Attitude, SensorSample};
    use crate::playback::{MediaCommand, MediaEvent};
    use crate::projection::{SplitAxis, ViewportRect};
    use crate::sensors::{MotionProvider, SamplePublisher, SensorError};
    use image::Rgba;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct PipelineLog {
        opened: usize,
        closed: usize,
        commands: Vec<MediaCommand>,
        volume: Option<(f32, bool)>,
        preview_mode: Option<bool>,
        sender: Option<MediaEventSender>,
        fail_open: bool,
    }

    struct MockPipeline {
        log: Arc<Mutex<PipelineLog>>,
    }

    impl MediaPipeline for MockPipeline {
        fn open_video(&mut self, _request: &VideoRequest, events: MediaEventSender) -> Result<(), ViewError> {
            let mut log = self.log.lock();
            if log.fail_open {
                return Err(ViewError::Initialization("license rejected".into()));
            }
            log.opened += 1;
            log.sender = Some(events);
            Ok(())
        }

        fn open_image(&mut self, _request: &ImageRequest, events: MediaEventSender) -> Result<(), ViewError> {
            let mut log = self.log.lock();
            log.opened += 1;
            log.sender = Some(events);
            Ok(())
        }

        fn apply(&mut self, command: MediaCommand) {
            self.log.lock().commands.push(command);
        }

        fn set_volume(&mut self, volume: f32, override_silent_switch: bool) {
            self.log.lock().volume = Some((volume, override_silent_switch));
        }

        fn set_preview_mode(&mut self, enabled: bool) {
            self.log.lock().preview_mode = Some(enabled);
        }

        fn close(&mut self) {
            self.log.lock().closed += 1;
        }
    }

    #[derive(Default)]
    struct SinkLog {
        presented: Vec<ProjectionResult>,
        frame: Option<RgbaImage>,
    }

    struct MockSink {
        log: Arc<Mutex<SinkLog>>,
    }

    impl RenderSink for MockSink {
        fn present(&mut self, projection: &ProjectionResult) {
            self.log.lock().presented.push(*projection);
        }

        fn capture_frame(&mut self, _timeout: Duration) -> Option<RgbaImage> {
            self.log.lock().frame.clone()
        }
    }

    #[derive(Default)]
    struct Heard {
        ready: usize,
        ends: usize,
        progress: Vec<(f64, f64, f64)>,
        buffering: Vec<bool>,
        errors: Vec<ViewError>,
    }

    struct RecordingListener {
        heard: Arc<Mutex<Heard>>,
    }

    impl ViewListener for RecordingListener {
        fn video_did_reach_end(&mut self) {
            self.heard.lock().ends += 1;
        }

        fn ready_to_play_video(&mut self) {
            self.heard.lock().ready += 1;
        }

        fn did_update_progress(&mut self, current_time: f64, available_time: f64, total_duration: f64) {
            self.heard
                .lock()
                .progress
                .push((current_time, available_time, total_duration));
        }

        fn did_change_buffering_status(&mut self, buffering: bool) {
            self.heard.lock().buffering.push(buffering);
        }

        fn did_fail(&mut self, error: &ViewError) {
            self.heard.lock().errors.push(error.clone());
        }
    }

    struct Harness {
        engine: ViewEngine,
        pipeline: Arc<Mutex<PipelineLog>>,
        sink: Arc<Mutex<SinkLog>>,
        heard: Arc<Mutex<Heard>>,
    }

    impl Harness {
        fn new() -> Self {
            let pipeline = Arc::new(Mutex::new(PipelineLog::default()));
            let sink = Arc::new(Mutex::new(SinkLog::default()));
            let heard = Arc::new(Mutex::new(Heard::default()));
            let mut engine = ViewEngine::new(
                Box::new(MockPipeline {
                    log: Arc::clone(&pipeline),
                }),
                Box::new(MockSink { log: Arc::clone(&sink) }),
                EngineSettings::default(),
            );
            engine.set_listener(Box::new(RecordingListener {
                heard: Arc::clone(&heard),
            }));
            Self {
                engine,
                pipeline,
                sink,
                heard,
            }
        }

        fn open_video(&mut self) {
            self.engine
                .init_video(
                    MediaSource::url("https://cdn.example.com/pano.mp4"),
                    None,
                    MediaSource::file("/data/license.key"),
                )
                .unwrap();
        }

        fn send(&self, event: MediaEvent) -> bool {
            let sender = self.pipeline.lock().sender.clone().unwrap();
            sender.send(event)
        }

        fn tick(&mut self) -> ProjectionResult {
            self.engine.tick(Viewport::new(1280, 720))
        }
    }

    #[test]
    fn test_video_lifecycle_restarts_after_end() {
        let mut h = Harness::new();
        h.open_video();
        assert_eq!(h.engine.playback_state(), PlaybackState::Loading);

        h.send(MediaEvent::DurationChanged(30.0));
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        assert_eq!(h.engine.playback_state(), PlaybackState::ReadyPaused);
        assert!(h.engine.is_paused());
        assert_eq!(h.heard.lock().ready, 1);
        assert_eq!(h.engine.total_duration(), 30.0);

        h.engine.play().unwrap();
        assert_eq!(h.engine.playback_state(), PlaybackState::Playing);
        assert!(!h.engine.is_paused());

        h.send(MediaEvent::ReachedEnd);
        h.tick();
        h.tick();
        assert_eq!(h.engine.playback_state(), PlaybackState::Ended);
        assert_eq!(h.heard.lock().ends, 1);

        h.engine.play().unwrap();
        assert_eq!(h.engine.current_time(), 0.0);
        assert_eq!(h.engine.playback_state(), PlaybackState::Playing);
        let commands = h.pipeline.lock().commands.clone();
        assert_eq!(
            commands,
            vec![MediaCommand::Play, MediaCommand::Seek(0.0), MediaCommand::Play]
        );
    }

    #[test]
    fn test_decode_failure_rejects_play() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        h.engine.play().unwrap();

        h.send(MediaEvent::DecodeFailed("corrupt stream".into()));
        h.tick();
        assert_eq!(h.engine.playback_state(), PlaybackState::Failed);

        let commands_before = h.pipeline.lock().commands.len();
        let err = h.engine.play().unwrap_err();
        assert!(matches!(err, ViewError::InvalidState(_)));
        assert_eq!(h.pipeline.lock().commands.len(), commands_before);

        let errors = h.heard.lock().errors.clone();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], ViewError::Decode("corrupt stream".into()));
        assert!(matches!(errors[1], ViewError::InvalidState(_)));
    }

    #[test]
    fn test_vr_portrait_presents_two_eyes() {
        let mut h = Harness::new();
        h.engine.set_vr_mode_enabled(true);
        h.engine.set_orientation_portrait(true);

        let result = h.engine.tick(Viewport::new(1000, 2000));
        let ProjectionResult::Split { axis, first, second } = &result else {
            panic!("expected split projection");
        };
        assert_eq!(*axis, SplitAxis::TopBottom);
        assert_eq!(first.rect, ViewportRect::new(0, 0, 1000, 1000));
        assert_eq!(second.rect, ViewportRect::new(0, 1000, 1000, 1000));
        assert_eq!(h.sink.lock().presented.last(), Some(&result));
    }

    #[test]
    fn test_config_values_are_clamped() {
        let mut h = Harness::new();
        h.engine.set_initial_fov(10.0);
        assert_eq!(h.engine.fov(), 60.0);
        h.engine.set_initial_fov(500.0);
        assert_eq!(h.engine.initial_fov(), 120.0);

        h.engine.set_volume(-1.0);
        assert_eq!(h.engine.volume(), 0.0);
        h.engine.set_volume(2.5);
        assert_eq!(h.engine.volume(), 1.0);
    }

    #[test]
    fn test_settings_forwarded_to_open_pipeline() {
        let mut h = Harness::new();
        h.engine.set_volume(0.5);
        assert_eq!(h.pipeline.lock().volume, None);

        h.open_video();
        h.engine.set_volume(0.25);
        h.engine.set_override_silent_switch(true);
        h.engine.set_preview_image_mode(true);
        let log = h.pipeline.lock();
        assert_eq!(log.volume, Some((0.25, true)));
        assert_eq!(log.preview_mode, Some(true));
    }

    #[test]
    fn test_pinch_zoom_stays_in_range() {
        let mut h = Harness::new();
        let input = h.engine.gesture_input();
        input.pinch(2.0);
        h.tick();
        assert_eq!(h.engine.fov(), 60.0);

        input.pinch(0.5);
        input.pinch(0.5);
        h.tick();
        assert_eq!(h.engine.fov(), 120.0);

        h.engine.set_touch_gestures_disabled(true);
        input.pinch(1.5);
        h.tick();
        assert_eq!(h.engine.fov(), 120.0);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::DurationChanged(10.0));
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        h.engine.play().unwrap();
        h.send(MediaEvent::ProgressUpdate {
            current_time: 4.0,
            available_time: 8.0,
        });
        h.tick();

        h.engine.pause().unwrap();
        let time = h.engine.current_time();
        h.engine.pause().unwrap();
        assert_eq!(h.engine.playback_state(), PlaybackState::Paused);
        assert_eq!(h.engine.current_time(), time);
        let pauses = h
            .pipeline
            .lock()
            .commands
            .iter()
            .filter(|c| **c == MediaCommand::Pause)
            .count();
        assert_eq!(pauses, 1);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::DurationChanged(20.0));
        h.send(MediaEvent::ReadyToPlay);
        h.tick();

        h.engine.seek_to(12.5).unwrap();
        assert_eq!(h.engine.current_time(), 12.5);
        h.engine.seek_to(99.0).unwrap();
        assert_eq!(h.engine.current_time(), 20.0);
        h.engine.seek_to(-3.0).unwrap();
        assert_eq!(h.engine.current_time(), 0.0);
    }

    #[test]
    fn test_operations_without_source_fail() {
        let mut h = Harness::new();
        assert!(matches!(h.engine.play(), Err(ViewError::InvalidState(_))));
        assert!(matches!(h.engine.seek_to(1.0), Err(ViewError::InvalidState(_))));
        assert!(matches!(h.engine.take_snapshot(0), Err(ViewError::InvalidState(_))));
        assert_eq!(h.heard.lock().errors.len(), 3);
    }

    #[test]
    fn test_invalid_source_stays_uninitialized() {
        let mut h = Harness::new();
        let err = h
            .engine
            .init_video(MediaSource::url("not a url"), None, MediaSource::file("/data/license.key"))
            .unwrap_err();
        assert!(matches!(err, ViewError::Initialization(_)));
        assert_eq!(h.engine.playback_state(), PlaybackState::Uninitialized);
        assert_eq!(h.pipeline.lock().opened, 0);
    }

    #[test]
    fn test_pipeline_open_failure_stays_uninitialized() {
        let mut h = Harness::new();
        h.pipeline.lock().fail_open = true;
        let err = h
            .engine
            .init_video(
                MediaSource::url("https://cdn.example.com/pano.mp4"),
                None,
                MediaSource::file("/data/license.key"),
            )
            .unwrap_err();
        assert_eq!(err, ViewError::Initialization("license rejected".into()));
        assert_eq!(h.engine.playback_state(), PlaybackState::Uninitialized);
        assert_eq!(h.heard.lock().errors, vec![err]);
    }

    #[test]
    fn test_snapshot_applies_flash() {
        let mut h = Harness::new();
        h.open_video();
        assert_eq!(h.engine.take_snapshot(10), Err(ViewError::SnapshotTimeout));

        h.sink.lock().frame = Some(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let snapshot = h.engine.take_snapshot(500).unwrap();
        assert_eq!(snapshot.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        let snapshot = h.engine.take_snapshot(-20).unwrap();
        assert_eq!(snapshot.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_image_source_cannot_play() {
        let mut h = Harness::new();
        h.engine
            .init_image(
                ImageSource::Pixels(RgbaImage::new(8, 4)),
                MediaSource::file("/data/license.key"),
            )
            .unwrap();
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        assert_eq!(h.engine.playback_state(), PlaybackState::ReadyPaused);
        assert!(matches!(h.engine.play(), Err(ViewError::InvalidState(_))));
        assert!(h.engine.pause().is_ok());
    }

    #[test]
    fn test_teardown_drops_late_events() {
        let mut h = Harness::new();
        h.open_video();
        let sender = h.pipeline.lock().sender.clone().unwrap();

        h.engine.teardown();
        assert_eq!(h.pipeline.lock().closed, 1);
        assert_eq!(h.engine.playback_state(), PlaybackState::Uninitialized);
        assert!(!sender.send(MediaEvent::ReadyToPlay));
        h.tick();
        assert_eq!(h.heard.lock().ready, 0);
    }

    #[test]
    fn test_reinit_closes_previous_session() {
        let mut h = Harness::new();
        h.open_video();
        let first = h.pipeline.lock().sender.clone().unwrap();
        h.open_video();
        assert_eq!(h.pipeline.lock().closed, 1);
        assert!(!first.is_open());
        assert_eq!(h.engine.playback_state(), PlaybackState::Loading);
    }

    #[test]
    fn test_progress_is_monotonic_while_playing() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::DurationChanged(60.0));
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        h.engine.play().unwrap();

        for t in [1.0, 2.0, 1.5, 3.0] {
            h.send(MediaEvent::ProgressUpdate {
                current_time: t,
                available_time: 10.0,
            });
            h.tick();
        }
        let progress = h.heard.lock().progress.clone();
        assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_decode_failure_survives_buffering_flood() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::DurationChanged(30.0));
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        h.engine.play().unwrap();

        // Update thread stalls while the pipeline flaps between buffering states
        for i in 0..70 {
            h.send(if i % 2 == 0 {
                MediaEvent::BufferingStarted
            } else {
                MediaEvent::BufferingEnded
            });
        }
        assert!(h.send(MediaEvent::DecodeFailed("boom".into())));
        h.tick();
        h.tick();

        assert_eq!(h.engine.playback_state(), PlaybackState::Failed);
        assert_eq!(h.heard.lock().errors, vec![ViewError::Decode("boom".into())]);
    }

    #[test]
    fn test_end_survives_buffering_flood() {
        let mut h = Harness::new();
        h.open_video();
        h.send(MediaEvent::ReadyToPlay);
        h.tick();
        h.engine.play().unwrap();

        for _ in 0..40 {
            h.send(MediaEvent::BufferingStarted);
            h.send(MediaEvent::BufferingEnded);
        }
        h.send(MediaEvent::ReachedEnd);
        h.tick();

        assert_eq!(h.engine.playback_state(), PlaybackState::Ended);
        assert_eq!(h.heard.lock().ends, 1);
    }

    #[test]
    fn test_source_kind_and_orientation_reset() {
        let mut h = Harness::new();
        assert_eq!(h.engine.source_kind(), None);
        h.open_video();
        assert_eq!(h.engine.source_kind(), Some(SourceKind::Video));

        h.engine.gesture_input().pan(200.0, 0.0);
        h.tick();
        assert!(h.engine.orientation().yaw.abs() > 0.1);

        h.engine.reset_orientation();
        assert_eq!(h.engine.orientation(), Orientation::default());
        h.tick();
        assert!(h.engine.orientation().yaw.abs() < 1e-6);
    }

    #[test]
    fn test_fusion_tuning_is_clamped_and_kept() {
        let mut h = Harness::new();
        h.engine.set_fusion_tuning(FusionTuning {
            smoothing: 0.0,
            pan_sensitivity: 0.01,
        });
        assert_eq!(h.engine.fusion_tuning().smoothing, crate::orientation::MIN_SMOOTHING);
        assert_eq!(h.engine.settings().fusion, *h.engine.fusion_tuning());
    }

    #[test]
    fn test_listener_replacement() {
        let mut h = Harness::new();
        assert!(h.engine.take_listener().is_some());
        assert!(h.engine.take_listener().is_none());
        // No listener registered: notifications are dropped silently
        assert!(h.engine.play().is_err());
        h.engine.clear_listener();
    }

    #[derive(Default)]
    struct ProviderState {
        publisher: Option<SamplePublisher>,
        running: bool,
    }

    struct ManualProvider {
        state: Arc<Mutex<ProviderState>>,
    }

    impl MotionProvider for ManualProvider {
        fn start(&mut self, publisher: SamplePublisher) -> Result<(), SensorError> {
            let mut state = self.state.lock();
            state.publisher = Some(publisher);
            state.running = true;
            Ok(())
        }

        fn stop(&mut self) {
            let mut state = self.state.lock();
            state.publisher = None;
            state.running = false;
        }
    }

    #[test]
    fn test_sensor_toggle_subscribes_and_unsubscribes() {
        let provider = Arc::new(Mutex::new(ProviderState::default()));
        let hub = SensorHub::new(Box::new(ManualProvider {
            state: Arc::clone(&provider),
        }));
        let mut h = Harness::new();
        h.engine = ViewEngine::new(
            Box::new(MockPipeline {
                log: Arc::clone(&h.pipeline),
            }),
            Box::new(MockSink {
                log: Arc::clone(&h.sink),
            }),
            EngineSettings::default(),
        )
        .with_sensor_hub(Arc::clone(&hub));
        assert!(hub.is_active());

        let publisher = provider.lock().publisher.clone().unwrap();
        publisher.publish(SensorSample::new(
            Attitude::Euler {
                yaw: 0.5,
                pitch: 0.0,
                roll: 0.0,
            },
            Duration::ZERO,
        ));
        h.tick();
        assert!((h.engine.orientation().yaw - 0.5).abs() < 1e-4);

        h.engine.set_sensors_disabled(true);
        assert!(!hub.is_active());
        assert!(!provider.lock().running);

        h.engine.set_sensors_disabled(false);
        assert!(hub.is_active());
        h.engine.teardown();
        assert!(!hub.is_active());
    }
}
