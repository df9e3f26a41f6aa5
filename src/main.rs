//! Panorama View demo
//!
//! Runs a headless session against simulated collaborators: a fake decoder,
//! a synthetic motion sensor and a sink that only counts frames. Useful for
//! watching the playback state machine and tick timing in the logs.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use panorama_view::projection::Viewport;
use panorama_view::sim::{RecordingSink, SimulatedPipeline, SimulatedVideo, SyntheticMotion};
use panorama_view::telemetry::{init_logging, LogConfig};
use panorama_view::{EngineSettings, MediaSource, PlaybackState, SensorHub, ViewEngine, ViewError, ViewListener};

/// Forwards listener callbacks to the log
struct LogListener;

impl ViewListener for LogListener {
    fn video_did_reach_end(&mut self) {
        tracing::info!("Listener: video reached end");
    }

    fn ready_to_play_video(&mut self) {
        tracing::info!("Listener: ready to play");
    }

    fn did_update_progress(&mut self, current_time: f64, available_time: f64, total_duration: f64) {
        tracing::debug!(
            "Listener: progress {:.2}s / {:.2}s (buffered to {:.2}s)",
            current_time,
            total_duration,
            available_time
        );
    }

    fn did_change_buffering_status(&mut self, buffering: bool) {
        tracing::info!("Listener: buffering = {}", buffering);
    }

    fn did_fail(&mut self, error: &ViewError) {
        tracing::warn!("Listener: {}", error);
    }
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging(&LogConfig::default())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    let settings = EngineSettings::load();
    let frame_interval = settings.frame_interval();
    tracing::info!("Target frame interval {:.2}ms", frame_interval.as_secs_f64() * 1000.0);

    let source = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sim://demo/pano-360.mp4".to_string());

    let hub = SensorHub::new(Box::new(SyntheticMotion::new(4.0, 0.002, Duration::from_millis(10))));
    let sink = RecordingSink::new(320, 160);
    let frames = sink.frame_counter();
    let mut engine = ViewEngine::new(
        Box::new(SimulatedPipeline::new(SimulatedVideo::default())),
        Box::new(sink),
        settings,
    )
    .with_sensor_hub(hub);
    engine.set_listener(Box::new(LogListener));

    engine
        .init_video(MediaSource::url(source), None, MediaSource::file("demo-license.key"))
        .context("Failed to open video")?;

    let viewport = Viewport::new(1280, 720);
    let gestures = engine.gesture_input();
    let started = Instant::now();
    let mut seeked = false;
    let mut toggled_vr = false;

    while started.elapsed() < Duration::from_secs(15) {
        let tick_start = Instant::now();
        engine.tick(viewport);

        match engine.playback_state() {
            PlaybackState::ReadyPaused => engine.play()?,
            PlaybackState::Ended => break,
            PlaybackState::Failed => anyhow::bail!("Playback failed"),
            _ => {}
        }

        let elapsed = started.elapsed();
        if !seeked && elapsed > Duration::from_secs(3) {
            engine.seek_to(8.5)?;
            seeked = true;
        }
        if !toggled_vr && elapsed > Duration::from_secs(5) {
            engine.set_vr_mode_enabled(true);
            gestures.pan(40.0, -10.0);
            gestures.pinch(1.2);
            toggled_vr = true;
        }

        if let Some(remaining) = frame_interval.checked_sub(tick_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    let orientation = engine.orientation();
    tracing::info!(
        "Final state {:?} at {:.2}s, yaw {:.1}° pitch {:.1}° fov {:.1}°",
        engine.playback_state(),
        engine.current_time(),
        orientation.yaw.to_degrees(),
        orientation.pitch.to_degrees(),
        engine.fov()
    );

    let snapshot = engine.take_snapshot(30)?;
    let snapshot_path = std::env::temp_dir().join("panorama-view-snapshot.png");
    snapshot
        .save(&snapshot_path)
        .with_context(|| format!("Failed to save snapshot to {}", snapshot_path.display()))?;
    tracing::info!("Snapshot written to {}", snapshot_path.display());

    let stats = engine.tick_stats();
    tracing::info!(
        frames = *frames.lock(),
        avg_ms = stats.avg_ms,
        p95_ms = stats.p95_ms,
        max_ms = stats.max_ms,
        over_budget = stats.over_budget,
        "Tick timing"
    );

    engine.teardown();
    Ok(())
}
