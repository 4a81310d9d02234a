//! The camera watch loop.
//!
//! One synchronous iteration per frame: read, gate, react. Errors from the
//! camera end the loop; everything else (snapshot writes, detector failures)
//! is logged and the loop carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::detect::PET_CLASSES;
use crate::gate::{DetectionMode, GateOutput, MotionGatedDetector};
use crate::ingest::CameraSource;
use crate::player::VideoPlayer;
use crate::snapshot::SnapshotWriter;
use crate::ui::Ticker;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Stop after this many frames (`None` runs until stopped).
    pub max_frames: Option<u64>,
    /// Minimum time between iterations; zero disables pacing.
    pub frame_interval: Duration,
    pub snapshot_on_detect: bool,
    /// Minimum spacing between two snapshots.
    pub snapshot_cooldown: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            max_frames: None,
            frame_interval: Duration::ZERO,
            snapshot_on_detect: false,
            snapshot_cooldown: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchSummary {
    pub frames: u64,
    pub detector_calls: u64,
    pub motion_checks: u64,
    pub transitions: u64,
    pub snapshots: u64,
    /// Pet appearances after a wake-up, one per Active period at most.
    pub greetings: u64,
    /// Greetings the player accepted (a busy player ignores the trigger).
    pub player_triggers: u64,
    pub final_mode: DetectionMode,
}

/// Optional reactions to what the gate sees.
#[derive(Default)]
pub struct WatchSinks<'a> {
    pub snapshots: Option<&'a SnapshotWriter>,
    /// Player plus the clip it plays when a pet shows up.
    pub player: Option<(&'a VideoPlayer, &'a str)>,
    pub ticker: Option<&'a Ticker>,
}

pub fn run_watch(
    source: &mut CameraSource,
    gate: &mut MotionGatedDetector,
    sinks: WatchSinks<'_>,
    opts: &WatchOptions,
    stop: &AtomicBool,
) -> WatchSummary {
    let mut frames = 0u64;
    let mut snapshots = 0u64;
    let mut greetings = 0u64;
    let mut player_triggers = 0u64;
    let mut last_snapshot_at: Option<Instant> = None;
    let mut last_health_log = Instant::now();
    // Greet at most once per wake-up; the gate starts awake.
    let mut greet_pending = true;

    if !gate.is_enabled() {
        log::warn!("detector unavailable; frames pass through unprocessed");
    }

    loop {
        if stop.load(Ordering::Relaxed) {
            log::info!("stop requested, leaving watch loop");
            break;
        }
        if opts.max_frames.is_some_and(|max| frames >= max) {
            break;
        }
        let started = Instant::now();

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("could not read camera frame: {:#}", e);
                break;
            }
        };
        frames += 1;

        let output = gate.process(&frame, Instant::now());
        if output.transitioned {
            log::info!("gate switched to {} mode (frame {})", output.mode, frames);
            if output.mode == DetectionMode::Active {
                greet_pending = true;
            }
        }
        if !output.labels.is_empty() {
            log::debug!("frame {}: {}", frames, output.labels.join(", "));
        }

        if opts.snapshot_on_detect && !output.labels.is_empty() {
            if let Some(writer) = sinks.snapshots {
                let due = last_snapshot_at
                    .map_or(true, |at| at.elapsed() >= opts.snapshot_cooldown);
                if due {
                    match output.render(&frame).and_then(|image| writer.save(&image)) {
                        Ok(_) => {
                            snapshots += 1;
                            last_snapshot_at = Some(Instant::now());
                        }
                        Err(e) => log::error!("snapshot failed: {:#}", e),
                    }
                }
            }
        }

        if greet_pending && has_pet(&output) {
            greet_pending = false;
            greetings += 1;
            if let Some((player, clip)) = sinks.player {
                if player.trigger_play(clip) {
                    player_triggers += 1;
                }
            }
        }

        if let Some(ticker) = sinks.ticker {
            ticker.update(format!("frame {} | {} mode", frames, output.mode));
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "camera {} healthy={} frames={} mode={}",
                stats.device,
                source.is_healthy(),
                stats.frames_captured,
                gate.mode()
            );
            last_health_log = Instant::now();
        }

        if !opts.frame_interval.is_zero() {
            let spent = started.elapsed();
            if spent < opts.frame_interval {
                std::thread::sleep(opts.frame_interval - spent);
            }
        }
    }

    let stats = gate.stats();
    WatchSummary {
        frames,
        detector_calls: stats.detector_calls,
        motion_checks: stats.motion_checks,
        transitions: stats.transitions,
        snapshots,
        greetings,
        player_triggers,
        final_mode: gate.mode(),
    }
}

fn has_pet(output: &GateOutput) -> bool {
    output
        .labels
        .iter()
        .any(|label| PET_CLASSES.contains(&label.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectParams, StubBackend};
    use crate::gate::GateConfig;
    use crate::ingest::CameraConfig;

    fn stub_source() -> CameraSource {
        let mut source = CameraSource::new(CameraConfig {
            device: "stub://watch".to_string(),
            target_fps: 30,
            width: 160,
            height: 120,
        })
        .unwrap();
        source.connect().unwrap();
        source
    }

    #[test]
    fn stops_after_max_frames() {
        let mut source = stub_source();
        let mut gate = MotionGatedDetector::new(
            Some(Box::new(StubBackend::default())),
            DetectParams::default(),
            GateConfig::default(),
            Instant::now(),
        );
        let opts = WatchOptions {
            max_frames: Some(12),
            ..WatchOptions::default()
        };
        let summary = run_watch(
            &mut source,
            &mut gate,
            WatchSinks::default(),
            &opts,
            &AtomicBool::new(false),
        );
        assert_eq!(summary.frames, 12);
        assert_eq!(summary.detector_calls, 12);
        assert_eq!(summary.final_mode, DetectionMode::Active);
    }

    #[test]
    fn stop_flag_ends_loop_before_first_frame() {
        let mut source = stub_source();
        let mut gate = MotionGatedDetector::new(
            None,
            DetectParams::default(),
            GateConfig::default(),
            Instant::now(),
        );
        let summary = run_watch(
            &mut source,
            &mut gate,
            WatchSinks::default(),
            &WatchOptions::default(),
            &AtomicBool::new(true),
        );
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn pet_labels_are_recognised() {
        let mut output = GateOutput::pass_through(DetectionMode::Active);
        assert!(!has_pet(&output));
        output.labels = vec!["person".to_string(), "cat".to_string()];
        assert!(has_pet(&output));
    }
}
