use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use pet_vision::detect::StubBackend;
use pet_vision::player::VideoPlayer;
use pet_vision::snapshot::SnapshotWriter;
use pet_vision::{
    run_watch, CameraConfig, CameraSource, DetectParams, DetectionMode, DetectionResult,
    DetectorBackend, Frame, GateConfig, GateView, MotionGatedDetector, WatchOptions, WatchSinks,
};

const W: u32 = 160;
const H: u32 = 120;

fn scene(square_at: Option<u32>) -> Frame {
    let mut image = RgbImage::from_pixel(W, H, Rgb([30, 30, 30]));
    if let Some(x0) = square_at {
        for y in 40..80 {
            for x in x0..x0 + 40 {
                image.put_pixel(x, y, Rgb([235, 235, 235]));
            }
        }
    }
    Frame::from_image(image)
}

fn gate_config() -> GateConfig {
    GateConfig {
        cool_down: Duration::from_secs(1),
        motion_threshold: 200,
        ..GateConfig::default()
    }
}

fn stub_gate(start: Instant) -> MotionGatedDetector {
    MotionGatedDetector::new(
        Some(Box::new(StubBackend::new())),
        DetectParams::default(),
        gate_config(),
        start,
    )
}

#[test]
fn sleeps_after_cool_down_and_wakes_on_motion() {
    let t0 = Instant::now();
    let mut gate = stub_gate(t0);

    let out = gate.process(&scene(None), t0);
    assert_eq!(out.mode, DetectionMode::Active);
    assert!(!out.transitioned);

    let out = gate.process(&scene(None), t0 + Duration::from_secs(2));
    assert_eq!(out.mode, DetectionMode::Idle);
    assert!(out.transitioned);

    // First idle frame only seeds the reference.
    let out = gate.process(&scene(None), t0 + Duration::from_secs(3));
    assert!(matches!(out.view, GateView::PassThrough));
    assert_eq!(out.mode, DetectionMode::Idle);

    let out = gate.process(&scene(None), t0 + Duration::from_secs(4));
    assert_eq!(out.mode, DetectionMode::Idle);
    match out.view {
        GateView::MotionMask(mask) => assert!(mask.pixels().all(|p| p.0[0] == 0)),
        other => panic!("expected motion mask, got {:?}", other),
    }

    let out = gate.process(&scene(Some(60)), t0 + Duration::from_secs(5));
    assert_eq!(out.mode, DetectionMode::Active);
    assert!(out.transitioned);

    let out = gate.process(&scene(Some(60)), t0 + Duration::from_secs(6));
    assert_eq!(out.mode, DetectionMode::Active);
    assert_eq!(out.labels, vec!["cat".to_string()]);
    assert!(matches!(out.view, GateView::Annotated(_)));

    let stats = gate.stats();
    assert_eq!(stats.transitions, 2);
    assert_eq!(stats.detector_calls, 3);
    assert_eq!(stats.motion_checks, 3);
}

#[test]
fn static_scene_never_wakes_idle_gate() {
    let t0 = Instant::now();
    let mut gate = stub_gate(t0);
    gate.process(&scene(None), t0 + Duration::from_secs(2));
    assert_eq!(gate.mode(), DetectionMode::Idle);

    for i in 0..50u64 {
        let out = gate.process(&scene(None), t0 + Duration::from_secs(3 + i));
        assert_eq!(out.mode, DetectionMode::Idle);
        assert!(!out.transitioned);
    }
    assert_eq!(gate.stats().detector_calls, 1);
}

#[test]
fn any_match_keeps_gate_active() {
    let t0 = Instant::now();
    let mut gate = stub_gate(t0);
    for i in 0..30u64 {
        let out = gate.process(&scene(Some(10 + i as u32)), t0 + Duration::from_secs(i * 10));
        assert_eq!(out.mode, DetectionMode::Active);
        assert!(!out.labels.is_empty());
    }
    assert_eq!(gate.stats().transitions, 0);
}

struct BrokenLoad;

impl DetectorBackend for BrokenLoad {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn detect(&mut self, _frame: &Frame, _params: &DetectParams) -> Result<DetectionResult> {
        Err(anyhow!("not loaded"))
    }
}

#[test]
fn failed_load_passes_frames_through_forever() {
    let t0 = Instant::now();
    let mut gate = MotionGatedDetector::load(
        || -> Result<Box<dyn DetectorBackend>> { Err(anyhow!("model file missing")) },
        DetectParams::default(),
        gate_config(),
        t0,
    );
    assert!(!gate.is_enabled());
    for i in 0..10u64 {
        let frame = scene(if i % 2 == 0 { None } else { Some(50) });
        let out = gate.process(&frame, t0 + Duration::from_secs(i * 10));
        assert!(matches!(out.view, GateView::PassThrough));
        assert_eq!(out.mode, DetectionMode::Active);
    }
    assert_eq!(gate.stats().detector_calls, 0);
}

#[test]
fn detector_errors_do_not_change_mode() {
    let t0 = Instant::now();
    let mut gate =
        MotionGatedDetector::new(Some(Box::new(BrokenLoad)), DetectParams::default(), gate_config(), t0);
    let out = gate.process(&scene(Some(20)), t0 + Duration::from_secs(30));
    assert_eq!(out.mode, DetectionMode::Active);
    assert!(matches!(out.view, GateView::PassThrough));
    assert_eq!(gate.stats().detector_errors, 1);
}

#[test]
fn watch_loop_over_synthetic_camera() -> Result<()> {
    let mut source = CameraSource::new(CameraConfig {
        device: "stub://living-room".to_string(),
        target_fps: 30,
        width: W,
        height: H,
    })?;
    source.connect()?;
    let mut gate = MotionGatedDetector::new(
        Some(Box::new(StubBackend::new())),
        DetectParams::default(),
        GateConfig {
            cool_down: Duration::ZERO,
            ..gate_config()
        },
        Instant::now(),
    );

    let opts = WatchOptions {
        max_frames: Some(200),
        ..WatchOptions::default()
    };
    let summary = run_watch(
        &mut source,
        &mut gate,
        WatchSinks::default(),
        &opts,
        &AtomicBool::new(false),
    );

    assert_eq!(summary.frames, 200);
    assert!(summary.motion_checks > 0, "gate never went idle");
    assert!(summary.transitions >= 2, "gate never woke up again");
    assert_eq!(
        summary.detector_calls + summary.motion_checks,
        summary.frames
    );
    Ok(())
}

fn synthetic_watch(
    max_frames: u64,
    snapshot_cooldown: Duration,
    writer: &SnapshotWriter,
    player: &VideoPlayer,
) -> Result<pet_vision::WatchSummary> {
    let mut source = CameraSource::new(CameraConfig {
        device: "stub://hallway".to_string(),
        target_fps: 30,
        width: W,
        height: H,
    })?;
    source.connect()?;
    let mut gate = MotionGatedDetector::new(
        Some(Box::new(StubBackend::new())),
        DetectParams::default(),
        GateConfig {
            cool_down: Duration::ZERO,
            ..gate_config()
        },
        Instant::now(),
    );
    let opts = WatchOptions {
        max_frames: Some(max_frames),
        frame_interval: Duration::from_millis(1),
        snapshot_on_detect: true,
        snapshot_cooldown,
    };
    Ok(run_watch(
        &mut source,
        &mut gate,
        WatchSinks {
            snapshots: Some(writer),
            player: Some((player, "hello_cat.mp4")),
            ticker: None,
        },
        &opts,
        &AtomicBool::new(false),
    ))
}

fn png_count(dir: &std::path::Path) -> Result<usize> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "png"))
        .count())
}

#[test]
fn watch_rate_limits_snapshots_and_greets_once_per_wake() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let writer = SnapshotWriter::new(dir.path());
    let player = VideoPlayer::new(Duration::from_millis(5)).with_step(Duration::from_millis(1));

    // Two full scene periods: the visitor walks in twice, each time after
    // the gate has gone idle.
    let summary = synthetic_watch(280, Duration::from_secs(3600), &writer, &player)?;

    assert_eq!(summary.frames, 280);
    assert_eq!(summary.transitions, 4, "expected two sleep/wake cycles");
    assert_eq!(summary.snapshots, 1);
    assert_eq!(png_count(dir.path())?, 1);
    assert_eq!(summary.greetings, 2);
    assert!(summary.player_triggers >= 1 && summary.player_triggers <= summary.greetings);
    Ok(())
}

#[test]
fn watch_without_snapshot_cooldown_saves_every_detection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let writer = SnapshotWriter::new(dir.path());
    let player = VideoPlayer::new(Duration::from_millis(5)).with_step(Duration::from_millis(1));

    let summary = synthetic_watch(100, Duration::ZERO, &writer, &player)?;

    assert!(summary.snapshots > 1);
    assert_eq!(png_count(dir.path())? as u64, summary.snapshots);
    assert_eq!(summary.greetings, 1);
    Ok(())
}
