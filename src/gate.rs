//! Motion-gated detector.
//!
//! Keeps the expensive detector off while nothing of interest is in view.
//!
//! - `Active`: every frame goes through the detector. Matches keep the gate
//!   active and are drawn onto the visible frame. Once no match has been seen
//!   for longer than the cool-down, the gate drops to `Idle`.
//! - `Idle`: every frame is differenced against the previous blurred
//!   grayscale frame. When more pixels than the motion threshold changed, the
//!   gate wakes up; otherwise the binarized difference is the visible frame.
//!
//! A gate whose detector failed to load is disabled: every call passes the
//! frame through and the mode never changes.

use anyhow::Result;
use image::{GrayImage, RgbImage};
use std::time::{Duration, Instant};

use crate::detect::{annotate, DetectParams, Detection, DetectorBackend};
use crate::frame::Frame;
use crate::motion::{self, MotionDiff, DEFAULT_BINARIZE_CUTOFF, DEFAULT_BLUR_SIGMA};

/// Which signal currently governs the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMode {
    Active,
    Idle,
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMode::Active => f.write_str("active"),
            DetectionMode::Idle => f.write_str("idle"),
        }
    }
}

/// Gate tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct GateConfig {
    /// Sustained non-detection before falling back to motion differencing.
    pub cool_down: Duration,
    /// Changed-pixel count above which the idle gate wakes up.
    pub motion_threshold: u64,
    /// Per-pixel difference cutoff for binarization.
    pub binarize_cutoff: u8,
    /// Gaussian sigma applied to the grayscale reference.
    pub blur_sigma: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cool_down: Duration::from_secs(5),
            motion_threshold: 5_000,
            binarize_cutoff: DEFAULT_BINARIZE_CUTOFF,
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

/// What the loop should show for this cycle.
#[derive(Clone, Debug)]
pub enum GateView {
    /// Show the input frame unchanged.
    PassThrough,
    /// Input frame with detections drawn.
    Annotated(RgbImage),
    /// Binarized difference image.
    MotionMask(GrayImage),
}

/// Output of one gate cycle.
#[derive(Clone, Debug)]
pub struct GateOutput {
    pub view: GateView,
    /// Mode after this cycle.
    pub mode: DetectionMode,
    /// Sorted, unique labels detected this cycle.
    pub labels: Vec<String>,
    pub detections: Vec<Detection>,
    /// True when this cycle changed the mode.
    pub transitioned: bool,
}

impl GateOutput {
    pub(crate) fn pass_through(mode: DetectionMode) -> Self {
        Self {
            view: GateView::PassThrough,
            mode,
            labels: Vec::new(),
            detections: Vec::new(),
            transitioned: false,
        }
    }

    /// Materialize the visible frame.
    pub fn render(&self, frame: &Frame) -> Result<RgbImage> {
        match &self.view {
            GateView::PassThrough => frame.to_rgb_image(),
            GateView::Annotated(image) => Ok(image.clone()),
            GateView::MotionMask(mask) => Ok(image::DynamicImage::ImageLuma8(mask.clone()).to_rgb8()),
        }
    }
}

/// Work counters, logged by the watch loop as the power-saving report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateStats {
    pub detector_calls: u64,
    pub detector_errors: u64,
    pub motion_checks: u64,
    pub transitions: u64,
}

pub struct MotionGatedDetector {
    backend: Option<Box<dyn DetectorBackend>>,
    params: DetectParams,
    config: GateConfig,
    mode: DetectionMode,
    mode_started_at: Instant,
    last_detection_at: Option<Instant>,
    last_no_detection_at: Option<Instant>,
    prev_gray: Option<GrayImage>,
    stats: GateStats,
}

impl MotionGatedDetector {
    /// Build a gate around a loaded backend. `None` yields a disabled gate.
    pub fn new(
        backend: Option<Box<dyn DetectorBackend>>,
        params: DetectParams,
        config: GateConfig,
        now: Instant,
    ) -> Self {
        Self {
            backend,
            params,
            config,
            mode: DetectionMode::Active,
            mode_started_at: now,
            last_detection_at: None,
            last_no_detection_at: None,
            prev_gray: None,
            stats: GateStats::default(),
        }
    }

    /// Build a gate from a backend loader. A load failure is logged and
    /// leaves the gate permanently disabled.
    pub fn load<F>(loader: F, params: DetectParams, config: GateConfig, now: Instant) -> Self
    where
        F: FnOnce() -> Result<Box<dyn DetectorBackend>>,
    {
        let backend = match loader() {
            Ok(backend) => Some(backend),
            Err(e) => {
                log::error!("could not load detector, vision gate disabled: {:#}", e);
                None
            }
        };
        Self::new(backend, params, config, now)
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }

    pub fn mode_started_at(&self) -> Instant {
        self.mode_started_at
    }

    pub fn last_no_detection_at(&self) -> Option<Instant> {
        self.last_no_detection_at
    }

    /// Process one frame at `now`.
    pub fn process(&mut self, frame: &Frame, now: Instant) -> GateOutput {
        if self.backend.is_none() {
            return GateOutput::pass_through(self.mode);
        }
        match self.mode {
            DetectionMode::Active => self.process_active(frame, now),
            DetectionMode::Idle => self.process_idle(frame, now),
        }
    }

    /// Run the detector. The cool-down counts from the last positive
    /// detection, or from the start of the Active period when there was
    /// none, so the gate sleeps only after sustained non-detection.
    fn process_active(&mut self, frame: &Frame, now: Instant) -> GateOutput {
        let Some(backend) = self.backend.as_mut() else {
            return GateOutput::pass_through(self.mode);
        };

        self.stats.detector_calls += 1;
        let mut result = match backend.detect(frame, &self.params) {
            Ok(result) => result,
            Err(e) => {
                self.stats.detector_errors += 1;
                log::warn!("detector failed on frame {}: {:#}", frame.sequence, e);
                return GateOutput::pass_through(self.mode);
            }
        };
        result.retain_classes(&self.params);

        if !result.is_empty() {
            self.last_detection_at = Some(now);
            let view = match frame.to_rgb_image() {
                Ok(mut image) => {
                    annotate(&mut image, &result.detections);
                    GateView::Annotated(image)
                }
                Err(e) => {
                    log::warn!("could not annotate frame {}: {:#}", frame.sequence, e);
                    GateView::PassThrough
                }
            };
            return GateOutput {
                view,
                mode: DetectionMode::Active,
                labels: result.labels(),
                detections: result.detections,
                transitioned: false,
            };
        }

        self.last_no_detection_at = Some(now);
        let quiet_since = self.last_detection_at.unwrap_or(self.mode_started_at);
        let transitioned = now.saturating_duration_since(quiet_since) > self.config.cool_down;
        if transitioned {
            self.enter(DetectionMode::Idle, now);
        }

        GateOutput {
            transitioned,
            ..GateOutput::pass_through(self.mode)
        }
    }

    fn process_idle(&mut self, frame: &Frame, now: Instant) -> GateOutput {
        self.stats.motion_checks += 1;
        let current = match motion::prepare(frame, self.config.blur_sigma) {
            Ok(gray) => gray,
            Err(e) => {
                log::warn!("motion preprocessing failed on frame {}: {:#}", frame.sequence, e);
                return GateOutput::pass_through(self.mode);
            }
        };

        let Some(prev) = self.prev_gray.take() else {
            self.prev_gray = Some(current);
            return GateOutput::pass_through(self.mode);
        };

        let diff = MotionDiff::compute(&prev, &current, self.config.binarize_cutoff);
        self.prev_gray = Some(current);
        let diff = match diff {
            Ok(diff) => diff,
            Err(e) => {
                log::warn!("motion diff failed on frame {}: {:#}", frame.sequence, e);
                return GateOutput::pass_through(self.mode);
            }
        };

        if diff.changed_pixels > self.config.motion_threshold {
            log::debug!(
                "motion {} px > {} px, waking detector",
                diff.changed_pixels,
                self.config.motion_threshold
            );
            self.enter(DetectionMode::Active, now);
            return GateOutput {
                transitioned: true,
                ..GateOutput::pass_through(self.mode)
            };
        }

        GateOutput {
            view: GateView::MotionMask(diff.mask),
            ..GateOutput::pass_through(self.mode)
        }
    }

    fn enter(&mut self, mode: DetectionMode, now: Instant) {
        log::info!("vision gate {} -> {}", self.mode, mode);
        self.mode = mode;
        self.mode_started_at = now;
        self.last_detection_at = None;
        self.last_no_detection_at = None;
        self.prev_gray = None;
        self.stats.transitions += 1;
    }
}
