//! Pet companion vision
//!
//! Vision side of a pet companion robot: a camera loop that only runs the
//! object detector while something is going on, plus the tooling to build
//! a cat/dog/person detector from COCO.
//!
//! # Power saving
//!
//! The detector is the expensive part. [`gate::MotionGatedDetector`] runs it
//! on every frame while it keeps finding targets and falls back to cheap
//! frame differencing after a cool-down without matches. Enough changed
//! pixels wake the detector up again.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame container
//! - `ingest`: Camera sources (V4L2, image directories, synthetic `stub://`)
//! - `detect`: Detector trait, backends (stub, YOLOv8 ONNX via tract), NMS
//! - `motion`: Blurred grayscale differencing
//! - `gate`: Active/Idle state machine around the detector
//! - `watch`: The per-frame loop (snapshots, player trigger, health logs)
//! - `dataset` / `train`: COCO to YOLO conversion and the training launcher
//! - `config` / `logging` / `cli` / `menu`: process plumbing

pub mod cli;
pub mod config;
pub mod dataset;
pub mod detect;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod logging;
pub mod menu;
pub mod motion;
pub mod player;
pub mod snapshot;
pub mod train;
pub mod ui;
pub mod watch;

pub use config::PetConfig;
pub use detect::{open_backend, DetectParams, Detection, DetectionResult, DetectorBackend};
pub use frame::Frame;
pub use gate::{DetectionMode, GateConfig, GateOutput, GateView, MotionGatedDetector};
pub use ingest::{CameraConfig, CameraSource};
pub use watch::{run_watch, WatchOptions, WatchSinks, WatchSummary};
