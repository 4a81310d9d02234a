//! Camera frame sources.
//!
//! - Synthetic scene (`stub://…`) for demos and tests
//! - Image directory replay (a local directory of png/jpg files)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source produces RGB24 `Frame`s on demand. Opening a source that
//! cannot deliver frames is a startup error; a failed read ends the watch
//! loop.

mod camera;
mod images;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats};
