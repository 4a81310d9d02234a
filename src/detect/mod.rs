mod annotate;
mod backend;
mod backends;
mod classes;
mod result;

pub use annotate::annotate;
pub use backend::{open_backend, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use classes::{class_name, COCO_CAT, COCO_DOG, COCO_PERSON, PET_CLASSES};
pub use result::{DetectParams, Detection, DetectionResult};
