use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::classes::COCO_CAT;
use crate::detect::result::{DetectParams, Detection, DetectionResult};
use crate::frame::Frame;

const DEFAULT_LUMA_CUTOFF: u8 = 200;

/// Stub backend for synthetic runs and tests.
///
/// Reports the bounding box of all bright pixels as a single detection of a
/// fixed class. Confidence is the fraction of the box covered by bright
/// pixels, so a solid square scores 1.0 and scattered noise scores low.
pub struct StubBackend {
    class_id: usize,
    luma_cutoff: u8,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            class_id: COCO_CAT,
            luma_cutoff: DEFAULT_LUMA_CUTOFF,
        }
    }

    pub fn with_class(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<DetectionResult> {
        if !params.allows(self.class_id) {
            return Ok(DetectionResult::default());
        }

        let mut bright = 0u64;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let [r, g, b] = frame.pixel(x, y);
                if luma(r, g, b) > self.luma_cutoff {
                    bright += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if bright == 0 {
            return Ok(DetectionResult::default());
        }

        let w = (max_x - min_x + 1) as f32;
        let h = (max_y - min_y + 1) as f32;
        let confidence = bright as f32 / (w * h);
        if confidence < params.confidence {
            return Ok(DetectionResult::default());
        }

        Ok(DetectionResult::new(vec![Detection {
            class_id: self.class_id,
            confidence,
            x: min_x as f32,
            y: min_y as f32,
            w,
            h,
        }]))
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}
