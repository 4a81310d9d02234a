#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{non_max_suppression, DetectParams, Detection, DetectionResult};
use crate::frame::Frame;

const CXYWH_OFFSET: usize = 4;
const LETTERBOX_FILL: f32 = 144.0 / 255.0;

/// Tract-based YOLOv8 backend.
///
/// Loads a local ONNX export with a fixed square input and a single
/// `[1, 4 + nc, anchors]` output. Frames are letterboxed (top-left aligned)
/// into the model input, and boxes are scaled back to frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    /// Returns the resize ratio applied to the frame.
    fn build_input(&self, frame: &Frame) -> Result<(Tensor, f32)> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let size = self.input_size as f32;
        let ratio = (size / frame.width as f32).min(size / frame.height as f32);
        let new_w = ((frame.width as f32 * ratio).round() as u32).clamp(1, self.input_size);
        let new_h = ((frame.height as f32 * ratio).round() as u32).clamp(1, self.input_size);

        let resized = image::imageops::resize(
            &frame.to_rgb_image()?,
            new_w,
            new_h,
            FilterType::Triangle,
        );

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            if x < new_w as usize && y < new_h as usize {
                resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
            } else {
                LETTERBOX_FILL
            }
        });

        Ok((input.into_tensor(), ratio))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        ratio: f32,
        frame: &Frame,
        params: &DetectParams,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let preds = preds
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|_| anyhow!("unexpected YOLO output rank {}", output.rank()))?;
        let shape = preds.shape().to_vec();
        if shape[1] <= CXYWH_OFFSET {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let num_classes = shape[1] - CXYWH_OFFSET;
        let frame_w = frame.width as f32;
        let frame_h = frame.height as f32;

        let mut detections = Vec::new();
        for anchor in 0..shape[2] {
            let (class_id, confidence) = (0..num_classes)
                .map(|c| (c, preds[[0, CXYWH_OFFSET + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, candidate| {
                    if candidate.1 > best.1 {
                        candidate
                    } else {
                        best
                    }
                });
            if confidence < params.confidence || !params.allows(class_id) {
                continue;
            }

            let cx = preds[[0, 0, anchor]] / ratio;
            let cy = preds[[0, 1, anchor]] / ratio;
            let w = preds[[0, 2, anchor]] / ratio;
            let h = preds[[0, 3, anchor]] / ratio;
            let x = (cx - w / 2.0).clamp(0.0, frame_w);
            let y = (cy - h / 2.0).clamp(0.0, frame_h);
            detections.push(Detection {
                class_id,
                confidence,
                x,
                y,
                w: w.min(frame_w - x),
                h: h.min(frame_h - y),
            });
        }

        non_max_suppression(&mut detections, params.iou);
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<DetectionResult> {
        let (input, ratio) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, ratio, frame, params)?;
        Ok(DetectionResult::new(detections))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::from_elem((1, 3, side, side), LETTERBOX_FILL);
        self.model
            .run(tvec!(blank.into_tensor().into()))
            .context("ONNX warm-up inference failed")?;
        Ok(())
    }
}
