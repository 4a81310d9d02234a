//! Cheap frame differencing used while the gate is idle.
//!
//! grayscale -> Gaussian blur -> |prev - current| -> binarize -> count.

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::frame::Frame;

/// Default binarization cutoff on the absolute difference.
pub const DEFAULT_BINARIZE_CUTOFF: u8 = 127;

/// Sigma matching a 21x21 Gaussian kernel.
pub const DEFAULT_BLUR_SIGMA: f32 = 3.5;

/// Luma conversion of a frame.
pub fn to_gray(frame: &Frame) -> Result<GrayImage> {
    Ok(image::imageops::grayscale(&frame.to_rgb_image()?))
}

/// Grayscale plus blur, the reference image kept between idle frames.
pub fn prepare(frame: &Frame, sigma: f32) -> Result<GrayImage> {
    if sigma <= 0.0 {
        return Err(anyhow!("blur sigma must be > 0"));
    }
    Ok(gaussian_blur_f32(&to_gray(frame)?, sigma))
}

/// Result of differencing two prepared frames.
#[derive(Clone, Debug)]
pub struct MotionDiff {
    /// Binarized difference: 255 where the change exceeded the cutoff, else 0.
    pub mask: GrayImage,
    /// Number of 255 pixels in `mask`.
    pub changed_pixels: u64,
}

impl MotionDiff {
    pub fn compute(prev: &GrayImage, current: &GrayImage, cutoff: u8) -> Result<Self> {
        if prev.dimensions() != current.dimensions() {
            return Err(anyhow!(
                "motion reference is {}x{}, frame is {}x{}",
                prev.width(),
                prev.height(),
                current.width(),
                current.height()
            ));
        }

        let (width, height) = current.dimensions();
        let mut mask = GrayImage::new(width, height);
        let mut changed_pixels = 0u64;
        for ((out, a), b) in mask.pixels_mut().zip(prev.pixels()).zip(current.pixels()) {
            if a.0[0].abs_diff(b.0[0]) > cutoff {
                *out = Luma([255]);
                changed_pixels += 1;
            }
        }

        Ok(Self {
            mask,
            changed_pixels,
        })
    }
}
