//! Synthetic camera (`stub://…`).
//!
//! Renders a dark, static room. A bright square "visitor" walks in for
//! `VISIT_FRAMES` frames out of every `SCENE_PERIOD`, moving a few pixels
//! per frame, so both gate modes get exercised.

use anyhow::Result;

use super::camera::{CameraConfig, CameraStats};
use crate::frame::Frame;

const BACKGROUND: u8 = 30;
const VISITOR: u8 = 235;
const SCENE_PERIOD: u64 = 140;
const VISIT_START: u64 = 80;
const STEP_PX: u64 = 4;

pub(crate) struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic {}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let phase = self.frame_count % SCENE_PERIOD;
        self.frame_count += 1;
        let pixels = self.render(phase);
        Ok(Frame::from_rgb(pixels, self.config.width, self.config.height)?
            .with_sequence(self.frame_count))
    }

    /// Visitor is on screen while `phase >= VISIT_START`.
    fn render(&self, phase: u64) -> Vec<u8> {
        let width = self.config.width as u64;
        let height = self.config.height as u64;
        let mut pixels = vec![BACKGROUND; (width * height * 3) as usize];
        if phase < VISIT_START {
            return pixels;
        }

        let size = (width.min(height) / 5).max(1);
        let travel = width.saturating_sub(size).max(1);
        let x0 = ((phase - VISIT_START) * STEP_PX) % travel;
        let y0 = (height - size) / 2;
        for y in y0..y0 + size {
            let row = (y * width) as usize;
            for x in x0..(x0 + size).min(width) {
                let idx = (row + x as usize) * 3;
                pixels[idx..idx + 3].fill(VISITOR);
            }
        }
        pixels
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
