//! Image directory replay.
//!
//! Plays the `png`/`jpg`/`jpeg` files of a local directory in file-name
//! order, one per frame. The source is exhausted after the last file.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::camera::{CameraConfig, CameraStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub(crate) struct ImageDirSource {
    config: CameraConfig,
    files: Vec<PathBuf>,
    next_index: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageDirSource {
    pub(crate) fn new(config: CameraConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            next_index: 0,
            frame_count: 0,
            last_error: None,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        let dir = PathBuf::from(&self.config.device);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("open image directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                });
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", dir.display()));
        }
        files.sort();

        log::info!(
            "CameraSource: replaying {} images from {}",
            files.len(),
            dir.display()
        );
        self.files = files;
        self.next_index = 0;
        self.last_error = None;
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let path = self
            .files
            .get(self.next_index)
            .ok_or_else(|| anyhow!("image directory {} exhausted", self.config.device))?
            .clone();
        self.next_index += 1;

        let image = image::open(&path)
            .map_err(|e| {
                self.last_error = Some(e.to_string());
                anyhow!("decode {}: {}", path.display(), e)
            })?
            .to_rgb8();
        self.frame_count += 1;
        Ok(Frame::from_image(image).with_sequence(self.frame_count))
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.next_index < self.files.len()
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn replays_images_in_name_order_then_ends() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(4, 2, Rgb([200, 0, 0])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(4, 2, Rgb([0, 200, 0])).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "skip me")?;

        let mut source = ImageDirSource::new(CameraConfig {
            device: dir.path().display().to_string(),
            ..CameraConfig::default()
        });
        source.connect()?;

        assert_eq!(source.next_frame()?.pixel(0, 0), [0, 200, 0]);
        assert_eq!(source.next_frame()?.pixel(0, 0), [200, 0, 0]);
        assert!(source.next_frame().is_err());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageDirSource::new(CameraConfig {
            device: dir.path().display().to_string(),
            ..CameraConfig::default()
        });
        assert!(source.connect().is_err());
    }
}
