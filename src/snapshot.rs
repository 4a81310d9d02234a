use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

const PREFIX: &str = "pet_snap";

/// Writes PNG snapshots named `pet_snap_<YYYYmmdd_HHMMSS>.png`.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `image`. Never overwrites: a second snapshot within the same
    /// second gets a `_1`, `_2`, ... suffix.
    pub fn save(&self, image: &RgbImage) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self.free_path(&stamp);
        image
            .save(&path)
            .with_context(|| format!("could not save snapshot to {}", path.display()))?;
        log::info!("snapshot saved to {}", path.display());
        Ok(path)
    }

    fn free_path(&self, stamp: &str) -> PathBuf {
        let base = self.dir.join(format!("{PREFIX}_{stamp}.png"));
        if !base.exists() {
            return base;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("{PREFIX}_{stamp}_{n}.png")))
            .find(|path| !path.exists())
            .unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn snapshots_do_not_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = SnapshotWriter::new(dir.path().join("result"));
        let image = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));

        let first = writer.save(&image)?;
        let second = writer.free_path("20240101_000000");
        assert_ne!(first, second);
        std::fs::write(&second, b"taken")?;
        assert!(writer
            .free_path("20240101_000000")
            .ends_with("pet_snap_20240101_000000_1.png"));

        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pet_snap_") && name.ends_with(".png"));
        assert_eq!(image::open(&first)?.to_rgb8().get_pixel(0, 0).0, [9, 9, 9]);
        Ok(())
    }
}
