//! COCO to YOLO dataset conversion.
//!
//! Keeps only the annotations of a set of target classes and writes one
//! `labels/<stem>.txt` per image:
//!
//! ```text
//! <class_index> <x_center> <y_center> <width> <height>
//! ```
//!
//! Geometry is normalized to [0, 1] by the image size; the class index is the
//! position of the class name in the target list. Label files are truncated on
//! write, so re-running a conversion overwrites instead of duplicating.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::SplitPaths;

#[derive(Debug, Deserialize)]
pub struct CocoDataset {
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct CocoAnnotation {
    pub image_id: u64,
    pub category_id: u64,
    /// `[x_min, y_min, width, height]` in pixels.
    pub bbox: [f64; 4],
}

#[derive(Debug, Deserialize)]
pub struct CocoCategory {
    pub id: u64,
    pub name: String,
}

/// Convert a COCO corner box to YOLO center form, normalized by image size.
pub fn normalize_bbox(bbox: [f64; 4], img_w: f64, img_h: f64) -> (f64, f64, f64, f64) {
    let [x_min, y_min, w, h] = bbox;
    let x_center = (x_min + w / 2.0) / img_w;
    let y_center = (y_min + h / 2.0) / img_h;
    (x_center, y_center, w / img_w, h / img_h)
}

/// Counters for one converted split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Images with at least one kept annotation.
    pub images: u64,
    pub labels: u64,
    pub annotations: u64,
    pub missing_images: u64,
    pub failures: u64,
}

/// Dataset description read by the trainer.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DatasetYaml {
    pub path: PathBuf,
    pub train: PathBuf,
    pub val: PathBuf,
    pub names: BTreeMap<usize, String>,
}

pub struct CocoToYolo {
    target_classes: Vec<String>,
}

impl CocoToYolo {
    pub fn new(target_classes: Vec<String>) -> Result<Self> {
        if target_classes.is_empty() {
            return Err(anyhow!("at least one target class is required"));
        }
        Ok(Self { target_classes })
    }

    fn class_index(&self, name: &str) -> Option<usize> {
        self.target_classes.iter().position(|c| c == name)
    }

    /// Convert one split. Missing annotation files are an error; per-image
    /// I/O failures are logged and counted.
    pub fn convert(&self, split: &SplitPaths) -> Result<ConversionStats> {
        let dataset = load_coco(&split.annotations)?;
        for dir in [&split.out_images, &split.out_labels] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let category_to_class: HashMap<u64, usize> = dataset
            .categories
            .iter()
            .filter_map(|cat| self.class_index(&cat.name).map(|idx| (cat.id, idx)))
            .collect();

        let mut by_image: HashMap<u64, Vec<&CocoAnnotation>> = HashMap::new();
        for ann in &dataset.annotations {
            if category_to_class.contains_key(&ann.category_id) {
                by_image.entry(ann.image_id).or_default().push(ann);
            }
        }

        let mut stats = ConversionStats::default();
        for image in &dataset.images {
            let Some(annotations) = by_image.get(&image.id) else {
                continue;
            };
            stats.images += 1;

            match self.write_image(split, image, annotations, &category_to_class) {
                Ok(copied) => {
                    stats.labels += 1;
                    stats.annotations += annotations.len() as u64;
                    if !copied {
                        stats.missing_images += 1;
                    }
                }
                Err(e) => {
                    stats.failures += 1;
                    log::error!("{} split: could not convert {}: {:#}", split.name, image.file_name, e);
                }
            }
        }

        log::info!(
            "{} split: {} images, {} annotations, {} missing images, {} failures -> {}",
            split.name,
            stats.images,
            stats.annotations,
            stats.missing_images,
            stats.failures,
            split.out_labels.display()
        );
        Ok(stats)
    }

    /// Returns whether the source image existed and was copied.
    fn write_image(
        &self,
        split: &SplitPaths,
        image: &CocoImage,
        annotations: &[&CocoAnnotation],
        category_to_class: &HashMap<u64, usize>,
    ) -> Result<bool> {
        if image.width == 0 || image.height == 0 {
            return Err(anyhow!("image has zero size"));
        }

        let src = split.images.join(&image.file_name);
        let copied = src.is_file();
        if copied {
            let dst = split.out_images.join(&image.file_name);
            std::fs::copy(&src, &dst)
                .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
        }

        let mut contents = String::new();
        for ann in annotations {
            let Some(class_idx) = category_to_class.get(&ann.category_id) else {
                continue;
            };
            let (xc, yc, w, h) =
                normalize_bbox(ann.bbox, image.width as f64, image.height as f64);
            writeln!(contents, "{} {:.6} {:.6} {:.6} {:.6}", class_idx, xc, yc, w, h)?;
        }

        let stem = Path::new(&image.file_name)
            .file_stem()
            .ok_or_else(|| anyhow!("image file name has no stem"))?;
        let label_path = split
            .out_labels
            .join(format!("{}.txt", stem.to_string_lossy()));
        std::fs::write(&label_path, contents)
            .with_context(|| format!("write {}", label_path.display()))?;
        Ok(copied)
    }

    pub fn dataset_yaml(&self, root: &Path, train_images: &Path, val_images: &Path) -> DatasetYaml {
        DatasetYaml {
            path: root.to_path_buf(),
            train: train_images.to_path_buf(),
            val: val_images.to_path_buf(),
            names: self
                .target_classes
                .iter()
                .cloned()
                .enumerate()
                .collect(),
        }
    }

    pub fn write_dataset_yaml(
        &self,
        yaml_path: &Path,
        root: &Path,
        train_images: &Path,
        val_images: &Path,
    ) -> Result<()> {
        let yaml = serde_yaml::to_string(&self.dataset_yaml(root, train_images, val_images))?;
        if let Some(parent) = yaml_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(yaml_path, yaml)
            .with_context(|| format!("write dataset yaml {}", yaml_path.display()))?;
        log::info!("dataset yaml written to {}", yaml_path.display());
        Ok(())
    }
}

fn load_coco(path: &Path) -> Result<CocoDataset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read COCO annotations {}", path.display()))?;
    if raw.trim().is_empty() {
        return Err(anyhow!("COCO annotations {} are empty", path.display()));
    }
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid COCO annotations {}", path.display()))
}
