use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{DetectParams, COCO_CAT, COCO_DOG, COCO_PERSON};
use crate::gate::GateConfig;
use crate::motion::{DEFAULT_BINARIZE_CUTOFF, DEFAULT_BLUR_SIGMA};

const DEFAULT_BASE_DIR: &str = ".";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_DETECT_MODEL: &str = "yolov8n.onnx";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_DETECT_IOU: f32 = 0.65;
const DEFAULT_DETECT_IMGSZ: u32 = 480;
const DEFAULT_COOL_DOWN_SECS: f64 = 5.0;
const DEFAULT_MOTION_THRESHOLD: u64 = 5_000;
const DEFAULT_PROJECT_NAME: &str = "pet_vision";
const DEFAULT_DATASET_YAML: &str = "pet.yaml";
const DEFAULT_TRAIN_PROGRAM: &str = "yolo";
const DEFAULT_TRAIN_MODEL: &str = "yolov8n.pt";
const DEFAULT_TRAIN_EPOCHS: u32 = 100;
const DEFAULT_TRAIN_IMGSZ: u32 = 640;
const DEFAULT_TRAIN_DEVICE: &str = "cpu";
const DEFAULT_TRAIN_CONF: f32 = 0.5;
const DEFAULT_TRAIN_IOU: f32 = 0.6;
const DEFAULT_PLAYER_SECS: u64 = 3;

#[derive(Debug, Deserialize, Default)]
struct PetConfigFile {
    base_dir: Option<PathBuf>,
    log: Option<LogConfigFile>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    gate: Option<GateConfigFile>,
    dataset: Option<DatasetConfigFile>,
    train: Option<TrainConfigFile>,
    player: Option<PlayerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct LogConfigFile {
    file: Option<PathBuf>,
    level: Option<String>,
    stderr: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model: Option<PathBuf>,
    confidence: Option<f32>,
    iou: Option<f32>,
    input_size: Option<u32>,
    classes: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    cool_down_secs: Option<f64>,
    motion_threshold: Option<u64>,
    binarize_cutoff: Option<u8>,
    blur_sigma: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DatasetConfigFile {
    target_classes: Option<Vec<String>>,
    coco_root: Option<PathBuf>,
    project_name: Option<String>,
    yaml_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TrainConfigFile {
    program: Option<String>,
    model: Option<PathBuf>,
    epochs: Option<u32>,
    imgsz: Option<u32>,
    device: Option<String>,
    conf: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct PlayerConfigFile {
    clip: Option<String>,
    seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PetConfig {
    pub base_dir: PathBuf,
    pub log: LogSettings,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub gate: GateConfig,
    pub dataset: DatasetSettings,
    pub train: TrainSettings,
    pub player: PlayerSettings,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Append log records here. `None` logs to stderr.
    pub file: Option<PathBuf>,
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub params: DetectParams,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR_BACKEND.to_string(),
            model_path: PathBuf::from("models").join(DEFAULT_DETECT_MODEL),
            params: DetectParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    /// Class names kept from COCO; position is the YOLO class index.
    pub target_classes: Vec<String>,
    pub coco_root: PathBuf,
    /// Converted dataset root (`train/` and `val/` below it).
    pub out_dir: PathBuf,
    pub yaml_path: PathBuf,
}

/// One COCO split and where its YOLO rendition goes.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPaths {
    pub name: &'static str,
    pub annotations: PathBuf,
    pub images: PathBuf,
    pub out_images: PathBuf,
    pub out_labels: PathBuf,
}

impl DatasetSettings {
    pub fn train_split(&self) -> SplitPaths {
        SplitPaths {
            name: "train",
            annotations: self
                .coco_root
                .join("annotations")
                .join("instances_train2017.json"),
            images: self.coco_root.join("train").join("data"),
            out_images: self.out_dir.join("train").join("images"),
            out_labels: self.out_dir.join("train").join("labels"),
        }
    }

    pub fn val_split(&self) -> SplitPaths {
        SplitPaths {
            name: "val",
            annotations: self
                .coco_root
                .join("annotations")
                .join("instances_val2017.json"),
            images: self.coco_root.join("validation").join("data"),
            out_images: self.out_dir.join("val").join("images"),
            out_labels: self.out_dir.join("val").join("labels"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub program: String,
    pub model: PathBuf,
    pub data: PathBuf,
    pub epochs: u32,
    pub imgsz: u32,
    pub device: String,
    pub conf: f32,
    pub iou: f32,
    pub project: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Clip played when a pet shows up. `None` disables playback.
    pub clip: Option<String>,
    pub duration: Duration,
}

impl PetConfig {
    /// Load from `PET_CONFIG` (if set), then apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PET_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PetConfigFile) -> Result<Self> {
        // PET_BASE_DIR beats the file: every derived directory hangs off it.
        let base_dir = std::env::var("PET_BASE_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or(file.base_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
        let models_dir = base_dir.join("models");
        let data_dir = base_dir.join("data");
        let logs_dir = base_dir.join("logs");
        let yaml_dir = data_dir.join("yaml");

        let log_file = file.log.unwrap_or_default();
        let log = LogSettings {
            file: if log_file.stderr.unwrap_or(false) {
                None
            } else {
                Some(log_file.file.unwrap_or_else(|| logs_dir.join("app.log")))
            },
            level: log_file
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: resolve(
                &models_dir,
                detector_file
                    .model
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECT_MODEL)),
            ),
            params: DetectParams {
                confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                iou: detector_file.iou.unwrap_or(DEFAULT_DETECT_IOU),
                classes: detector_file
                    .classes
                    .unwrap_or_else(|| vec![COCO_PERSON, COCO_CAT, COCO_DOG]),
                input_size: detector_file.input_size.unwrap_or(DEFAULT_DETECT_IMGSZ),
            },
        };

        let gate_file = file.gate.unwrap_or_default();
        let gate = GateConfig {
            cool_down: secs_to_duration(
                gate_file.cool_down_secs.unwrap_or(DEFAULT_COOL_DOWN_SECS),
                "gate.cool_down_secs",
            )?,
            motion_threshold: gate_file
                .motion_threshold
                .unwrap_or(DEFAULT_MOTION_THRESHOLD),
            binarize_cutoff: gate_file.binarize_cutoff.unwrap_or(DEFAULT_BINARIZE_CUTOFF),
            blur_sigma: gate_file.blur_sigma.unwrap_or(DEFAULT_BLUR_SIGMA),
        };

        let dataset_file = file.dataset.unwrap_or_default();
        let project_name = dataset_file
            .project_name
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        let dataset = DatasetSettings {
            target_classes: dataset_file.target_classes.unwrap_or_else(|| {
                vec!["cat".to_string(), "dog".to_string(), "person".to_string()]
            }),
            coco_root: resolve(
                &yaml_dir,
                dataset_file
                    .coco_root
                    .unwrap_or_else(|| PathBuf::from("coco2017")),
            ),
            out_dir: yaml_dir.join(&project_name),
            yaml_path: yaml_dir.join(
                dataset_file
                    .yaml_name
                    .unwrap_or_else(|| DEFAULT_DATASET_YAML.to_string()),
            ),
        };

        let train_file = file.train.unwrap_or_default();
        let train = TrainSettings {
            program: train_file
                .program
                .unwrap_or_else(|| DEFAULT_TRAIN_PROGRAM.to_string()),
            model: resolve(
                &models_dir,
                train_file
                    .model
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TRAIN_MODEL)),
            ),
            data: dataset.yaml_path.clone(),
            epochs: train_file.epochs.unwrap_or(DEFAULT_TRAIN_EPOCHS),
            imgsz: train_file.imgsz.unwrap_or(DEFAULT_TRAIN_IMGSZ),
            device: train_file
                .device
                .unwrap_or_else(|| DEFAULT_TRAIN_DEVICE.to_string()),
            conf: train_file.conf.unwrap_or(DEFAULT_TRAIN_CONF),
            iou: train_file.iou.unwrap_or(DEFAULT_TRAIN_IOU),
            project: dataset.out_dir.clone(),
        };

        let player_file = file.player.unwrap_or_default();
        let player = PlayerSettings {
            clip: player_file.clip,
            duration: Duration::from_secs(player_file.seconds.unwrap_or(DEFAULT_PLAYER_SECS)),
        };

        Ok(Self {
            base_dir,
            log,
            camera,
            detector,
            gate,
            dataset,
            train,
            player,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("PET_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(backend) = std::env::var("PET_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(model) = std::env::var("PET_MODEL_PATH") {
            if !model.trim().is_empty() {
                self.detector.model_path = PathBuf::from(model);
            }
        }
        if let Ok(path) = std::env::var("PET_LOG_FILE") {
            self.log.file = if path.trim().is_empty() || path == "-" {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(cool_down) = std::env::var("PET_COOL_DOWN_SECS") {
            let seconds: f64 = cool_down
                .parse()
                .map_err(|_| anyhow!("PET_COOL_DOWN_SECS must be a number of seconds"))?;
            self.gate.cool_down = secs_to_duration(seconds, "PET_COOL_DOWN_SECS")?;
        }
        if let Ok(threshold) = std::env::var("PET_MOTION_THRESHOLD") {
            self.gate.motion_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("PET_MOTION_THRESHOLD must be a pixel count"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let params = &self.detector.params;
        if !(params.confidence > 0.0 && params.confidence <= 1.0) {
            return Err(anyhow!("detector.confidence must be in (0, 1]"));
        }
        if !(params.iou > 0.0 && params.iou <= 1.0) {
            return Err(anyhow!("detector.iou must be in (0, 1]"));
        }
        if params.input_size == 0 || params.input_size % 32 != 0 {
            return Err(anyhow!(
                "detector.input_size must be a positive multiple of 32 (got {})",
                params.input_size
            ));
        }
        if params.classes.is_empty() {
            return Err(anyhow!("detector.classes must not be empty"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera.target_fps must be >= 1"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera.width and camera.height must be > 0"));
        }
        if !(self.gate.blur_sigma > 0.0) {
            return Err(anyhow!("gate.blur_sigma must be > 0"));
        }
        if self.dataset.target_classes.is_empty() {
            return Err(anyhow!("dataset.target_classes must not be empty"));
        }
        if self.train.epochs == 0 {
            return Err(anyhow!("train.epochs must be >= 1"));
        }
        Ok(())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir.join("models")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Directory snapshots are written to.
    pub fn result_dir(&self) -> PathBuf {
        self.data_dir().join("result")
    }

    /// Create the data layout the tools write into.
    pub fn ensure_dirs(&self) -> Result<()> {
        let data = self.data_dir();
        let train = self.dataset.train_split();
        let val = self.dataset.val_split();
        let dirs = [
            data.join("raw"),
            data.join("result"),
            data.join("yaml"),
            data.join("weights"),
            self.models_dir(),
            self.logs_dir(),
            train.out_images,
            train.out_labels,
            val.out_images,
            val.out_labels,
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

fn resolve(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn secs_to_duration(seconds: f64, what: &str) -> Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds", what));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| anyhow!("{} is too large ({} seconds)", what, seconds))
}

fn read_config_file(path: &Path) -> Result<PetConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
