use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::occupancy::Thresholds;

const DEFAULT_SPOTS_PATH: &str = "spots.json";
const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.1;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.05;
/// Zero keeps every decoded frame.
const DEFAULT_TARGET_FPS: u32 = 0;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_OUTPUT_DIR: &str = "out";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ParkingConfigFile {
    spots_path: Option<PathBuf>,
    thresholds: Option<ThresholdsConfigFile>,
    input: Option<InputConfigFile>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ThresholdsConfigFile {
    overlap: Option<f64>,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct InputConfigFile {
    path: Option<String>,
    target_fps: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    detections_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    vehicle_classes: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    label_spots: Option<bool>,
    show_detections: Option<bool>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ParkingConfig {
    pub spots_path: PathBuf,
    pub thresholds: Thresholds,
    pub input: InputSettings,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone)]
pub struct InputSettings {
    /// Image, video, or `stub://` path. Required before a run, not at load time.
    pub path: Option<String>,
    pub target_fps: u32,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Stub,
    Replay,
    Tract,
}

impl DetectorKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "replay" => Ok(Self::Replay),
            "tract" => Ok(Self::Tract),
            other => Err(anyhow!(
                "unknown detector backend '{}' (expected stub, replay or tract)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub model_path: Option<PathBuf>,
    pub detections_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    /// Class ids counted as vehicles; `None` keeps the backend default.
    pub vehicle_classes: Option<Vec<usize>>,
}

impl DetectorSettings {
    /// True when the detector can never report a vehicle, so every count
    /// the run prints is a placeholder.
    pub fn reports_nothing(&self) -> bool {
        self.kind == DetectorKind::Stub
    }
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub label_spots: bool,
    pub show_detections: bool,
    /// Font for spot numbers and the counter; `None` uses the built-in one.
    pub font_path: Option<PathBuf>,
}

impl ParkingConfig {
    /// Defaults, then the file named by `PARKING_CONFIG`, then `PARKING_*` env overrides.
    pub fn load() -> Result<Self> {
        let cfg = Self::load_unvalidated()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like `load`, for callers that layer more overrides (CLI flags) and
    /// call `validate` themselves.
    pub fn load_unvalidated() -> Result<Self> {
        let config_path = std::env::var("PARKING_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Load a specific config file (no env overrides).
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkingConfigFile) -> Result<Self> {
        let spots_path = file
            .spots_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPOTS_PATH));
        let thresholds = Thresholds {
            overlap: file
                .thresholds
                .as_ref()
                .and_then(|t| t.overlap)
                .unwrap_or(DEFAULT_OVERLAP_THRESHOLD),
            confidence: file
                .thresholds
                .as_ref()
                .and_then(|t| t.confidence)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        };
        let input = InputSettings {
            path: file.input.as_ref().and_then(|i| i.path.clone()),
            target_fps: file
                .input
                .as_ref()
                .and_then(|i| i.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            max_frames: file.input.as_ref().and_then(|i| i.max_frames),
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            kind: DetectorKind::parse(
                detector_file.backend.as_deref().unwrap_or(DEFAULT_DETECTOR),
            )?,
            model_path: detector_file.model_path,
            detections_path: detector_file.detections_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            vehicle_classes: detector_file.vehicle_classes,
        };
        let output = OutputSettings {
            dir: file
                .output
                .as_ref()
                .and_then(|o| o.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            label_spots: file
                .output
                .as_ref()
                .and_then(|o| o.label_spots)
                .unwrap_or(true),
            show_detections: file
                .output
                .as_ref()
                .and_then(|o| o.show_detections)
                .unwrap_or(false),
            font_path: file.output.and_then(|o| o.font_path),
        };
        Ok(Self {
            spots_path,
            thresholds,
            input,
            detector,
            output,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_nonempty("PARKING_SPOTS_PATH") {
            self.spots_path = PathBuf::from(path);
        }
        if let Some(value) = env_nonempty("PARKING_OVERLAP_THRESHOLD") {
            self.thresholds.overlap = value
                .parse()
                .map_err(|_| anyhow!("PARKING_OVERLAP_THRESHOLD must be a number"))?;
        }
        if let Some(value) = env_nonempty("PARKING_CONFIDENCE_THRESHOLD") {
            self.thresholds.confidence = value
                .parse()
                .map_err(|_| anyhow!("PARKING_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Some(input) = env_nonempty("PARKING_INPUT") {
            self.input.path = Some(input);
        }
        if let Some(value) = env_nonempty("PARKING_MAX_FRAMES") {
            let frames: u64 = value
                .parse()
                .map_err(|_| anyhow!("PARKING_MAX_FRAMES must be a whole number of frames"))?;
            self.input.max_frames = Some(frames);
        }
        if let Some(backend) = env_nonempty("PARKING_DETECTOR") {
            self.detector.kind = DetectorKind::parse(&backend)?;
        }
        if let Some(path) = env_nonempty("PARKING_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_nonempty("PARKING_DETECTIONS_PATH") {
            self.detector.detections_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = env_nonempty("PARKING_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(path) = env_nonempty("PARKING_FONT_PATH") {
            self.output.font_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Check ranges and backend prerequisites.
    pub fn validate(&self) -> Result<()> {
        if self.spots_path.as_os_str().is_empty() {
            return Err(anyhow!("spots path must not be empty"));
        }
        self.thresholds.validate()?;
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        match self.detector.kind {
            DetectorKind::Replay if self.detector.detections_path.is_none() => {
                return Err(anyhow!("replay detector requires a detections path"));
            }
            DetectorKind::Tract if self.detector.model_path.is_none() => {
                return Err(anyhow!("tract detector requires a model path"));
            }
            _ => {}
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ParkingConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
