//! Configuration management for the capture pipeline.
//!
//! Provides configuration loading, saving, and validation for quality
//! thresholds, framing rules, output canvas dimensions, and the ordered
//! capture step table.

use crate::types::CaptureStep;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub quality: QualityThresholds,
    pub framing: FramingConfig,
    pub canvas: CanvasConfig,
    pub steps: Vec<StepConfig>,
}

/// Thresholds for the per-frame quality heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum acceptable image width (pixels)
    pub min_width: u32,
    /// Minimum acceptable image height (pixels)
    pub min_height: u32,
    /// Minimum mean luminance, (R+G+B)/3 averaged over all pixels (0-255)
    pub min_brightness: f32,
    /// Minimum vertical-difference contrast score (blur proxy)
    pub min_contrast: f32,
}

/// Rules for judging vehicle framing from the chosen detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Minimum fraction of the image the vehicle box must cover
    pub min_area_ratio: f32,
    /// Horizontal center band, as fractions of image width; the box center
    /// must fall strictly inside (lower, upper)
    pub center_band: (f32, f32),
}

/// Output canvas for normalized frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    /// Uniform scale multiplier applied after fitting the box to the canvas;
    /// 0.9 leaves 10% padding around the subject
    pub fit_scale: f32,
}

/// One configured capture angle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub label: String,
    /// Keyword hints for optional angle-consistency checks
    #[serde(default)]
    pub angle_hints: Vec<String>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_width: 600,
            min_height: 400,
            min_brightness: 40.0,
            min_contrast: 15.0,
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.15,
            center_band: (0.25, 0.75),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fit_scale: 0.9,
        }
    }
}

/// Default 12-angle walk-around step table.
fn default_steps() -> Vec<StepConfig> {
    let table: [(&str, &[&str]); 12] = [
        ("Front", &["front", "grille"]),
        ("Front right", &["front", "right"]),
        ("Right side", &["right", "side", "lateral"]),
        ("Rear right", &["rear", "right"]),
        ("Rear", &["rear", "trunk"]),
        ("Rear left", &["rear", "left"]),
        ("Left side", &["left", "side", "lateral"]),
        ("Front left", &["front", "left"]),
        ("Front three-quarter", &["front", "quarter"]),
        ("Rear three-quarter", &["rear", "quarter"]),
        ("Roof line", &["roof", "top"]),
        ("Low front", &["front", "low"]),
    ];
    table
        .iter()
        .map(|(label, hints)| StepConfig {
            label: label.to_string(),
            angle_hints: hints.iter().map(|h| h.to_string()).collect(),
        })
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: QualityThresholds::default(),
            framing: FramingConfig::default(),
            canvas: CanvasConfig::default(),
            steps: default_steps(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("orbitshot.toml")
    }

    /// Load from the default location or fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.quality.min_width == 0 || self.quality.min_height == 0 {
            return Err("Minimum resolution must be non-zero".to_string());
        }
        if !(0.0..=255.0).contains(&self.quality.min_brightness) {
            return Err("Brightness threshold must be between 0 and 255".to_string());
        }
        if self.quality.min_contrast < 0.0 {
            return Err("Contrast threshold must be non-negative".to_string());
        }

        if !(0.0..=1.0).contains(&self.framing.min_area_ratio) {
            return Err("Area ratio must be between 0.0 and 1.0".to_string());
        }
        let (lower, upper) = self.framing.center_band;
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
            return Err("Center band must be an ordered pair within 0.0-1.0".to_string());
        }

        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err("Canvas dimensions must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.canvas.fit_scale) || self.canvas.fit_scale == 0.0 {
            return Err("Fit scale must be in (0.0, 1.0]".to_string());
        }

        if self.steps.is_empty() {
            return Err("At least one capture step is required".to_string());
        }
        if self.steps.iter().any(|s| s.label.trim().is_empty()) {
            return Err("Capture step labels must not be empty".to_string());
        }

        Ok(())
    }

    /// Materialize the configured step table as ordered `CaptureStep`s.
    pub fn capture_steps(&self) -> Vec<CaptureStep> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| CaptureStep {
                index,
                label: step.label.clone(),
                angle_hints: step.angle_hints.clone(),
            })
            .collect()
    }
}
