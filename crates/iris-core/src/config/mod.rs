//! Configuration management for Iris.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every field, so a missing file or a partial file both work.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Iris.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Caption candidate settings
    pub caption: CaptionConfig,

    /// Sequence decoder backend
    pub decoder: DecoderConfig,

    /// Joint embedding model settings
    pub embedding: EmbeddingConfig,

    /// Instance segmentation settings
    pub segmentation: SegmentationConfig,

    /// Overlay rendering settings
    pub overlay: OverlayConfig,

    /// Resource limits and timeouts
    pub limits: LimitsConfig,

    /// Retry settings
    pub pipeline: PipelineConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.iris.iris/config.toml
    /// - Linux: ~/.config/iris/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\iris\config\config.toml
    ///
    /// Falls back to ~/.iris/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "iris", "iris")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".iris").join("config.toml")
            })
    }

    /// Get the resolved model directory path (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        let path_str = self.general.model_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Directory holding the joint embedder's ONNX towers and tokenizer.
    pub fn embedding_model_dir(&self) -> PathBuf {
        self.model_dir().join(&self.embedding.model)
    }

    /// Directory holding the instance detector's ONNX model.
    pub fn segmentation_model_dir(&self) -> PathBuf {
        self.model_dir().join(&self.segmentation.model)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
