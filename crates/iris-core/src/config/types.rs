//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where ONNX models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.iris/models"),
        }
    }
}

/// Caption candidate generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Number of sequences requested from the decoder per image
    pub num_candidates: usize,

    /// Caption shown when generation or reranking fails
    pub placeholder: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            num_candidates: 3,
            placeholder: "Unable to generate caption".to_string(),
        }
    }
}

/// Sequence decoder backend (a local Ollama vision model).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Vision model name
    pub model: String,

    /// Instruction sent with every image
    pub prompt: String,

    /// Sampling temperature; > 0 so repeated samples differ
    pub temperature: f32,

    /// Upper bound on generated tokens per caption
    pub max_new_tokens: u32,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            prompt: "Write one short caption describing this image. \
                     Reply with the caption only."
                .to_string(),
            temperature: 0.7,
            max_new_tokens: 40,
            request_timeout_ms: 60000,
        }
    }
}

/// Joint embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model directory name under `general.model_dir`
    pub model: String,

    /// Square input size of the vision tower
    pub image_size: u32,

    /// Token length the text tower was exported with
    pub max_text_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "clip-vit-base-patch32".to_string(),
            image_size: 224,
            max_text_length: 77,
        }
    }
}

/// Instance segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Model directory name under `general.model_dir`
    pub model: String,

    /// Confidence threshold for instances and mask pixels
    pub threshold: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model: "maskrcnn-resnet50-fpn".to_string(),
            threshold: 0.7,
        }
    }
}

/// How overlay colors are assigned to instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorPolicy {
    /// Fixed high-contrast palette indexed by instance order
    #[default]
    Palette,
    /// Pseudorandom color per instance (seedable)
    Random,
}

/// Overlay rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Color assignment policy
    pub colors: ColorPolicy,

    /// Seed for the random policy; unseeded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Label font size in pixels
    pub font_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            colors: ColorPolicy::Palette,
            seed: None,
            font_size: 16.0,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Timeout around the whole generate + rerank chain
    pub caption_timeout_ms: u64,

    /// Timeout around the whole detect + filter + composite chain
    pub segment_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            caption_timeout_ms: 120000,
            segment_timeout_ms: 60000,
        }
    }
}

/// Retry settings for network-backed collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default report format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
