//! Error types for Iris.
//!
//! Errors are organized by concern: configuration, the caption/segmentation
//! pipeline, and the ambient I/O around it. Pipeline errors carry enough
//! context (stage, collaborator, path) to be logged without extra wrapping.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Iris operations.
#[derive(Error, Debug)]
pub enum IrisError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding errors (writing the annotated overlay)
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors for captioning, segmentation and their surrounding stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The sequence decoder produced no usable caption candidates
    #[error("Caption generation produced no usable candidates ({requested} requested)")]
    GenerationEmpty { requested: usize },

    /// The joint embedder failed or returned an inconsistent result
    #[error("Embedding failed: {message}")]
    EmbeddingFailed { message: String },

    /// Detector output could not be composited into an overlay
    #[error("Compositing failed: {message}")]
    CompositingFailed { message: String },

    /// A collaborator (decoder, embedder, detector) failed or returned malformed output
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: String,
        message: String,
        /// HTTP status for network-backed collaborators, when known
        status_code: Option<u16>,
    },

    /// Caller-supplied arguments violate an operation's preconditions
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Model files missing or failed to load
    #[error("Model error: {message}")]
    Model { message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl PipelineError {
    /// Shorthand for a collaborator failure without an HTTP status.
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            message: message.into(),
            status_code: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Reclassify an arbitrary collaborator-side error as `CollaboratorUnavailable`.
    ///
    /// Errors that already carry that classification pass through unchanged.
    pub fn into_collaborator(self, collaborator: &str) -> Self {
        match self {
            err @ Self::CollaboratorUnavailable { .. } => err,
            other => Self::collaborator(collaborator, other.to_string()),
        }
    }
}

/// Convenience type alias for Iris results.
pub type Result<T> = std::result::Result<T, IrisError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_empty_message() {
        let err = PipelineError::GenerationEmpty { requested: 3 };
        assert!(err.to_string().contains("3 requested"));
    }

    #[test]
    fn test_collaborator_shorthand() {
        let err = PipelineError::collaborator("detector", "mask grid is empty");
        match &err {
            PipelineError::CollaboratorUnavailable {
                collaborator,
                status_code,
                ..
            } => {
                assert_eq!(collaborator, "detector");
                assert!(status_code.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(err.to_string(), "detector unavailable: mask grid is empty");
    }

    #[test]
    fn test_into_collaborator_wraps_other_kinds() {
        let err = PipelineError::Model {
            message: "visual.onnx missing".to_string(),
        }
        .into_collaborator("clip");
        assert!(matches!(
            err,
            PipelineError::CollaboratorUnavailable { ref collaborator, .. } if collaborator == "clip"
        ));

        let passthrough = PipelineError::CollaboratorUnavailable {
            collaborator: "ollama".to_string(),
            message: "HTTP 503".to_string(),
            status_code: Some(503),
        }
        .into_collaborator("decoder");
        assert!(matches!(
            passthrough,
            PipelineError::CollaboratorUnavailable {
                status_code: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_pipeline_error_converts_to_iris_error() {
        let err: IrisError = PipelineError::invalid_input("threshold 1.5").into();
        assert!(err.to_string().starts_with("Pipeline error"));
    }
}
