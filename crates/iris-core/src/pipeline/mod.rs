//! Image analysis pipeline components.
//!
//! - **validate**: Pre-decode checks (existence, size, magic bytes)
//! - **decode**: Load and decode images with limits and timeout
//! - **processor**: Orchestrates captioning and segmentation

pub mod decode;
pub mod processor;
pub mod validate;

pub use decode::{DecodedImage, ImageDecoder};
pub use processor::{
    Analysis, AnalyzeOptions, BoxedDecoder, BoxedDetector, BoxedEmbedder, Collaborators,
    ImageAnalyzer,
};
pub use validate::Validator;
