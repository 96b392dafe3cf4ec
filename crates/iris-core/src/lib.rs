//! Iris Core - caption reranking and segmentation overlays.
//!
//! Iris takes an image and produces two things: the best of several
//! generated captions, chosen by image/text similarity, and an annotated
//! overlay of the confidently detected object instances.
//!
//! # Architecture
//!
//! ```text
//!            ┌→ Decoder (N samples) → Dedup → Rerank (joint embedding) → Caption
//! Image → Decode
//!            └→ Detector → Filter (threshold) → Composite → Overlay
//! ```
//!
//! The model backends sit behind small traits ([`SequenceDecoder`],
//! [`JointEmbedder`], [`InstanceDetector`]) so the pipeline can run against
//! local ONNX models, an Ollama server, or in-memory fakes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use iris_core::{AnalyzeOptions, Collaborators, Config, ImageAnalyzer};
//!
//! #[tokio::main]
//! async fn main() -> iris_core::Result<()> {
//!     let config = Config::load()?;
//!     let analyzer = ImageAnalyzer::new(config, Collaborators::default())?;
//!
//!     let analysis = analyzer
//!         .analyze_path("./street.jpg".as_ref(), &AnalyzeOptions::default())
//!         .await?;
//!     println!("{:?}", analysis.report.caption);
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod config;
pub mod embedding;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod types;

pub use caption::{CandidateGenerator, OllamaDecoder, Reranker, SequenceDecoder};
pub use config::Config;
pub use embedding::{ClipEmbedder, JointEmbedder};
pub use error::{ConfigError, IrisError, PipelineError, PipelineResult, Result};
pub use output::{save_overlay, ReportFormat, ReportWriter, DEFAULT_OVERLAY_FILE};
pub use pipeline::{Analysis, AnalyzeOptions, Collaborators, ImageAnalyzer};
pub use segment::{InstanceDetector, MaskRcnnDetector, OverlayCompositor, SegmentationFilter};
pub use types::{
    AnalysisReport, AnnotatedImage, Annotation, BoundingBox, CaptionOutcome, CaptionReport,
    DetectedInstance, OverlayOutcome, RankedCaption, RetainedInstance,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
