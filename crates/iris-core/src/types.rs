//! Core data types shared by the caption and segmentation stages.
//!
//! Rasters are `image::RgbImage`; probability and binary masks are row-major
//! `ndarray::Array2` grids with shape `(height, width)`.

use image::RgbImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PipelineError, PipelineResult};

// ── Captioning ─────────────────────────────────────────────────────────────

/// A caption candidate paired with its cosine similarity to the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCaption {
    /// Candidate text as produced by the decoder (trimmed)
    pub text: String,

    /// Cosine similarity in the joint embedding space, in [-1, 1]
    pub score: f32,
}

impl RankedCaption {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Result of a successful caption run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionReport {
    /// Head of the ranked list: highest score, first-seen on ties
    pub best: RankedCaption,

    /// Every unique candidate, sorted by score descending (stable)
    pub ranked: Vec<RankedCaption>,

    /// Every unique candidate in the order the decoder produced it
    pub suggestions: Vec<String>,
}

/// Caption result after the caller's fallback policy has been applied.
#[derive(Debug, Clone)]
pub enum CaptionOutcome {
    /// Captions were generated and reranked
    Ranked(CaptionReport),

    /// Generation or reranking failed; a placeholder stands in
    Fallback { caption: String, reason: String },
}

impl CaptionOutcome {
    /// The caption to display, real or placeholder.
    pub fn caption(&self) -> &str {
        match self {
            Self::Ranked(report) => &report.best.text,
            Self::Fallback { caption, .. } => caption,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

// ── Segmentation ───────────────────────────────────────────────────────────

/// Axis-aligned box in integer pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a box, rejecting inverted or empty extents.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> PipelineResult<Self> {
        let bbox = Self { x1, y1, x2, y2 };
        if !bbox.is_valid() {
            return Err(PipelineError::invalid_input(format!(
                "bounding box ({x1}, {y1}, {x2}, {y2}) must satisfy x1 < x2 and y1 < y2"
            )));
        }
        Ok(bbox)
    }

    pub fn is_valid(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

/// One raw instance as reported by the instance detector.
#[derive(Debug, Clone)]
pub struct DetectedInstance {
    /// Per-pixel probabilities in [0, 1], shape `(height, width)`.
    /// May be at a different resolution than the source image.
    pub mask: Array2<f32>,
    pub bbox: BoundingBox,
    /// Category identifier (e.g. a COCO class id)
    pub label: u32,
    pub confidence: f32,
}

impl DetectedInstance {
    /// Mask resolution as `(width, height)`.
    pub fn mask_dimensions(&self) -> (u32, u32) {
        let (h, w) = self.mask.dim();
        (w as u32, h as u32)
    }
}

/// An instance that passed the confidence threshold, with its mask binarized
/// at source-image resolution.
#[derive(Debug, Clone)]
pub struct RetainedInstance {
    /// `true` where the source probability exceeded the threshold
    pub mask: Array2<bool>,
    pub bbox: BoundingBox,
    pub label: u32,
    pub confidence: f32,
}

impl RetainedInstance {
    /// Mask resolution as `(width, height)`.
    pub fn mask_dimensions(&self) -> (u32, u32) {
        let (h, w) = self.mask.dim();
        (w as u32, h as u32)
    }

    /// Number of "on" pixels in the mask.
    pub fn mask_pixels(&self) -> usize {
        self.mask.iter().filter(|on| **on).count()
    }
}

/// Record of one instance drawn onto an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub label: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,

    /// RGB color used for mask, box and label
    pub color: [u8; 3],

    /// Rendered label text
    pub text: String,

    /// Label baseline anchor `(x, y)`; `y` never less than 15
    pub label_anchor: (i32, i32),

    /// Number of mask pixels blended
    pub mask_pixels: usize,
}

/// A composited raster plus what was drawn on it.
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    /// Same dimensions as the source image
    pub image: RgbImage,
    pub annotations: Vec<Annotation>,
}

/// Segmentation result after the "always return something renderable" policy.
#[derive(Debug, Clone)]
pub enum OverlayOutcome {
    /// Instances were filtered and composited
    Composited(AnnotatedImage),

    /// Something failed; the unmodified source image is returned instead
    Degraded { image: RgbImage, reason: String },
}

impl OverlayOutcome {
    /// The raster to render, annotated or original.
    pub fn image(&self) -> &RgbImage {
        match self {
            Self::Composited(annotated) => &annotated.image,
            Self::Degraded { image, .. } => image,
        }
    }

    pub fn into_image(self) -> RgbImage {
        match self {
            Self::Composited(annotated) => annotated.image,
            Self::Degraded { image, .. } => image,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            Self::Composited(annotated) => &annotated.annotations,
            Self::Degraded { .. } => &[],
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Composited(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

// ── Reports ────────────────────────────────────────────────────────────────

/// Serializable caption section of an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSection {
    pub best: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ranked: Vec<RankedCaption>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,

    /// Why the placeholder was used, when it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl From<&CaptionOutcome> for CaptionSection {
    fn from(outcome: &CaptionOutcome) -> Self {
        match outcome {
            CaptionOutcome::Ranked(report) => Self {
                best: report.best.text.clone(),
                ranked: report.ranked.clone(),
                suggestions: report.suggestions.clone(),
                fallback_reason: None,
            },
            CaptionOutcome::Fallback { caption, reason } => Self {
                best: caption.clone(),
                ranked: vec![],
                suggestions: vec![],
                fallback_reason: Some(reason.clone()),
            },
        }
    }
}

/// Serializable segmentation section of an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationSection {
    pub threshold: f32,
    pub instances: Vec<Annotation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl SegmentationSection {
    pub fn from_outcome(threshold: f32, outcome: &OverlayOutcome) -> Self {
        Self {
            threshold,
            instances: outcome.annotations().to_vec(),
            degraded_reason: outcome.degraded_reason().map(str::to_string),
        }
    }
}

/// The complete, serializable output for one analyzed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Path to the source file
    pub file_path: PathBuf,

    /// Just the filename portion
    pub file_name: String,

    /// Container format sniffed from the file's magic bytes
    pub format: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<CaptionSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationSection>,

    /// Where the annotated overlay was written, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_path: Option<PathBuf>,

    /// Wall-clock time for the whole analysis
    pub elapsed_ms: u64,
}
