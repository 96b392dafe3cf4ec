//! Pipeline orchestration: wires the caption and segmentation stages together.
//!
//! Both stages follow an "always return something renderable" policy. A
//! caption failure yields the configured placeholder; a segmentation failure
//! yields the unmodified source image. Only caller mistakes (bad threshold,
//! zero candidates, unreadable file) surface as errors.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use image::RgbImage;
use tokio::time::timeout;

use crate::caption::{CandidateGenerator, Reranker, SequenceDecoder};
use crate::config::Config;
use crate::embedding::JointEmbedder;
use crate::error::{PipelineError, PipelineResult, Result};
use crate::segment::{InstanceDetector, OverlayCompositor, SegmentationFilter};
use crate::types::{
    AnalysisReport, AnnotatedImage, CaptionOutcome, CaptionReport, CaptionSection, OverlayOutcome,
    SegmentationSection,
};

use super::decode::ImageDecoder;
use super::validate::Validator;

pub type BoxedDecoder = Box<dyn SequenceDecoder + Send>;
pub type BoxedEmbedder = Box<dyn JointEmbedder + Send>;
pub type BoxedDetector = Box<dyn InstanceDetector + Send>;

/// Model backends injected into an [`ImageAnalyzer`].
///
/// Captioning needs both `decoder` and `embedder`; segmentation needs `detector`.
#[derive(Default)]
pub struct Collaborators {
    pub decoder: Option<BoxedDecoder>,
    pub embedder: Option<BoxedEmbedder>,
    pub detector: Option<BoxedDetector>,
}

/// Per-run overrides for [`ImageAnalyzer::analyze_path`].
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub caption: bool,
    pub segment: bool,
    /// Overrides `caption.num_candidates`
    pub num_candidates: Option<usize>,
    /// Overrides `segmentation.threshold`
    pub threshold: Option<f32>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            caption: true,
            segment: true,
            num_candidates: None,
            threshold: None,
        }
    }
}

/// Result of analyzing one file.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: AnalysisReport,
    /// Annotated (or, when degraded, original) raster; present when segmentation ran
    pub overlay: Option<RgbImage>,
}

/// Candidate generation and reranking, each model behind its own lock.
struct Captioner {
    generator: Mutex<CandidateGenerator<BoxedDecoder>>,
    reranker: Mutex<Reranker<BoxedEmbedder>>,
}

impl Captioner {
    fn caption(&self, image: &RgbImage, requested: usize) -> PipelineResult<CaptionReport> {
        let suggestions = self
            .generator
            .lock()
            .map_err(|e| poisoned("decoder", e))?
            .generate(image, requested)?;

        let ranking = self
            .reranker
            .lock()
            .map_err(|e| poisoned("embedder", e))?
            .rerank(image, &suggestions)?;

        Ok(CaptionReport {
            best: ranking.best,
            ranked: ranking.ranked,
            suggestions,
        })
    }
}

/// Detection plus compositing for one image.
struct Segmenter {
    detector: Option<Mutex<BoxedDetector>>,
    compositor: OverlayCompositor,
}

impl Segmenter {
    fn segment(&self, image: &RgbImage, filter: SegmentationFilter) -> OverlayOutcome {
        match self.try_segment(image, filter) {
            Ok(annotated) => OverlayOutcome::Composited(annotated),
            Err(e) => {
                tracing::warn!("Segmentation degraded to original image: {e}");
                OverlayOutcome::Degraded {
                    image: image.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_segment(
        &self,
        image: &RgbImage,
        filter: SegmentationFilter,
    ) -> PipelineResult<AnnotatedImage> {
        let detector = self.detector.as_ref().ok_or_else(|| {
            PipelineError::collaborator("detector", "no instance detector configured")
        })?;

        let start = Instant::now();
        let instances = {
            let mut detector = detector.lock().map_err(|e| poisoned("detector", e))?;
            let name = detector.name().to_string();
            detector.detect(image).map_err(|e| e.into_collaborator(&name))?
        };
        tracing::debug!("  Detect: {} instance(s) in {:?}", instances.len(), start.elapsed());

        let retained = filter.filter(&instances, image.width(), image.height())?;

        let composite_start = Instant::now();
        let annotated = self.compositor.composite(image, &retained)?;
        tracing::debug!("  Composite: {:?}", composite_start.elapsed());
        Ok(annotated)
    }
}

/// The main entry point: captions and segments images with injected models.
pub struct ImageAnalyzer {
    config: Config,
    validator: Validator,
    decoder: ImageDecoder,
    captioner: Option<Arc<Captioner>>,
    segmenter: Arc<Segmenter>,
}

impl ImageAnalyzer {
    /// Build an analyzer; stages whose collaborators are missing degrade.
    pub fn new(config: Config, collaborators: Collaborators) -> PipelineResult<Self> {
        let captioner = match (collaborators.decoder, collaborators.embedder) {
            (Some(decoder), Some(embedder)) => Some(Arc::new(Captioner {
                generator: Mutex::new(CandidateGenerator::new(decoder)),
                reranker: Mutex::new(Reranker::new(embedder)),
            })),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("Captioning needs both a decoder and an embedder; disabled");
                None
            }
            (None, None) => None,
        };

        let segmenter = Arc::new(Segmenter {
            detector: collaborators.detector.map(Mutex::new),
            compositor: OverlayCompositor::new(&config.overlay)?,
        });

        Ok(Self {
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(config.limits.clone()),
            config,
            captioner,
            segmenter,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn can_caption(&self) -> bool {
        self.captioner.is_some()
    }

    pub fn can_segment(&self) -> bool {
        self.segmenter.detector.is_some()
    }

    /// Generate `requested` candidates and rerank them against `image`.
    ///
    /// Blocks until the models answer. From async code prefer
    /// [`analyze_path`](Self::analyze_path) or wrap the call in
    /// `spawn_blocking`; a network-backed decoder such as
    /// [`OllamaDecoder`](crate::OllamaDecoder) panics if driven from a task
    /// on a current-thread runtime.
    pub fn caption(&self, image: &RgbImage, requested: usize) -> PipelineResult<CaptionReport> {
        self.captioner
            .as_ref()
            .ok_or_else(|| PipelineError::collaborator("decoder", "no caption models configured"))?
            .caption(image, requested)
    }

    /// Like [`caption`](Self::caption), but substitutes the placeholder on failure.
    ///
    /// Blocks the same way [`caption`](Self::caption) does.
    pub fn caption_or_fallback(&self, image: &RgbImage, requested: usize) -> CaptionOutcome {
        match self.caption(image, requested) {
            Ok(report) => CaptionOutcome::Ranked(report),
            Err(e) => caption_fallback(&self.config.caption.placeholder, &e),
        }
    }

    /// Detect, filter at `threshold`, and composite onto a copy of `image`.
    ///
    /// Fails only when `threshold` is outside [0, 1].
    pub fn segment(&self, image: &RgbImage, threshold: f32) -> PipelineResult<OverlayOutcome> {
        let filter = SegmentationFilter::new(threshold)?;
        Ok(self.segmenter.segment(image, filter))
    }

    /// Validate, decode and analyze a file.
    pub async fn analyze_path(&self, path: &Path, options: &AnalyzeOptions) -> Result<Analysis> {
        let start = Instant::now();
        tracing::debug!("Analyzing: {:?}", path);

        let requested = options
            .num_candidates
            .unwrap_or(self.config.caption.num_candidates);
        if options.caption && requested == 0 {
            return Err(PipelineError::invalid_input("requested caption count must be >= 1").into());
        }
        let threshold = options.threshold.unwrap_or(self.config.segmentation.threshold);
        let filter = if options.segment {
            Some(SegmentationFilter::new(threshold)?)
        } else {
            None
        };

        let format = self.validator.validate(path)?;
        tracing::trace!("  Validate ({format}): {:?}", start.elapsed());

        let decode_start = Instant::now();
        let decoded = self.decoder.decode(path).await?;
        tracing::trace!("  Decode: {:?}", decode_start.elapsed());

        let image = Arc::new(decoded.image);
        let caption_future = async {
            if options.caption {
                Some(self.caption_stage(path, Arc::clone(&image), requested).await)
            } else {
                None
            }
        };
        let segment_future = async {
            match filter {
                Some(filter) => Some(self.segment_stage(path, Arc::clone(&image), filter).await),
                None => None,
            }
        };
        let (caption, overlay) = tokio::join!(caption_future, segment_future);

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let elapsed = start.elapsed();
        tracing::debug!(
            "Analyzed {:?} in {:?} ({}x{})",
            file_name,
            elapsed,
            decoded.width,
            decoded.height
        );

        let report = AnalysisReport {
            file_path: path.to_path_buf(),
            file_name,
            format: format.to_string(),
            width: decoded.width,
            height: decoded.height,
            caption: caption.as_ref().map(CaptionSection::from),
            segmentation: overlay
                .as_ref()
                .map(|outcome| SegmentationSection::from_outcome(threshold, outcome)),
            overlay_path: None,
            elapsed_ms: elapsed.as_millis() as u64,
        };

        Ok(Analysis {
            report,
            overlay: overlay.map(OverlayOutcome::into_image),
        })
    }

    async fn caption_stage(
        &self,
        path: &Path,
        image: Arc<RgbImage>,
        requested: usize,
    ) -> CaptionOutcome {
        let placeholder = self.config.caption.placeholder.clone();
        let Some(captioner) = self.captioner.clone() else {
            return caption_fallback(
                &placeholder,
                &PipelineError::collaborator("decoder", "no caption models configured"),
            );
        };

        let stage_start = Instant::now();
        let timeout_ms = self.config.limits.caption_timeout_ms;
        let result = run_blocking(path, "caption", timeout_ms, move || {
            captioner.caption(&image, requested)
        })
        .await
        .and_then(|inner| inner);
        tracing::debug!("  Caption: {:?}", stage_start.elapsed());

        match result {
            Ok(report) => CaptionOutcome::Ranked(report),
            Err(e) => caption_fallback(&placeholder, &e),
        }
    }

    async fn segment_stage(
        &self,
        path: &Path,
        image: Arc<RgbImage>,
        filter: SegmentationFilter,
    ) -> OverlayOutcome {
        let segmenter = Arc::clone(&self.segmenter);
        let source = Arc::clone(&image);

        let stage_start = Instant::now();
        let timeout_ms = self.config.limits.segment_timeout_ms;
        let result = run_blocking(path, "segment", timeout_ms, move || {
            segmenter.segment(&source, filter)
        })
        .await;
        tracing::debug!("  Segment: {:?}", stage_start.elapsed());

        result.unwrap_or_else(|e| {
            tracing::warn!("Segmentation degraded to original image: {e}");
            OverlayOutcome::Degraded {
                image: image.as_ref().clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Run `work` on the blocking pool, bounded by `timeout_ms`.
async fn run_blocking<T, F>(path: &Path, stage: &str, timeout_ms: u64, work: F) -> PipelineResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(work),
    )
    .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::Model {
            message: format!("{stage} task failed: {e}"),
        }),
        Err(_) => Err(PipelineError::Timeout {
            path: path.to_path_buf(),
            stage: stage.to_string(),
            timeout_ms,
        }),
    }
}

fn caption_fallback(placeholder: &str, error: &PipelineError) -> CaptionOutcome {
    tracing::warn!("Captioning fell back to placeholder: {error}");
    CaptionOutcome::Fallback {
        caption: placeholder.to_string(),
        reason: error.to_string(),
    }
}

fn poisoned<T>(collaborator: &str, err: PoisonError<T>) -> PipelineError {
    PipelineError::collaborator(collaborator, format!("lock poisoned: {err}"))
}
