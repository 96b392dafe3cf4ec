//! Joint image/text embedding.
//!
//! The reranker only needs something that maps an image and a batch of texts
//! into one vector space; [`JointEmbedder`] is that seam. [`ClipEmbedder`]
//! implements it with the two CLIP towers running locally via ONNX Runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use iris_core::embedding::{ClipEmbedder, JointEmbedder};
//! use iris_core::Config;
//!
//! let config = Config::default();
//! let mut clip = ClipEmbedder::load(&config.embedding, &config.embedding_model_dir())?;
//! let (image_vec, text_vecs) = clip.embed(&rgb, &captions)?;
//! ```

pub(crate) mod preprocess;
pub(crate) mod text;
pub(crate) mod vision;

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, PipelineResult};

use self::preprocess::preprocess;
use self::text::ClipTextEncoder;
use self::vision::ClipVisionSession;

const VISUAL_MODEL_FILENAME: &str = "visual.onnx";
const TEXT_MODEL_FILENAME: &str = "text_model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Maps images and texts into a shared embedding space.
///
/// Vectors need not be normalized; the reranker normalizes them.
pub trait JointEmbedder {
    /// Collaborator name for logging and error classification.
    fn name(&self) -> &str;

    fn embed_image(&mut self, image: &RgbImage) -> PipelineResult<Vec<f32>>;

    /// Embed all texts in one batch; the result is index-aligned with `texts`.
    fn embed_texts(&mut self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>>;

    /// Embed one image and a batch of texts.
    fn embed(
        &mut self,
        image: &RgbImage,
        texts: &[String],
    ) -> PipelineResult<(Vec<f32>, Vec<Vec<f32>>)> {
        let image_embedding = self.embed_image(image)?;
        let text_embeddings = self.embed_texts(texts)?;
        Ok((image_embedding, text_embeddings))
    }
}

impl<T: JointEmbedder + ?Sized> JointEmbedder for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn embed_image(&mut self, image: &RgbImage) -> PipelineResult<Vec<f32>> {
        (**self).embed_image(image)
    }

    fn embed_texts(&mut self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        (**self).embed_texts(texts)
    }

    fn embed(
        &mut self,
        image: &RgbImage,
        texts: &[String],
    ) -> PipelineResult<(Vec<f32>, Vec<Vec<f32>>)> {
        (**self).embed(image, texts)
    }
}

/// CLIP joint embedder (visual + text towers).
pub struct ClipEmbedder {
    vision: ClipVisionSession,
    text: ClipTextEncoder,
    image_size: u32,
}

impl ClipEmbedder {
    /// Load both towers and the tokenizer from `model_dir`.
    ///
    /// Expects `visual.onnx`, `text_model.onnx` and `tokenizer.json`.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> PipelineResult<Self> {
        for path in Self::required_files(model_dir) {
            if !path.exists() {
                return Err(PipelineError::Model {
                    message: format!("Embedding model file not found: {path:?}"),
                });
            }
        }

        tracing::info!("Loading CLIP model from {:?}", model_dir);
        let vision = ClipVisionSession::load(&model_dir.join(VISUAL_MODEL_FILENAME))?;
        let text = ClipTextEncoder::load(
            &model_dir.join(TEXT_MODEL_FILENAME),
            &model_dir.join(TOKENIZER_FILENAME),
            config.max_text_length,
        )?;
        tracing::info!("CLIP model loaded successfully");

        Ok(Self {
            vision,
            text,
            image_size: config.image_size,
        })
    }

    /// Files the embedder needs under its model directory.
    pub fn required_files(model_dir: &Path) -> Vec<PathBuf> {
        [VISUAL_MODEL_FILENAME, TEXT_MODEL_FILENAME, TOKENIZER_FILENAME]
            .iter()
            .map(|name| model_dir.join(name))
            .collect()
    }

    /// Check whether all model files exist on disk.
    pub fn model_exists(model_dir: &Path) -> bool {
        Self::required_files(model_dir).iter().all(|p| p.exists())
    }
}

impl JointEmbedder for ClipEmbedder {
    fn name(&self) -> &str {
        "clip"
    }

    fn embed_image(&mut self, image: &RgbImage) -> PipelineResult<Vec<f32>> {
        let tensor = preprocess(image, self.image_size);
        self.vision.embed(&tensor)
    }

    fn embed_texts(&mut self, texts: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        self.text.encode_batch(texts)
    }
}

/// Split a flat `[rows, dim]` (or `[dim]` when `rows == 1`) output into rows.
pub(crate) fn split_rows(shape: &[i64], data: &[f32], rows: usize) -> PipelineResult<Vec<Vec<f32>>> {
    let dim = match shape {
        [dim] if rows == 1 => *dim as usize,
        [n, dim] if *n as usize == rows => *dim as usize,
        _ => {
            return Err(PipelineError::Model {
                message: format!("Unexpected embedding shape {shape:?} for {rows} row(s)"),
            })
        }
    };
    if dim == 0 || data.len() < rows * dim {
        return Err(PipelineError::Model {
            message: format!("Embedding output too short: {} values for {shape:?}", data.len()),
        });
    }
    Ok(data.chunks(dim).take(rows).map(<[f32]>::to_vec).collect())
}
