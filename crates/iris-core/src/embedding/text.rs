//! CLIP text tower and tokenizer.
//!
//! Encodes caption strings into the same space as the visual tower.

use std::path::Path;

use ort::session::Session;
use ort::value::Value;

use super::split_rows;
use crate::error::PipelineError;

/// Output holding the projected text embeddings; the first output otherwise.
const TEXT_OUTPUT: &str = "text_embeds";

pub struct ClipTextEncoder {
    session: Session,
    tokenizer: tokenizers::Tokenizer,
    max_length: usize,
    /// Whether the exported graph also takes an `attention_mask` input
    wants_attention_mask: bool,
}

impl ClipTextEncoder {
    /// Load `text_model.onnx` and the tokenizer from their paths.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
    ) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load text model {model_path:?}: {e}"),
            })?;

        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            }
        })?;

        let wants_attention_mask = session
            .inputs()
            .iter()
            .any(|i| i.name() == "attention_mask");

        tracing::debug!(
            "Loaded CLIP text model (inputs: {:?}, outputs: {:?})",
            session
                .inputs()
                .iter()
                .map(|i| i.name())
                .collect::<Vec<_>>(),
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session,
            tokenizer,
            max_length,
            wants_attention_mask,
        })
    }

    /// Encode a batch of texts in one inference call; returns raw embeddings.
    pub fn encode_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;
        let token_ids: Vec<&[u32]> = encodings.iter().map(|e| e.get_ids()).collect();
        let (input_ids, attention_mask) = pad_token_ids(&token_ids, self.max_length);

        let shape = vec![batch_size as i64, self.max_length as i64];
        let ids_value = Value::from_array((shape.clone(), input_ids)).map_err(|e| {
            PipelineError::Model {
                message: format!("Failed to create input_ids tensor: {e}"),
            }
        })?;

        let outputs = if self.wants_attention_mask {
            let mask_value = Value::from_array((shape, attention_mask)).map_err(|e| {
                PipelineError::Model {
                    message: format!("Failed to create attention_mask tensor: {e}"),
                }
            })?;
            self.session.run(ort::inputs![
                "input_ids" => ids_value,
                "attention_mask" => mask_value
            ])
        } else {
            self.session.run(ort::inputs!["input_ids" => ids_value])
        }
        .map_err(|e| PipelineError::Model {
            message: format!("Text inference failed: {e}"),
        })?;

        let text_embeds = outputs
            .iter()
            .find(|(name, _)| *name == TEXT_OUTPUT)
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: "Text model produced no outputs".to_string(),
            })?;

        let (shape, data) =
            text_embeds
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Model {
                    message: format!("Failed to extract {TEXT_OUTPUT}: {e}"),
                })?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        split_rows(&dims, data, batch_size)
    }
}

/// Truncate/pad token ids to `max_length`; returns flat ids and attention mask.
///
/// Padding uses id 0 with mask 0. Truncated sequences keep their final token
/// so the end-of-text marker the text tower pools on survives.
fn pad_token_ids(sequences: &[&[u32]], max_length: usize) -> (Vec<i64>, Vec<i64>) {
    let mut ids = vec![0i64; sequences.len() * max_length];
    let mut mask = vec![0i64; sequences.len() * max_length];
    if max_length == 0 {
        return (ids, mask);
    }

    for (row, seq) in sequences.iter().enumerate() {
        let offset = row * max_length;
        let kept = seq.len().min(max_length);
        for (j, &id) in seq.iter().take(kept).enumerate() {
            ids[offset + j] = id as i64;
            mask[offset + j] = 1;
        }
        if seq.len() > max_length {
            if let Some(&last) = seq.last() {
                ids[offset + max_length - 1] = last as i64;
            }
        }
    }
    (ids, mask)
}
