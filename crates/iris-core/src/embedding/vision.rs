//! CLIP visual tower session.
//!
//! Loads the vision half of a CLIP model exported to ONNX with its projection
//! head, so `image_embeds` lands in the shared image/text space.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use super::split_rows;
use crate::error::PipelineError;

/// Output holding the projected image embedding; the first output otherwise.
const IMAGE_OUTPUT: &str = "image_embeds";

pub struct ClipVisionSession {
    session: Session,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
}

impl ClipVisionSession {
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load visual model {model_path:?}: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded CLIP visual model from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session,
            input_name,
        })
    }

    /// Run the visual tower on a `[1, 3, S, S]` tensor; returns the raw embedding.
    pub fn embed(&mut self, preprocessed: &Array4<f32>) -> Result<Vec<f32>, PipelineError> {
        let shape: Vec<i64> = preprocessed.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = preprocessed.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data)).map_err(|e| PipelineError::Model {
            message: format!("Failed to create image tensor: {e}"),
        })?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| PipelineError::Model {
                message: format!("Visual inference failed: {e}"),
            })?;

        let image_embeds = outputs
            .iter()
            .find(|(name, _)| *name == IMAGE_OUTPUT)
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: "Visual model produced no outputs".to_string(),
            })?;

        let (shape, data) =
            image_embeds
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Model {
                    message: format!("Failed to extract {IMAGE_OUTPUT}: {e}"),
                })?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        split_rows(&dims, data, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Model {
                message: "Visual model returned no embedding".to_string(),
            })
    }
}
