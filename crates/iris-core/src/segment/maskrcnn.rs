//! Mask R-CNN instance detector via ONNX Runtime.
//!
//! Expects an ONNX export of torchvision's `maskrcnn_resnet50_fpn`:
//! - input: one `[3, H, W]` float image scaled to [0, 1]
//! - outputs: `boxes [N, 4]`, `labels [N]`, `scores [N]`, `masks [N, 1, H, W]`

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Value;

use super::detector::InstanceDetector;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{BoundingBox, DetectedInstance};

const MODEL_FILENAME: &str = "model.onnx";
const COLLABORATOR: &str = "maskrcnn";

pub struct MaskRcnnDetector {
    session: Session,
    input_name: String,
}

impl MaskRcnnDetector {
    /// Load `{model_dir}/model.onnx`.
    pub fn load(model_dir: &Path) -> PipelineResult<Self> {
        let model_path = Self::model_path(model_dir);
        if !model_path.exists() {
            return Err(PipelineError::Model {
                message: format!("Segmentation model not found at {model_path:?}"),
            });
        }

        tracing::info!("Loading Mask R-CNN model from {:?}", model_path);
        let session = Session::builder()
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(&model_path)
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to load segmentation model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "image".to_string());

        tracing::debug!(
            "Loaded Mask R-CNN (input: {:?}, outputs: {:?})",
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

    pub fn model_path(model_dir: &Path) -> PathBuf {
        model_dir.join(MODEL_FILENAME)
    }

    pub fn model_exists(model_dir: &Path) -> bool {
        Self::model_path(model_dir).exists()
    }
}

impl InstanceDetector for MaskRcnnDetector {
    fn name(&self) -> &str {
        COLLABORATOR
    }

    fn detect(&mut self, image: &RgbImage) -> PipelineResult<Vec<DetectedInstance>> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        let input = Value::from_array((
            vec![3i64, height as i64, width as i64],
            to_chw_unit(image),
        ))
        .map_err(|e| PipelineError::collaborator(COLLABORATOR, format!("input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| PipelineError::collaborator(COLLABORATOR, format!("inference failed: {e}")))?;

        let find = |name: &str| {
            outputs
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    PipelineError::collaborator(COLLABORATOR, format!("missing output {name:?}"))
                })
        };
        let extract_err = |name: &str, message: String| {
            PipelineError::collaborator(COLLABORATOR, format!("{name}: {message}"))
        };

        let boxes_value = find("boxes")?;
        let labels_value = find("labels")?;
        let scores_value = find("scores")?;
        let masks_value = find("masks")?;

        let (_, boxes) = boxes_value
            .try_extract_tensor::<f32>()
            .map_err(|e| extract_err("boxes", e.to_string()))?;
        let (_, labels) = labels_value
            .try_extract_tensor::<i64>()
            .map_err(|e| extract_err("labels", e.to_string()))?;
        let (_, scores) = scores_value
            .try_extract_tensor::<f32>()
            .map_err(|e| extract_err("scores", e.to_string()))?;
        let (mask_shape, masks) = masks_value
            .try_extract_tensor::<f32>()
            .map_err(|e| extract_err("masks", e.to_string()))?;
        let mask_dims: Vec<i64> = mask_shape.iter().copied().collect();

        let instances = instances_from_outputs(
            RawDetections {
                boxes,
                labels,
                scores,
                mask_shape: &mask_dims,
                masks,
            },
            width,
            height,
        )?;

        tracing::debug!(
            "Mask R-CNN found {} instance(s) in {:?}",
            instances.len(),
            start.elapsed()
        );
        Ok(instances)
    }
}

/// Flat model outputs, borrowed from the session result.
struct RawDetections<'a> {
    boxes: &'a [f32],
    labels: &'a [i64],
    scores: &'a [f32],
    mask_shape: &'a [i64],
    masks: &'a [f32],
}

/// Interleaved RGB bytes to planar `[3, H, W]` floats in [0, 1].
fn to_chw_unit(image: &RgbImage) -> Vec<f32> {
    let plane = (image.width() * image.height()) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in image.as_raw().chunks_exact(3).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * plane + i] = val as f32 / 255.0;
        }
    }
    data
}

fn instances_from_outputs(
    raw: RawDetections<'_>,
    width: u32,
    height: u32,
) -> PipelineResult<Vec<DetectedInstance>> {
    let count = raw.scores.len();
    if raw.labels.len() != count || raw.boxes.len() != count * 4 {
        return Err(PipelineError::collaborator(
            COLLABORATOR,
            format!(
                "inconsistent output lengths: {} scores, {} labels, {} box coords",
                count,
                raw.labels.len(),
                raw.boxes.len()
            ),
        ));
    }
    if count == 0 {
        return Ok(vec![]);
    }

    let (mask_h, mask_w) = match raw.mask_shape {
        [n, 1, h, w] if *n as usize == count => (*h as usize, *w as usize),
        [n, h, w] if *n as usize == count => (*h as usize, *w as usize),
        other => {
            return Err(PipelineError::collaborator(
                COLLABORATOR,
                format!("unexpected mask shape {other:?} for {count} instance(s)"),
            ))
        }
    };
    let plane = mask_h * mask_w;
    if raw.masks.len() != count * plane {
        return Err(PipelineError::collaborator(
            COLLABORATOR,
            format!("mask data has {} values, shape implies {}", raw.masks.len(), count * plane),
        ));
    }

    (0..count)
        .map(|i| {
            let mask = Array2::from_shape_vec(
                (mask_h, mask_w),
                raw.masks[i * plane..(i + 1) * plane].to_vec(),
            )
            .map_err(|e| PipelineError::collaborator(COLLABORATOR, format!("mask {i}: {e}")))?;
            let coords = &raw.boxes[i * 4..i * 4 + 4];
            Ok(DetectedInstance {
                mask,
                bbox: pixel_box(coords, width, height),
                label: raw.labels[i].max(0) as u32,
                confidence: raw.scores[i],
            })
        })
        .collect()
}

/// Float `[x1, y1, x2, y2]` to an integer box inside the image; degenerate
/// boxes are widened to one pixel.
fn pixel_box(coords: &[f32], width: u32, height: u32) -> BoundingBox {
    let (w, h) = (width as i32, height as i32);
    let x1 = (coords[0].floor() as i32).clamp(0, (w - 1).max(0));
    let y1 = (coords[1].floor() as i32).clamp(0, (h - 1).max(0));
    let x2 = (coords[2].ceil() as i32).clamp(0, w).max(x1 + 1);
    let y2 = (coords[3].ceil() as i32).clamp(0, h).max(y1 + 1);
    BoundingBox { x1, y1, x2, y2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_chw_layout_and_scaling() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 51, 255]));
        let data = to_chw_unit(&img);
        assert_eq!(data.len(), 6);
        assert_eq!(&data[0..2], &[1.0, 0.0]);
        assert!((data[3] - 0.2).abs() < 1e-6);
        assert_eq!(data[5], 1.0);
    }

    #[test]
    fn test_pixel_box_rounds_outward_and_clamps() {
        let b = pixel_box(&[10.6, 4.2, 20.1, 30.9], 100, 100);
        assert_eq!(b, BoundingBox { x1: 10, y1: 4, x2: 21, y2: 31 });

        let clamped = pixel_box(&[-5.0, -5.0, 500.0, 500.0], 64, 48);
        assert_eq!(clamped, BoundingBox { x1: 0, y1: 0, x2: 64, y2: 48 });
    }

    #[test]
    fn test_degenerate_box_widened() {
        let b = pixel_box(&[12.0, 8.0, 12.0, 8.0], 100, 100);
        assert!(b.is_valid());
        assert_eq!((b.width(), b.height()), (1, 1));
    }

    #[test]
    fn test_instances_from_outputs() {
        let instances = instances_from_outputs(
            RawDetections {
                boxes: &[0.0, 0.0, 2.0, 2.0, 1.0, 1.0, 3.0, 3.0],
                labels: &[1, 18],
                scores: &[0.98, 0.41],
                mask_shape: &[2, 1, 2, 2],
                masks: &[0.9, 0.1, 0.2, 0.8, 0.0, 0.0, 0.5, 0.6],
            },
            4,
            4,
        )
        .unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].label, 18);
        assert_eq!(instances[1].mask_dimensions(), (2, 2));
        assert_eq!(instances[0].mask[[1, 1]], 0.8);
    }

    #[test]
    fn test_empty_detections() {
        let instances = instances_from_outputs(
            RawDetections {
                boxes: &[],
                labels: &[],
                scores: &[],
                mask_shape: &[0, 1, 4, 4],
                masks: &[],
            },
            4,
            4,
        )
        .unwrap();
        assert!(instances.is_empty());
    }

    #[test]
    fn test_mask_shape_mismatch_is_collaborator_failure() {
        let err = instances_from_outputs(
            RawDetections {
                boxes: &[0.0, 0.0, 2.0, 2.0],
                labels: &[1],
                scores: &[0.9],
                mask_shape: &[1, 1, 2, 2],
                masks: &[0.5; 3],
            },
            4,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::CollaboratorUnavailable { .. }));
    }
}
