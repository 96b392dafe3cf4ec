//! Instance detector interface.

use image::RgbImage;

use crate::error::PipelineResult;
use crate::types::DetectedInstance;

/// Proposes object instances (mask, box, label, confidence) for an image.
///
/// Output order is the detector's own; downstream stages preserve it.
pub trait InstanceDetector {
    /// Collaborator name for logging and error classification.
    fn name(&self) -> &str;

    fn detect(&mut self, image: &RgbImage) -> PipelineResult<Vec<DetectedInstance>>;
}

impl<T: InstanceDetector + ?Sized> InstanceDetector for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, image: &RgbImage) -> PipelineResult<Vec<DetectedInstance>> {
        (**self).detect(image)
    }
}
