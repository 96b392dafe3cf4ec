//! Sequence decoder interface.

use image::RgbImage;

use crate::error::PipelineResult;

/// Produces candidate caption sequences for an image.
///
/// Sampling strategy (beam width, temperature, n-gram blocking) is the
/// implementation's concern. Implementations are not assumed to be thread-safe,
/// hence `&mut self`; share one behind a mutex.
pub trait SequenceDecoder {
    /// Collaborator name for logging and error classification.
    fn name(&self) -> &str;

    /// Return up to `sample_count` independently generated sequences.
    ///
    /// Duplicates and empty strings are allowed; callers clean them up.
    fn decode(&mut self, image: &RgbImage, sample_count: usize) -> PipelineResult<Vec<String>>;
}

impl<T: SequenceDecoder + ?Sized> SequenceDecoder for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decode(&mut self, image: &RgbImage, sample_count: usize) -> PipelineResult<Vec<String>> {
        (**self).decode(image, sample_count)
    }
}
