//! Confidence filtering and mask binarization.
//!
//! The threshold is applied twice with different comparisons: an instance is
//! kept when `confidence >= threshold`, while a mask pixel is on only when
//! `probability > threshold`.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::Array2;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DetectedInstance, RetainedInstance};

const COLLABORATOR: &str = "detector";

/// Keeps confident instances and binarizes their masks at image resolution.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationFilter {
    threshold: f32,
}

impl SegmentationFilter {
    /// Fails with `InvalidInput` unless `threshold` is within [0, 1].
    pub fn new(threshold: f32) -> PipelineResult<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::invalid_input(format!(
                "segmentation threshold {threshold} must be within [0, 1]"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Filter `instances` for an image of `width × height`, preserving order.
    ///
    /// The whole detector output is validated first, so malformed data fails
    /// the call even if it belongs to an instance that would be dropped.
    pub fn filter(
        &self,
        instances: &[DetectedInstance],
        width: u32,
        height: u32,
    ) -> PipelineResult<Vec<RetainedInstance>> {
        if width == 0 || height == 0 {
            return Err(PipelineError::invalid_input(format!(
                "image dimensions {width}x{height} must be non-zero"
            )));
        }
        for (index, instance) in instances.iter().enumerate() {
            validate_instance(index, instance)?;
        }

        let retained: Vec<RetainedInstance> = instances
            .iter()
            .filter(|instance| instance.confidence >= self.threshold)
            .map(|instance| RetainedInstance {
                mask: self.binarize(instance, width, height),
                bbox: instance.bbox,
                label: instance.label,
                confidence: instance.confidence,
            })
            .collect();

        tracing::debug!(
            "Retained {}/{} instance(s) at threshold {:.2}",
            retained.len(),
            instances.len(),
            self.threshold
        );
        Ok(retained)
    }

    fn binarize(&self, instance: &DetectedInstance, width: u32, height: u32) -> Array2<bool> {
        let (mask_w, mask_h) = instance.mask_dimensions();
        if (mask_w, mask_h) == (width, height) {
            return instance.mask.mapv(|p| p > self.threshold);
        }

        let source: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_fn(mask_w, mask_h, |x, y| {
                Luma([instance.mask[[y as usize, x as usize]]])
            });
        let resampled = imageops::resize(&source, width, height, FilterType::Triangle);
        Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            resampled.get_pixel(x as u32, y as u32).0[0] > self.threshold
        })
    }
}

fn validate_instance(index: usize, instance: &DetectedInstance) -> PipelineResult<()> {
    let malformed = |what: String| {
        PipelineError::collaborator(COLLABORATOR, format!("instance {index}: {what}"))
    };

    if instance.mask.is_empty() {
        return Err(malformed("mask grid is empty".to_string()));
    }
    if !instance.confidence.is_finite() {
        return Err(malformed(format!(
            "non-finite confidence {}",
            instance.confidence
        )));
    }
    if !instance.bbox.is_valid() {
        let b = instance.bbox;
        return Err(malformed(format!(
            "inverted bounding box ({}, {}, {}, {})",
            b.x1, b.y1, b.x2, b.y2
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn instance(confidence: f32, mask: Array2<f32>) -> DetectedInstance {
        DetectedInstance {
            mask,
            bbox: BoundingBox::new(0, 0, 2, 2).unwrap(),
            label: 1,
            confidence,
        }
    }

    #[test]
    fn test_threshold_outside_unit_interval_rejected() {
        assert!(matches!(
            SegmentationFilter::new(1.5),
            Err(PipelineError::InvalidInput { .. })
        ));
        assert!(SegmentationFilter::new(-0.1).is_err());
        assert!(SegmentationFilter::new(f32::NAN).is_err());
        assert!(SegmentationFilter::new(0.0).is_ok());
        assert!(SegmentationFilter::new(1.0).is_ok());
    }

    #[test]
    fn test_confidence_equal_to_threshold_is_retained() {
        let filter = SegmentationFilter::new(0.7).unwrap();
        let kept = filter
            .filter(&[instance(0.7, Array2::from_elem((2, 2), 0.9))], 2, 2)
            .unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_pixel_equal_to_threshold_is_off() {
        let filter = SegmentationFilter::new(0.7).unwrap();
        let mask = Array2::from_shape_vec((2, 2), vec![0.7, 0.71, 0.69, 1.0]).unwrap();
        let kept = filter.filter(&[instance(0.9, mask)], 2, 2).unwrap();
        let on: Vec<bool> = kept[0].mask.iter().copied().collect();
        assert_eq!(on, vec![false, true, false, true]);
    }

    #[test]
    fn test_order_preserved_and_low_confidence_dropped() {
        let filter = SegmentationFilter::new(0.5).unwrap();
        let mut a = instance(0.6, Array2::zeros((2, 2)));
        a.label = 10;
        let mut b = instance(0.2, Array2::zeros((2, 2)));
        b.label = 20;
        let mut c = instance(0.95, Array2::zeros((2, 2)));
        c.label = 30;

        let kept = filter.filter(&[a, b, c], 2, 2).unwrap();
        let labels: Vec<u32> = kept.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![10, 30]);
    }

    #[test]
    fn test_nothing_retained_is_ok() {
        let filter = SegmentationFilter::new(0.9).unwrap();
        let kept = filter
            .filter(&[instance(0.1, Array2::zeros((2, 2)))], 2, 2)
            .unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_low_resolution_mask_resampled_to_image() {
        let filter = SegmentationFilter::new(0.5).unwrap();
        // Left half on, right half off at 2x2; upsampled to 8x4.
        let mask = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 1.0, 0.0]).unwrap();
        let kept = filter.filter(&[instance(0.9, mask)], 8, 4).unwrap();

        assert_eq!(kept[0].mask_dimensions(), (8, 4));
        assert!(kept[0].mask[[1, 0]]);
        assert!(!kept[0].mask[[1, 7]]);
    }

    #[test]
    fn test_empty_mask_is_collaborator_failure() {
        let filter = SegmentationFilter::new(0.5).unwrap();
        let err = filter
            .filter(&[instance(0.9, Array2::zeros((0, 0)))], 2, 2)
            .unwrap_err();
        assert!(matches!(err, PipelineError::CollaboratorUnavailable { .. }));
    }

    #[test]
    fn test_non_finite_confidence_is_collaborator_failure() {
        let filter = SegmentationFilter::new(0.5).unwrap();
        let err = filter
            .filter(&[instance(f32::NAN, Array2::zeros((2, 2)))], 2, 2)
            .unwrap_err();
        assert!(err.to_string().contains("non-finite confidence"));
    }

    #[test]
    fn test_inverted_box_is_collaborator_failure() {
        let filter = SegmentationFilter::new(0.5).unwrap();
        let mut bad = instance(0.9, Array2::zeros((2, 2)));
        bad.bbox = BoundingBox {
            x1: 5,
            y1: 0,
            x2: 1,
            y2: 2,
        };
        assert!(filter.filter(&[bad], 2, 2).is_err());
    }
}
