//! Overlay rendering: mask tint, box outline and label per retained instance.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::palette::Palette;
use crate::config::{ColorPolicy, OverlayConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{AnnotatedImage, Annotation, RetainedInstance};

/// Weight of the existing pixel when tinting a mask pixel.
pub const BASE_WEIGHT: f32 = 0.7;
/// Weight of the instance color when tinting a mask pixel.
pub const TINT_WEIGHT: f32 = 0.3;
/// Box outline thickness in pixels.
pub const STROKE_WIDTH: u32 = 2;
/// Label baseline sits this far above the box top...
pub const LABEL_OFFSET: i32 = 5;
/// ...but never closer than this to the image top.
pub const LABEL_MIN_BASELINE: i32 = 15;

const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Draws retained instances onto a copy of the source image.
pub struct OverlayCompositor {
    font: FontArc,
    scale: PxScale,
    colors: ColorPolicy,
    seed: Option<u64>,
}

impl OverlayCompositor {
    pub fn new(config: &OverlayConfig) -> PipelineResult<Self> {
        let font = FontArc::try_from_slice(FONT_DATA).map_err(|e| PipelineError::Model {
            message: format!("Failed to load overlay font: {e}"),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(config.font_size),
            colors: config.colors,
            seed: config.seed,
        })
    }

    /// Composite `instances` in order onto a copy of `base`.
    ///
    /// Every mask must match the base resolution; this is checked before any
    /// drawing, so a failure never leaves a half-drawn overlay behind.
    pub fn composite(
        &self,
        base: &RgbImage,
        instances: &[RetainedInstance],
    ) -> PipelineResult<AnnotatedImage> {
        let dims = base.dimensions();
        for (index, instance) in instances.iter().enumerate() {
            let mask_dims = instance.mask_dimensions();
            if mask_dims != dims {
                return Err(PipelineError::CompositingFailed {
                    message: format!(
                        "instance {index} mask is {}x{}, image is {}x{}",
                        mask_dims.0, mask_dims.1, dims.0, dims.1
                    ),
                });
            }
        }

        let mut canvas = base.clone();
        let mut palette = Palette::new(self.colors, self.seed);
        let mut annotations = Vec::with_capacity(instances.len());

        for (index, instance) in instances.iter().enumerate() {
            let color = palette.color(index);
            tint_mask(&mut canvas, instance, color);
            self.draw_box(&mut canvas, instance, color);

            let text = label_text(instance.label, instance.confidence);
            let label_anchor = label_anchor(instance.bbox.x1, instance.bbox.y1);
            self.draw_label(&mut canvas, &text, label_anchor, color);

            annotations.push(Annotation {
                label: instance.label,
                confidence: instance.confidence,
                bbox: instance.bbox,
                color,
                text,
                label_anchor,
                mask_pixels: instance.mask_pixels(),
            });
        }

        Ok(AnnotatedImage {
            image: canvas,
            annotations,
        })
    }

    fn draw_box(&self, canvas: &mut RgbImage, instance: &RetainedInstance, color: [u8; 3]) {
        let bbox = instance.bbox;
        for inset in 0..STROKE_WIDTH {
            let (w, h) = (
                bbox.width().saturating_sub(2 * inset),
                bbox.height().saturating_sub(2 * inset),
            );
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(bbox.x1 + inset as i32, bbox.y1 + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, Rgb(color));
        }
    }

    /// `anchor` is the text baseline; imageproc wants the glyph top.
    fn draw_label(&self, canvas: &mut RgbImage, text: &str, anchor: (i32, i32), color: [u8; 3]) {
        let ascent = self.font.as_scaled(self.scale).ascent().round() as i32;
        draw_text_mut(
            canvas,
            Rgb(color),
            anchor.0,
            anchor.1 - ascent,
            self.scale,
            &self.font,
            text,
        );
    }
}

/// Blend `color` into every mask-on pixel; returns how many were tinted.
fn tint_mask(canvas: &mut RgbImage, instance: &RetainedInstance, color: [u8; 3]) {
    for ((y, x), on) in instance.mask.indexed_iter() {
        if *on {
            let pixel = canvas.get_pixel_mut(x as u32, y as u32);
            pixel.0 = blend_pixel(pixel.0, color);
        }
    }
}

/// `0.7 × current + 0.3 × color` per channel, rounded.
pub fn blend_pixel(current: [u8; 3], color: [u8; 3]) -> [u8; 3] {
    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = BASE_WEIGHT * current[c] as f32 + TINT_WEIGHT * color[c] as f32;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

pub fn label_text(label: u32, confidence: f32) -> String {
    format!("Object {label} ({confidence:.2})")
}

/// Baseline position for a label over a box whose top-left is `(x1, y1)`.
pub fn label_anchor(x1: i32, y1: i32) -> (i32, i32) {
    (x1, (y1 - LABEL_OFFSET).max(LABEL_MIN_BASELINE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use ndarray::Array2;

    fn compositor() -> OverlayCompositor {
        OverlayCompositor::new(&OverlayConfig::default()).unwrap()
    }

    fn retained(w: usize, h: usize, bbox: BoundingBox, on: impl Fn(usize, usize) -> bool) -> RetainedInstance {
        RetainedInstance {
            mask: Array2::from_shape_fn((h, w), |(y, x)| on(x, y)),
            bbox,
            label: 3,
            confidence: 0.876,
        }
    }

    #[test]
    fn test_blend_pixel_weights() {
        assert_eq!(blend_pixel([100, 100, 100], [200, 0, 255]), [130, 70, 147]);
        assert_eq!(blend_pixel([255, 255, 255], [255, 255, 255]), [255, 255, 255]);
    }

    #[test]
    fn test_label_text_format() {
        assert_eq!(label_text(3, 0.876), "Object 3 (0.88)");
        assert_eq!(label_text(17, 1.0), "Object 17 (1.00)");
    }

    #[test]
    fn test_label_anchor_clamped_near_top() {
        assert_eq!(label_anchor(40, 100), (40, 95));
        assert_eq!(label_anchor(40, 12), (40, 15));
        assert_eq!(label_anchor(0, 0), (0, 15));
    }

    #[test]
    fn test_base_is_not_mutated() {
        let base = RgbImage::from_pixel(32, 32, Rgb([10, 20, 30]));
        let snapshot = base.clone();
        let instance = retained(32, 32, BoundingBox::new(4, 20, 28, 30).unwrap(), |_, _| true);
        let out = compositor().composite(&base, &[instance]).unwrap();
        assert_eq!(base, snapshot);
        assert_ne!(out.image, base);
    }

    #[test]
    fn test_pixels_outside_mask_box_and_label_untouched() {
        let base = RgbImage::from_pixel(64, 64, Rgb([50, 50, 50]));
        let bbox = BoundingBox::new(40, 40, 60, 60).unwrap();
        let instance = retained(64, 64, bbox, |x, y| (45..55).contains(&x) && (45..55).contains(&y));
        let out = compositor().composite(&base, &[instance]).unwrap();

        // Far corner: away from mask, box and the label row above the box.
        assert_eq!(out.image.get_pixel(2, 62), &Rgb([50, 50, 50]));
        assert_eq!(out.annotations[0].mask_pixels, 100);
    }

    #[test]
    fn test_mask_pixel_is_blended_with_instance_color() {
        let base = RgbImage::from_pixel(64, 64, Rgb([100, 100, 100]));
        let bbox = BoundingBox::new(40, 40, 60, 60).unwrap();
        let instance = retained(64, 64, bbox, |x, y| x == 50 && y == 50);
        let out = compositor().composite(&base, &[instance]).unwrap();
        let color = out.annotations[0].color;
        assert_eq!(out.image.get_pixel(50, 50).0, blend_pixel([100, 100, 100], color));
    }

    #[test]
    fn test_overlapping_masks_blend_progressively() {
        let base = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let bbox = BoundingBox::new(40, 40, 60, 60).unwrap();
        let a = retained(64, 64, bbox, |x, y| x == 50 && y == 50);
        let b = retained(64, 64, bbox, |x, y| x == 50 && y == 50);
        let out = compositor().composite(&base, &[a, b]).unwrap();

        let first = out.annotations[0].color;
        let second = out.annotations[1].color;
        let expected = blend_pixel(blend_pixel([0, 0, 0], first), second);
        assert_eq!(out.image.get_pixel(50, 50).0, expected);
    }

    #[test]
    fn test_box_outline_two_pixels_thick() {
        let base = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let bbox = BoundingBox::new(30, 30, 50, 50).unwrap();
        let instance = retained(64, 64, bbox, |_, _| false);
        let out = compositor().composite(&base, &[instance]).unwrap();
        let color = Rgb(out.annotations[0].color);

        assert_eq!(out.image.get_pixel(30, 40), &color);
        assert_eq!(out.image.get_pixel(31, 40), &color);
        assert_eq!(out.image.get_pixel(32, 40), &Rgb([0, 0, 0]));
        assert_eq!(out.image.get_pixel(40, 49), &color);
        assert_eq!(out.image.get_pixel(40, 48), &color);
    }

    #[test]
    fn test_mask_dimension_mismatch_fails_before_drawing() {
        let base = RgbImage::new(16, 16);
        let good = retained(16, 16, BoundingBox::new(0, 0, 4, 4).unwrap(), |_, _| true);
        let bad = retained(8, 8, BoundingBox::new(0, 0, 4, 4).unwrap(), |_, _| true);
        let err = compositor().composite(&base, &[good, bad]).unwrap_err();
        assert!(matches!(err, PipelineError::CompositingFailed { .. }));
    }

    #[test]
    fn test_empty_instances_returns_copy() {
        let base = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let out = compositor().composite(&base, &[]).unwrap();
        assert_eq!(out.image, base);
        assert!(out.annotations.is_empty());
    }

    #[test]
    fn test_seeded_random_colors_repeat_across_calls() {
        let config = OverlayConfig {
            colors: ColorPolicy::Random,
            seed: Some(42),
            ..Default::default()
        };
        let compositor = OverlayCompositor::new(&config).unwrap();
        let base = RgbImage::new(16, 16);
        let instance = retained(16, 16, BoundingBox::new(2, 2, 10, 10).unwrap(), |_, _| true);
        let a = compositor.composite(&base, std::slice::from_ref(&instance)).unwrap();
        let b = compositor.composite(&base, &[instance]).unwrap();
        assert_eq!(a.annotations[0].color, b.annotations[0].color);
        assert_eq!(a.image, b.image);
    }
}
