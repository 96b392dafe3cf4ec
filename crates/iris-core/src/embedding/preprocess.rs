//! Image preprocessing for the CLIP visual tower.
//!
//! CLIP ViT-B/32 expects:
//! - Shortest side resized to 224, then a 224×224 center crop
//! - Normalization with the OpenAI CLIP per-channel mean/std
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Preprocess an image for CLIP inference.
///
/// Returns a `[1, 3, image_size, image_size]` tensor.
pub fn preprocess(image: &RgbImage, image_size: u32) -> Array4<f32> {
    let cropped = resize_and_center_crop(image, image_size);

    let size = image_size as usize;
    let plane = size * size;
    let mut data = vec![0.0f32; CHANNELS * plane];
    for (i, pixel) in cropped.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            data[c * plane + i] = (val as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    Array4::from_shape_vec((1, CHANNELS, size, size), data)
        .unwrap_or_else(|_| Array4::zeros((1, CHANNELS, size, size)))
}

/// Scale so the shorter side equals `size`, then crop the central square.
fn resize_and_center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return RgbImage::new(size, size);
    }

    let scale = size as f32 / w.min(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(size);
    let new_h = ((h as f32 * scale).round() as u32).max(size);
    let resized = imageops::resize(image, new_w, new_h, FilterType::CatmullRom);

    let x = (new_w - size) / 2;
    let y = (new_h - size) / 2;
    imageops::crop_imm(&resized, x, y, size, size).to_image()
}
