//! Per-instance overlay colors.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ColorPolicy;

/// Golden angle in degrees; consecutive hues land far apart on the wheel.
const HUE_STEP: f32 = 137.507_77;
const SATURATION: f32 = 0.85;
const VALUE: f32 = 0.95;

/// Hands out one RGB color per instance, in composition order.
pub enum Palette {
    /// Fixed high-contrast HSV sequence indexed by instance order
    Fixed,
    /// Pseudorandom channels in [0, 255)
    Random(StdRng),
}

impl Palette {
    pub fn new(policy: ColorPolicy, seed: Option<u64>) -> Self {
        match policy {
            ColorPolicy::Palette => Self::Fixed,
            ColorPolicy::Random => Self::Random(match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            }),
        }
    }

    /// Color for the instance at position `index`.
    pub fn color(&mut self, index: usize) -> [u8; 3] {
        match self {
            Self::Fixed => {
                let hue = (index as f32 * HUE_STEP) % 360.0;
                hsv_to_rgb(hue, SATURATION, VALUE)
            }
            Self::Random(rng) => [
                rng.gen_range(0..255),
                rng.gen_range(0..255),
                rng.gen_range(0..255),
            ],
        }
    }
}

/// HSV to RGB; `h` in degrees [0, 360), `s` and `v` in [0, 1].
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}
