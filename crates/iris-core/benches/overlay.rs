//! Benchmarks for the reranking and overlay stages.
//!
//! Run with: cargo bench -p iris-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};
use iris_core::caption::{dedup_candidates, rank_by_similarity};
use iris_core::config::OverlayConfig;
use iris_core::{BoundingBox, DetectedInstance, OverlayCompositor, SegmentationFilter};
use ndarray::Array2;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn street_image() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 96]))
}

/// Detector-style output: half-resolution soft masks, mixed confidences.
fn detections(count: u32) -> Vec<DetectedInstance> {
    let (mh, mw) = ((HEIGHT / 2) as usize, (WIDTH / 2) as usize);
    (0..count)
        .map(|i| {
            let x1 = (i * 37 % (WIDTH - 120)) as i32;
            let y1 = (i * 53 % (HEIGHT - 90)) as i32;
            let (x2, y2) = (x1 + 110, y1 + 80);
            let mask = Array2::from_shape_fn((mh, mw), |(y, x)| {
                let (px, py) = ((x * 2) as i32, (y * 2) as i32);
                if (x1..x2).contains(&px) && (y1..y2).contains(&py) {
                    0.9
                } else {
                    0.1
                }
            });
            DetectedInstance {
                mask,
                bbox: BoundingBox {
                    x1,
                    y1,
                    x2,
                    y2,
                },
                label: i % 80 + 1,
                confidence: 0.5 + (i % 5) as f32 * 0.1,
            }
        })
        .collect()
}

fn benchmark_filter(c: &mut Criterion) {
    let instances = detections(12);
    let filter = SegmentationFilter::new(0.7).unwrap();

    c.bench_function("filter_12_instances", |b| {
        b.iter(|| {
            let _ = filter.filter(black_box(&instances), WIDTH, HEIGHT);
        })
    });
}

fn benchmark_composite(c: &mut Criterion) {
    let image = street_image();
    let retained = SegmentationFilter::new(0.7)
        .unwrap()
        .filter(&detections(12), WIDTH, HEIGHT)
        .unwrap();
    let compositor = OverlayCompositor::new(&OverlayConfig::default()).unwrap();

    c.bench_function("composite_640x480", |b| {
        b.iter(|| {
            let _ = compositor.composite(black_box(&image), black_box(&retained));
        })
    });
}

fn benchmark_rerank(c: &mut Criterion) {
    let raw: Vec<String> = (0..32).map(|i| format!("a street scene number {}", i % 20)).collect();
    let candidates = dedup_candidates(&raw);
    let image_embedding: Vec<f32> = (0..512).map(|i| (i as f32 * 0.01).sin()).collect();
    let text_embeddings: Vec<Vec<f32>> = (0..candidates.len())
        .map(|c| (0..512).map(|i| ((i + c * 7) as f32 * 0.01).cos()).collect())
        .collect();

    c.bench_function("rank_20_candidates_512d", |b| {
        b.iter(|| {
            let _ = rank_by_similarity(
                black_box(&candidates),
                black_box(&image_embedding),
                black_box(&text_embeddings),
            );
        })
    });
}

criterion_group!(benches, benchmark_filter, benchmark_composite, benchmark_rerank);
criterion_main!(benches);
