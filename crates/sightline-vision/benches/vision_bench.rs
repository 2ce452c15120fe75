//! sightline-vision 성능 벤치마크
//!
//! 실행: cargo bench -p sightline-vision
//!
//! 벤치마크 대상:
//! - 레터박스 전처리 (prepare)
//! - V8 출력 디코딩 (decode)
//! - 클래스별 NMS (non_max_suppression)

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sightline_core::models::detection::{BoundingBox, Detection};
use sightline_core::models::frame::{Frame, FrameGeometry};
use sightline_vision::decode::decode;
use sightline_vision::letterbox::{prepare, Letterbox};
use sightline_vision::nms::non_max_suppression;
use sightline_vision::{ModelInfo, YoloVersion};

/// 테스트용 패턴 프레임 생성
fn create_test_frame(width: u32, height: u32) -> Frame {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x as u8).wrapping_mul(17),
                (y as u8).wrapping_mul(31),
                (x as u8).wrapping_add(y as u8),
                255,
            ]);
        }
    }
    Frame::from_rgba(width, height, pixels)
}

fn test_model(classes: usize) -> ModelInfo {
    ModelInfo {
        name: "bench".to_string(),
        version: YoloVersion::V8,
        description: String::new(),
        author: String::new(),
        labels: (0..classes).map(|i| format!("class{i}")).collect(),
        image_size: 640,
    }
}

/// 레터박스 전처리 벤치마크
fn bench_letterbox(c: &mut Criterion) {
    let mut group = c.benchmark_group("letterbox");

    let resolutions = [(1280, 720), (1920, 1080), (2880, 1800)];
    for (w, h) in resolutions {
        let frame = create_test_frame(w, h);
        group.throughput(Throughput::Elements((w * h) as u64));
        group.bench_with_input(BenchmarkId::new("prepare_640", format!("{w}x{h}")), &frame, |b, f| {
            b.iter(|| prepare(black_box(f.clone()), 640).unwrap());
        });
    }

    group.finish();
}

/// V8 출력 디코딩 벤치마크 (8400 앵커)
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for classes in [1usize, 10, 80] {
        let model = test_model(classes);
        let n = model.box_count();
        let mut output = vec![0.0f32; model.output_len()];
        // 앵커 10개마다 후보 하나
        for i in (0..n).step_by(10) {
            output[i] = 0.5;
            output[n + i] = 0.5;
            output[2 * n + i] = 0.1;
            output[3 * n + i] = 0.1;
            output[(4 + i % classes) * n + i] = 0.6;
        }
        let letterbox = Letterbox::compute(1920, 1080, 640).unwrap();
        let geometry = FrameGeometry::new(1920, 1080);

        group.bench_with_input(BenchmarkId::new("v8", classes), &output, |b, out| {
            b.iter(|| decode(black_box(out), &model, &letterbox, geometry, 0.05).unwrap());
        });
    }

    group.finish();
}

/// NMS 벤치마크
fn bench_nms(c: &mut Criterion) {
    let mut group = c.benchmark_group("nms");

    for count in [50usize, 200, 800] {
        let detections: Vec<Detection> = (0..count)
            .map(|i| {
                let x = (i % 40) as f32 * 12.0;
                let y = (i / 40) as f32 * 12.0;
                Detection::new(
                    (i % 3) as u32,
                    0.3 + (i % 7) as f32 * 0.1,
                    BoundingBox::new(x, y, 20.0, 20.0),
                )
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("class_aware", count), &detections, |b, d| {
            b.iter(|| non_max_suppression(black_box(d.clone()), 0.45));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_letterbox, bench_decode, bench_nms);
criterion_main!(benches);
