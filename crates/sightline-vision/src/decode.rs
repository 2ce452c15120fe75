//! YOLO 출력 디코딩.
//!
//! 첫 번째 출력 텐서(평탄화)를 프레임 픽셀 좌표의 감지 목록으로 변환한다.
//! 신뢰도 하한 필터까지 적용하고, NMS는 [`crate::nms`]가 담당한다.

use sightline_core::error::CoreError;
use sightline_core::models::detection::{BoundingBox, Detection};
use sightline_core::models::frame::FrameGeometry;

use crate::letterbox::Letterbox;
use crate::model::{ModelInfo, YoloVersion, V10_CHANNELS, V10_MAX_BOXES};

/// 정규화 입력 좌표 상의 후보 박스
struct Candidate {
    class_id: u32,
    score: f32,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

/// 원시 출력 → 감지 목록 (모델 출력 순서 유지)
pub fn decode(
    output: &[f32],
    model: &ModelInfo,
    letterbox: &Letterbox,
    geometry: FrameGeometry,
    confidence_floor: f32,
) -> Result<Vec<Detection>, CoreError> {
    let expected = model.output_len();
    if output.len() != expected {
        return Err(CoreError::Inference(format!(
            "출력 길이 불일치: 기대 {expected}, 실제 {}",
            output.len()
        )));
    }

    let candidates = match model.version {
        YoloVersion::V8 | YoloVersion::V11 => decode_anchor_major(output, model, confidence_floor),
        YoloVersion::V10 => decode_v10(output, model, confidence_floor),
    };

    let width = geometry.width as f32;
    let height = geometry.height as f32;

    let detections = candidates
        .into_iter()
        .filter_map(|c| {
            let (left, top) = letterbox.restore(c.left, c.top);
            let (right, bottom) = letterbox.restore(c.right, c.bottom);
            let bbox = BoundingBox::from_corners(left, top, right, bottom).clamp_to(width, height);
            (bbox.area() > 0.0).then(|| Detection::new(c.class_id, c.score, bbox))
        })
        .collect();

    Ok(detections)
}

/// V8/V11: `[4 + C, N]` 채널 우선 배치, 앵커별 최고 점수 클래스 선택
fn decode_anchor_major(output: &[f32], model: &ModelInfo, floor: f32) -> Vec<Candidate> {
    let n = model.box_count();
    let classes = model.num_classes();
    let mut candidates = Vec::new();

    for i in 0..n {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_class = 0usize;
        for c in 0..classes {
            let score = output[(4 + c) * n + i];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if !(best_score >= floor) {
            continue;
        }

        let cx = output[i];
        let cy = output[n + i];
        let w = output[2 * n + i];
        let h = output[3 * n + i];

        candidates.push(Candidate {
            class_id: best_class as u32,
            score: best_score,
            left: cx - w / 2.0,
            top: cy - h / 2.0,
            right: cx + w / 2.0,
            bottom: cy + h / 2.0,
        });
    }

    candidates
}

/// V10: `[300, 6]` 행 단위 `(x1, y1, x2, y2, score, class)`
fn decode_v10(output: &[f32], model: &ModelInfo, floor: f32) -> Vec<Candidate> {
    let classes = model.num_classes();

    output
        .chunks_exact(V10_CHANNELS)
        .take(V10_MAX_BOXES)
        .filter_map(|row| {
            let score = row[4];
            if !(score >= floor) {
                return None;
            }
            let class = row[5];
            // 라벨 범위를 벗어난 클래스는 버림
            if !class.is_finite() || class < 0.0 || class as usize >= classes {
                return None;
            }
            Some(Candidate {
                class_id: class as u32,
                score,
                left: row[0],
                top: row[1],
                right: row[2],
                bottom: row[3],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(version: &str, labels: usize, image_size: u32) -> ModelInfo {
        ModelInfo {
            name: "test".to_string(),
            version: YoloVersion::parse(version).unwrap(),
            description: String::new(),
            author: String::new(),
            labels: (0..labels).map(|i| format!("c{i}")).collect(),
            image_size,
        }
    }

    #[test]
    fn v8_picks_best_class_and_restores_coordinates() {
        // 32px 입력 → 앵커 16 + 4 + 1 = 21
        let m = model("v8", 2, 32);
        let n = m.box_count();
        let mut out = vec![0.0f32; m.output_len()];

        // 앵커 3: 중심 (0.5, 0.5), 크기 0.25
        out[3] = 0.5;
        out[n + 3] = 0.5;
        out[2 * n + 3] = 0.25;
        out[3 * n + 3] = 0.25;
        out[4 * n + 3] = 0.2;
        out[5 * n + 3] = 0.9;

        let lb = Letterbox::compute(64, 64, 32).unwrap();
        let dets = decode(&out, &m, &lb, FrameGeometry::new(64, 64), 0.05).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        let b = dets[0].bbox;
        assert!((b.x - 24.0).abs() < 1e-3);
        assert!((b.width - 16.0).abs() < 1e-3);
    }

    #[test]
    fn below_floor_is_dropped() {
        let m = model("v11", 1, 32);
        let n = m.box_count();
        let mut out = vec![0.0f32; m.output_len()];
        out[2 * n] = 0.1;
        out[3 * n] = 0.1;
        out[4 * n] = 0.04;

        let lb = Letterbox::compute(32, 32, 32).unwrap();
        let dets = decode(&out, &m, &lb, FrameGeometry::new(32, 32), 0.05).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn v10_rows_and_invalid_class() {
        let m = model("v10", 2, 32);
        let mut out = vec![0.0f32; m.output_len()];
        out[..6].copy_from_slice(&[0.25, 0.25, 0.75, 0.75, 0.8, 1.0]);
        // 범위 밖 클래스
        out[6..12].copy_from_slice(&[0.1, 0.1, 0.2, 0.2, 0.9, 7.0]);

        let lb = Letterbox::compute(32, 32, 32).unwrap();
        let dets = decode(&out, &m, &lb, FrameGeometry::new(32, 32), 0.05).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(8.0, 8.0, 16.0, 16.0));
    }

    #[test]
    fn boxes_in_padding_are_clamped_or_dropped() {
        let m = model("v10", 1, 32);
        let mut out = vec![0.0f32; m.output_len()];
        // 64x32 프레임 → 상하 8px 패딩. 상단 패딩 안쪽의 박스
        out[..6].copy_from_slice(&[0.1, 0.0, 0.2, 0.2, 0.9, 0.0]);

        let lb = Letterbox::compute(64, 32, 32).unwrap();
        let dets = decode(&out, &m, &lb, FrameGeometry::new(64, 32), 0.05).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn wrong_length_is_inference_error() {
        let m = model("v8", 2, 32);
        let lb = Letterbox::compute(32, 32, 32).unwrap();
        let err = decode(&[0.0; 5], &m, &lb, FrameGeometry::new(32, 32), 0.05).unwrap_err();
        assert!(err.is_inference());
    }
}
