//! 클래스별 Non-Maximum Suppression.

use sightline_core::models::detection::Detection;

/// 같은 클래스에서 IoU가 `iou_threshold`를 초과하는 박스를 제거
///
/// 신뢰도 내림차순으로 탐욕적으로 선택한다. 동점은 입력 순서를 유지한다.
/// 이미 억제된 목록에 다시 적용해도 결과가 바뀌지 않는다.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
