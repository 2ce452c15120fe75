//! 규칙 엔진.
//!
//! 한 사이클의 감지 결과를 규칙 스냅샷에 대해 평가하고
//! 최대 하나의 액션을 확정한다. 상태는 `FireStateTable`에만 기록한다.

use std::cmp::Ordering;

use sightline_core::models::action::{Action, ActionPoint, ActionSpec, PixelPoint};
use sightline_core::models::detection::Detection;
use sightline_core::models::frame::FrameGeometry;
use sightline_core::models::rule::{Rule, RuleId};
use tracing::debug;

use crate::rule_store::RuleSnapshot;
use crate::scheduler::FireStateTable;

/// 발동한 규칙과 확정된 액션
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAction {
    pub rule_id: RuleId,
    pub action: Action,
    pub detection: Detection,
}

/// 감지 목록 평가: 최대 하나의 규칙만 발동
///
/// 스냅샷 순서(우선순위 내림차순, ID 오름차순)로 훑으며
/// 쿨다운이 끝났고 매칭 감지가 있는 첫 규칙을 발동한다.
/// 발동 시에만 `now_ms`를 마지막 발동 시각으로 기록한다.
pub fn evaluate(
    detections: &[Detection],
    snapshot: &RuleSnapshot,
    fire_state: &mut FireStateTable,
    geometry: FrameGeometry,
    now_ms: u64,
) -> Option<FiredAction> {
    for rule in snapshot.rules.iter().filter(|r| r.enabled) {
        if !fire_state.is_ready(rule.id, rule.cooldown_ms, now_ms) {
            continue;
        }

        let Some(best) = best_match(rule, detections, geometry) else {
            continue;
        };

        let action = resolve_action(&rule.action, &best, geometry);
        fire_state.record_fire(rule.id, now_ms);
        debug!(
            rule_id = rule.id,
            class_id = best.class_id,
            confidence = best.confidence,
            action = action.kind(),
            "규칙 발동"
        );
        return Some(FiredAction {
            rule_id: rule.id,
            action,
            detection: best,
        });
    }
    None
}

/// 규칙 조건을 만족하는지 (클래스, 신뢰도, 영역)
pub fn matches(rule: &Rule, detection: &Detection, geometry: FrameGeometry) -> bool {
    if detection.class_id != rule.target_class || detection.confidence < rule.min_confidence {
        return false;
    }
    match &rule.region {
        None => true,
        Some(region) => {
            let (cx, cy) = detection.bbox.center();
            let (nx, ny) = geometry.normalize(cx, cy);
            region.contains(nx, ny)
        }
    }
}

/// 매칭 감지 중 최선 선택: 신뢰도 최고 → 면적 최소 → 모델 출력 순서
fn best_match(rule: &Rule, detections: &[Detection], geometry: FrameGeometry) -> Option<Detection> {
    let mut best: Option<&Detection> = None;
    for d in detections.iter().filter(|d| matches(rule, d, geometry)) {
        best = match best {
            None => Some(d),
            Some(current) if is_better(d, current) => Some(d),
            keep => keep,
        };
    }
    best.copied()
}

/// 엄격히 더 나은 경우만 true (동률이면 앞선 감지 유지)
fn is_better(candidate: &Detection, current: &Detection) -> bool {
    match candidate.confidence.total_cmp(&current.confidence) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.bbox.area() < current.bbox.area(),
    }
}

/// 액션 선언 → 프레임 픽셀 좌표 액션
pub fn resolve_action(spec: &ActionSpec, detection: &Detection, geometry: FrameGeometry) -> Action {
    match *spec {
        ActionSpec::Tap { at } => Action::Tap {
            at: resolve_point(at, detection, geometry),
        },
        ActionSpec::Swipe {
            from,
            to,
            duration_ms,
        } => Action::Swipe {
            from: resolve_point(from, detection, geometry),
            to: resolve_point(to, detection, geometry),
            duration_ms,
        },
        ActionSpec::None => Action::None,
    }
}

fn resolve_point(point: ActionPoint, detection: &Detection, geometry: FrameGeometry) -> PixelPoint {
    let (x, y) = match point {
        ActionPoint::BoxOffset { dx, dy } => {
            let (cx, cy) = detection.bbox.center();
            (cx + dx, cy + dy)
        }
        ActionPoint::Fixed { x, y } => geometry.denormalize(x, y),
    };
    let (x, y) = geometry.clamp(x, y);
    PixelPoint::new(x, y)
}
