//! 자동화 규칙 모델.
//!
//! 규칙은 외부 편집 UI가 생성/수정하고 규칙 저장소가 영속화한다.
//! 규칙 엔진 입장에서는 읽기 전용이다.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::action::{ActionPoint, ActionSpec};

/// 규칙 식별자
pub type RuleId = u64;

/// 정규화 좌표 사각형 (0.0 ~ 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 점 포함 여부 (경계 포함)
    pub fn contains(&self, nx: f32, ny: f32) -> bool {
        nx >= self.x && nx <= self.x + self.width && ny >= self.y && ny <= self.y + self.height
    }

    fn validate(&self) -> Result<(), CoreError> {
        let in_unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.x) || !in_unit(self.y) {
            return Err(CoreError::validation("region", "원점은 [0,1] 범위여야 함"));
        }
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(CoreError::validation("region", "크기는 0보다 커야 함"));
        }
        // 부동소수점 오차 허용
        if self.x + self.width > 1.0 + 1e-6 || self.y + self.height > 1.0 + 1e-6 {
            return Err(CoreError::validation("region", "프레임 범위를 벗어남"));
        }
        Ok(())
    }
}

/// 사용자 정의 자동화 규칙
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// 고유 ID (저장소 내 유일)
    pub id: RuleId,
    /// 표시 이름
    #[serde(default)]
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 대상 클래스 ID
    pub target_class: u32,
    /// 최소 신뢰도 (0.0 ~ 1.0)
    pub min_confidence: f32,
    /// 영역 제한 (None이면 전체 프레임)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<NormalizedRect>,
    /// 발화 시 실행할 액션
    #[serde(default)]
    pub action: ActionSpec,
    /// 재발화 최소 간격 (밀리초)
    #[serde(default)]
    pub cooldown_ms: u64,
    /// 우선순위 (높을수록 먼저 평가)
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// 필드 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(CoreError::validation(
                "min_confidence",
                format!("{}: [0,1] 범위여야 함", self.min_confidence),
            ));
        }
        if let Some(region) = &self.region {
            region.validate()?;
        }
        match &self.action {
            ActionSpec::Tap { at } => validate_point(at)?,
            ActionSpec::Swipe { from, to, .. } => {
                validate_point(from)?;
                validate_point(to)?;
            }
            ActionSpec::None => {}
        }
        Ok(())
    }

    /// 평가 순서: 우선순위 내림차순, 동률이면 ID 오름차순
    pub fn evaluation_order(a: &Rule, b: &Rule) -> Ordering {
        b.priority.cmp(&a.priority).then(a.id.cmp(&b.id))
    }
}

fn validate_point(point: &ActionPoint) -> Result<(), CoreError> {
    match *point {
        ActionPoint::Fixed { x, y } => {
            if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
                Ok(())
            } else {
                Err(CoreError::validation("action", "고정 좌표는 [0,1] 범위여야 함"))
            }
        }
        ActionPoint::BoxOffset { dx, dy } => {
            if dx.is_finite() && dy.is_finite() {
                Ok(())
            } else {
                Err(CoreError::validation("action", "오프셋이 유한하지 않음"))
            }
        }
    }
}
