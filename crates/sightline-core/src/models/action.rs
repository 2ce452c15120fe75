//! 자동화 액션 모델.
//!
//! `ActionSpec`은 규칙에 부착되는 선언(정규화/박스 상대 좌표),
//! `Action`은 감지 결과로 좌표가 확정된 실행 단위(프레임 픽셀 좌표)다.

use serde::{Deserialize, Serialize};

/// 액션 좌표 지정 방식
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPoint {
    /// 매칭된 박스 중심 + 픽셀 오프셋
    BoxOffset {
        #[serde(default)]
        dx: f32,
        #[serde(default)]
        dy: f32,
    },
    /// 프레임 기준 고정 좌표 (0.0 ~ 1.0 정규화)
    Fixed { x: f32, y: f32 },
}

impl Default for ActionPoint {
    fn default() -> Self {
        ActionPoint::BoxOffset { dx: 0.0, dy: 0.0 }
    }
}

/// 규칙에 부착되는 액션 선언
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    /// 단일 탭
    Tap {
        #[serde(default)]
        at: ActionPoint,
    },
    /// 스와이프 (시작 → 끝, 지속 시간)
    Swipe {
        from: ActionPoint,
        to: ActionPoint,
        duration_ms: u64,
    },
    /// 입력 없음 (쿨다운만 갱신)
    #[default]
    None,
}

/// 프레임 픽셀 좌표 점
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 좌표가 확정된 액션
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Tap {
        at: PixelPoint,
    },
    Swipe {
        from: PixelPoint,
        to: PixelPoint,
        duration_ms: u64,
    },
    None,
}

impl Action {
    /// 액션 종류 이름 (로깅용)
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Tap { .. } => "tap",
            Action::Swipe { .. } => "swipe",
            Action::None => "none",
        }
    }
}
