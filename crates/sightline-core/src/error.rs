//! Sightline 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 외부 에러를 `CoreError`의 해당 변형으로 매핑한다.
//! 자동화 루프는 변형에 따라 사이클 스킵 / 실패 카운트 / 로그만 남김을 결정한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 화면 캡처 세션 비활성 (권한 없음, 세션 종료 등): 사이클 스킵
    #[error("캡처 불가: {0}")]
    CaptureUnavailable(String),

    /// 추론 백엔드가 입력을 거부하거나 실패함
    #[error("추론 에러: {0}")]
    Inference(String),

    /// 추론 호출 타임아웃
    #[error("추론 타임아웃: {timeout_ms}ms 초과")]
    InferenceTimeout {
        /// 초과된 타임아웃 시간 (밀리초)
        timeout_ms: u64,
    },

    /// 입력 주입 실패: 로그만 남김
    #[error("입력 전달 실패: {0}")]
    Dispatch(String),

    /// 규칙 저장/로드 실패
    #[error("영속화 에러: {0}")]
    Persistence(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 현재 상태에서 허용되지 않는 전이
    #[error("잘못된 상태 전이: {0}")]
    InvalidState(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Rule")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 추론 실패 계열 여부 (연속 실패 한도에 집계됨)
    pub fn is_inference(&self) -> bool {
        matches!(
            self,
            CoreError::Inference(_) | CoreError::InferenceTimeout { .. }
        )
    }

    /// 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_family() {
        assert!(CoreError::Inference("bad shape".into()).is_inference());
        assert!(CoreError::InferenceTimeout { timeout_ms: 10 }.is_inference());
        assert!(!CoreError::CaptureUnavailable("off".into()).is_inference());
        assert!(!CoreError::Dispatch("x".into()).is_inference());
    }

    #[test]
    fn timeout_message_contains_budget() {
        let msg = CoreError::InferenceTimeout { timeout_ms: 2000 }.to_string();
        assert!(msg.contains("2000ms"));
    }
}
