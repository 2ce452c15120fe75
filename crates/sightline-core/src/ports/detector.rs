//! 감지기 포트.
//!
//! 구현: `sightline-vision` crate (`DetectionModelAdapter`)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::detection::Detection;
use crate::models::frame::Frame;

/// 프레임 → 감지 목록
///
/// 실패는 `CoreError::Inference` 또는 `CoreError::InferenceTimeout`.
/// 반환 목록은 신뢰도 하한과 NMS가 이미 적용된 상태다.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: Frame) -> Result<Vec<Detection>, CoreError>;
}
