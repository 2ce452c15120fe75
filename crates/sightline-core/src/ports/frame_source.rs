//! 프레임 소스 포트.
//!
//! 구현: `sightline-vision` crate (xcap 스크린 캡처)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::frame::Frame;

/// 화면 프레임 공급자
///
/// 캡처 권한/세션이 비활성이면 `CoreError::CaptureUnavailable`을 반환한다.
/// 자동화 루프는 이를 사이클 스킵으로 처리한다.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// 다음 프레임 획득
    async fn next_frame(&self) -> Result<Frame, CoreError>;

    /// 소스 이름 (예: "xcap", "unavailable")
    fn name(&self) -> &str;
}
