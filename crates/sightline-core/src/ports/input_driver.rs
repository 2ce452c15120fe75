//! 입력 드라이버 포트.
//!
//! 탭/스와이프 포인터 입력을 위한 크로스 플랫폼 인터페이스를 정의한다.
//! 좌표는 논리 화면 좌표계다.

use async_trait::async_trait;

use crate::error::CoreError;

/// 입력 드라이버: 포인터 입력 시뮬레이션 인터페이스
///
/// 구현체: `EnigoInputDriver` (실제 입력), `NoOpInputDriver` (테스트용)
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// 단일 탭 (이동 + 클릭)
    async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError>;

    /// 스와이프 (누름 → 이동 → 놓음)
    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u64,
    ) -> Result<(), CoreError>;

    /// 플랫폼 이름 (예: "macos", "windows", "linux")
    fn platform(&self) -> &str;
}
