//! 액션 디스패처와 입력 드라이버 구현.
//!
//! 확정된 `Action`(프레임 픽셀 좌표)을 논리 화면 좌표로 바꿔
//! `InputDriver` 포트로 전달한다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use sightline_core::error::CoreError;
use sightline_core::models::action::{Action, PixelPoint};
use sightline_core::models::frame::FrameGeometry;
use sightline_core::ports::input_driver::InputDriver;

// ============================================================
// ActionDispatcher
// ============================================================

/// 액션 디스패처
pub struct ActionDispatcher {
    driver: Arc<dyn InputDriver>,
}

impl ActionDispatcher {
    pub fn new(driver: Arc<dyn InputDriver>) -> Self {
        debug!(platform = driver.platform(), "액션 디스패처 초기화");
        Self { driver }
    }

    pub fn platform(&self) -> &str {
        self.driver.platform()
    }

    /// 액션 1건 실행. 드라이버 실패는 `CoreError::Dispatch`로 변환한다.
    pub async fn dispatch(&self, action: &Action, geometry: FrameGeometry) -> Result<(), CoreError> {
        let to_logical = |p: &PixelPoint| geometry.to_logical(p.x, p.y);

        let result = match action {
            Action::Tap { at } => {
                let (x, y) = to_logical(at);
                debug!(x, y, "탭 전달");
                self.driver.tap(x, y).await
            }
            Action::Swipe {
                from,
                to,
                duration_ms,
            } => {
                let from = to_logical(from);
                let to = to_logical(to);
                debug!(?from, ?to, duration_ms, "스와이프 전달");
                self.driver.swipe(from, to, *duration_ms).await
            }
            Action::None => return Ok(()),
        };

        result.map_err(|e| match e {
            CoreError::Dispatch(msg) => CoreError::Dispatch(msg),
            other => CoreError::Dispatch(format!("{} ({})", other, action.kind())),
        })
    }
}

// ============================================================
// NoOpInputDriver: 테스트/드라이런용
// ============================================================

/// No-Op 입력 드라이버: 모든 입력을 로깅만 하고 실행하지 않음
///
/// 테스트, 드라이런 모드에서 사용.
pub struct NoOpInputDriver;

#[async_trait]
impl InputDriver for NoOpInputDriver {
    async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError> {
        debug!(x, y, "[NoOp] 탭");
        Ok(())
    }

    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u64,
    ) -> Result<(), CoreError> {
        debug!(?from, ?to, duration_ms, "[NoOp] 스와이프");
        Ok(())
    }

    fn platform(&self) -> &str {
        "noop"
    }
}

// ============================================================
// EnigoInputDriver: 실제 마우스 입력
// ============================================================

/// 스와이프 보간 단계 간격 (밀리초)
#[cfg(feature = "enigo")]
const SWIPE_STEP_MS: u64 = 16;

/// 실제 포인터 입력 드라이버 (enigo 기반)
///
/// macOS: Accessibility 권한 필요
/// Windows: UIAccess 또는 관리자 권한 필요
/// Linux: X11 또는 Wayland + uinput 권한 필요
#[cfg(feature = "enigo")]
pub struct EnigoInputDriver {
    /// enigo 인스턴스 (Send지만 !Sync → tokio::sync::Mutex 사용)
    enigo: tokio::sync::Mutex<enigo::Enigo>,
}

#[cfg(feature = "enigo")]
impl EnigoInputDriver {
    pub fn new() -> Result<Self, CoreError> {
        let settings = enigo::Settings::default();
        let enigo = enigo::Enigo::new(&settings)
            .map_err(|e| CoreError::Dispatch(format!("입력 드라이버 초기화 실패: {e}")))?;
        Ok(Self {
            enigo: tokio::sync::Mutex::new(enigo),
        })
    }
}

#[cfg(feature = "enigo")]
#[async_trait]
impl InputDriver for EnigoInputDriver {
    async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(x, y, "[Enigo] 탭");
        let mut enigo = self.enigo.lock().await;
        enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|e| CoreError::Dispatch(format!("마우스 이동 실패: {e}")))?;
        enigo
            .button(enigo::Button::Left, enigo::Direction::Click)
            .map_err(|e| CoreError::Dispatch(format!("마우스 클릭 실패: {e}")))?;
        Ok(())
    }

    async fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u64,
    ) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(?from, ?to, duration_ms, "[Enigo] 스와이프");
        let mut enigo = self.enigo.lock().await;

        enigo
            .move_mouse(from.0, from.1, enigo::Coordinate::Abs)
            .map_err(|e| CoreError::Dispatch(format!("마우스 이동 실패: {e}")))?;
        enigo
            .button(enigo::Button::Left, enigo::Direction::Press)
            .map_err(|e| CoreError::Dispatch(format!("마우스 누름 실패: {e}")))?;

        let steps = (duration_ms / SWIPE_STEP_MS).max(1);
        let step_delay = std::time::Duration::from_millis(duration_ms / steps);
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            let x = from.0 + ((to.0 - from.0) as f64 * t).round() as i32;
            let y = from.1 + ((to.1 - from.1) as f64 * t).round() as i32;
            tokio::time::sleep(step_delay).await;
            if let Err(e) = enigo.move_mouse(x, y, enigo::Coordinate::Abs) {
                // 버튼이 눌린 채로 남지 않도록 놓고 실패 반환
                let _ = enigo.button(enigo::Button::Left, enigo::Direction::Release);
                return Err(CoreError::Dispatch(format!("스와이프 이동 실패: {e}")));
            }
        }

        enigo
            .button(enigo::Button::Left, enigo::Direction::Release)
            .map_err(|e| CoreError::Dispatch(format!("마우스 놓음 실패: {e}")))?;
        Ok(())
    }

    fn platform(&self) -> &str {
        #[cfg(target_os = "macos")]
        {
            "macos"
        }
        #[cfg(target_os = "windows")]
        {
            "windows"
        }
        #[cfg(target_os = "linux")]
        {
            "linux"
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            "unknown"
        }
    }
}

/// 플랫폼별 입력 드라이버 생성 팩토리
///
/// `enigo` feature 활성화 시 실제 입력 드라이버 반환,
/// 비활성화 또는 초기화 실패 시 NoOp 드라이버 반환.
pub fn create_platform_input_driver() -> Arc<dyn InputDriver> {
    #[cfg(feature = "enigo")]
    {
        match EnigoInputDriver::new() {
            Ok(driver) => {
                tracing::info!("실제 입력 드라이버 (enigo) 초기화 완료");
                return Arc::new(driver);
            }
            Err(e) => {
                tracing::warn!("enigo 초기화 실패, NoOp 폴백: {e}");
            }
        }
    }
    Arc::new(NoOpInputDriver)
}

// ============================================================
// 테스트
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Tap(i32, i32),
        Swipe((i32, i32), (i32, i32), u64),
    }

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    #[async_trait]
    impl InputDriver for RecordingDriver {
        async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError> {
            if self.fail {
                return Err(CoreError::Internal("permission denied".into()));
            }
            self.calls.lock().push(Call::Tap(x, y));
            Ok(())
        }

        async fn swipe(
            &self,
            from: (i32, i32),
            to: (i32, i32),
            duration_ms: u64,
        ) -> Result<(), CoreError> {
            self.calls.lock().push(Call::Swipe(from, to, duration_ms));
            Ok(())
        }

        fn platform(&self) -> &str {
            "recording"
        }
    }

    fn hidpi() -> FrameGeometry {
        FrameGeometry {
            width: 2000,
            height: 1000,
            logical_width: 1000,
            logical_height: 500,
        }
    }

    #[tokio::test]
    async fn tap_is_converted_to_logical_coordinates() {
        let driver = Arc::new(RecordingDriver::default());
        let dispatcher = ActionDispatcher::new(driver.clone());

        let action = Action::Tap {
            at: PixelPoint::new(400.0, 200.0),
        };
        dispatcher.dispatch(&action, hidpi()).await.unwrap();
        assert_eq!(*driver.calls.lock(), vec![Call::Tap(200, 100)]);
    }

    #[tokio::test]
    async fn swipe_forwards_duration() {
        let driver = Arc::new(RecordingDriver::default());
        let dispatcher = ActionDispatcher::new(driver.clone());

        let action = Action::Swipe {
            from: PixelPoint::new(0.0, 0.0),
            to: PixelPoint::new(1000.0, 500.0),
            duration_ms: 250,
        };
        dispatcher.dispatch(&action, hidpi()).await.unwrap();
        assert_eq!(
            *driver.calls.lock(),
            vec![Call::Swipe((0, 0), (500, 250), 250)]
        );
    }

    #[tokio::test]
    async fn none_action_touches_nothing() {
        let driver = Arc::new(RecordingDriver::default());
        let dispatcher = ActionDispatcher::new(driver.clone());
        dispatcher.dispatch(&Action::None, hidpi()).await.unwrap();
        assert!(driver.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn driver_failure_maps_to_dispatch_error() {
        let driver = Arc::new(RecordingDriver {
            fail: true,
            ..Default::default()
        });
        let dispatcher = ActionDispatcher::new(driver);
        let action = Action::Tap {
            at: PixelPoint::new(1.0, 1.0),
        };
        assert!(matches!(
            dispatcher.dispatch(&action, hidpi()).await,
            Err(CoreError::Dispatch(_))
        ));
    }

    #[tokio::test]
    async fn noop_driver_all_methods_ok() {
        let driver = NoOpInputDriver;
        assert!(driver.tap(100, 200).await.is_ok());
        assert!(driver.swipe((0, 0), (10, 10), 100).await.is_ok());
        assert_eq!(driver.platform(), "noop");
    }

    #[test]
    fn factory_creates_driver() {
        let driver = create_platform_input_driver();
        assert!(!driver.platform().is_empty());
    }
}
