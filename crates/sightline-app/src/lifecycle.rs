//! 라이프사이클 관리.
//!
//! OS 시그널 또는 루프 자체 정지(연속 추론 실패 한도)를 기다린 뒤
//! 자동화 루프를 정지시키고 자원 해제까지 대기한다.

use sightline_automation::{AutomationLoop, LoopState, StopReason};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 종료 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT / SIGTERM / Ctrl+C
    Signal,
    /// 외부 `shutdown()` 호출
    Requested,
    /// 루프가 스스로 정지
    LoopStopped(StopReason),
}

impl ShutdownCause {
    /// 프로세스 종료 상태로 변환. 추론 실패 한도 정지는 오류로 끝난다.
    pub fn into_result(self) -> anyhow::Result<()> {
        match self {
            ShutdownCause::LoopStopped(StopReason::InferenceFailureLimit { failures }) => Err(
                anyhow::anyhow!("연속 추론 실패 {failures}회로 자동화 루프 정지"),
            ),
            _ => Ok(()),
        }
    }
}

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    /// 새 라이프사이클 관리자 생성
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    /// 루프가 끝날 때까지 실행
    ///
    /// 시그널, `shutdown()`, 루프 자체 정지 중 먼저 오는 것에서 깨어나
    /// `stop()`으로 자원 해제까지 기다린다.
    pub async fn run(&self, automation: &AutomationLoop) -> ShutdownCause {
        let mut shutdown_rx = self.subscribe();
        let mut state_rx = automation.subscribe();

        let cause = tokio::select! {
            _ = wait_for_signal() => ShutdownCause::Signal,
            _ = shutdown_rx.wait_for(|down| *down) => ShutdownCause::Requested,
            reason = wait_for_stopped(&mut state_rx) => ShutdownCause::LoopStopped(reason),
        };

        match cause {
            ShutdownCause::LoopStopped(StopReason::InferenceFailureLimit { failures }) => {
                error!(failures, "연속 추론 실패 한도 도달, 루프 정지됨");
            }
            other => info!(cause = ?other, "종료 시작"),
        }

        if let Err(e) = automation.stop().await {
            warn!("자동화 루프 정지 실패: {e}");
        }
        let stats = automation.stats();
        info!(?stats, "자동화 루프 종료");
        cause
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 루프가 Stopped에 도달할 때까지 대기
async fn wait_for_stopped(rx: &mut watch::Receiver<LoopState>) -> StopReason {
    loop {
        if let LoopState::Stopped(reason) = *rx.borrow_and_update() {
            return reason;
        }
        if rx.changed().await.is_err() {
            return StopReason::Requested;
        }
    }
}

/// OS 시그널 대기 (SIGINT, SIGTERM)
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => info!("SIGINT 수신"),
                    _ = sigterm.recv() => info!("SIGTERM 수신"),
                }
                return;
            }
            _ => warn!("유닉스 시그널 핸들러 등록 실패, Ctrl+C만 대기"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C 수신"),
        Err(e) => {
            warn!("Ctrl+C 핸들러 등록 실패: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sightline_automation::{ActionDispatcher, LoopComponents, NoOpInputDriver, RuleStore};
    use sightline_core::config::AppConfig;
    use sightline_core::error::CoreError;
    use sightline_core::models::detection::Detection;
    use sightline_core::models::frame::Frame;
    use sightline_core::ports::detector::Detector;
    use sightline_core::ports::frame_source::FrameSource;
    use sightline_storage::MemoryKvStore;
    use std::sync::Arc;

    struct BlankFrames;

    #[async_trait]
    impl FrameSource for BlankFrames {
        async fn next_frame(&self) -> Result<Frame, CoreError> {
            Ok(Frame::from_rgba(4, 4, vec![0; 64]))
        }

        fn name(&self) -> &str {
            "blank"
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl Detector for FailingDetector {
        async fn detect(&self, _frame: Frame) -> Result<Vec<Detection>, CoreError> {
            Err(CoreError::Inference("model crashed".into()))
        }
    }

    async fn automation() -> AutomationLoop {
        let (rules, _) = RuleStore::load(Arc::new(MemoryKvStore::new()), "automation.rules").await;
        AutomationLoop::new(
            LoopComponents {
                frames: Arc::new(BlankFrames),
                detector: Arc::new(FailingDetector),
                rules: Arc::new(rules),
                dispatcher: ActionDispatcher::new(Arc::new(NoOpInputDriver)),
            },
            &AppConfig::default_config(),
        )
    }

    #[test]
    fn lifecycle_creation() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        assert!(!*rx.borrow());
    }

    #[test]
    fn shutdown_signal() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        lm.shutdown();
        assert!(*rx.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_when_shutdown_requested() {
        let lm = LifecycleManager::new();
        let automation = automation().await;
        automation.start().unwrap();
        automation.pause().unwrap();

        lm.shutdown();
        let cause = lm.run(&automation).await;
        assert_eq!(cause, ShutdownCause::Requested);
        assert_eq!(automation.state(), LoopState::Stopped(StopReason::Requested));
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_when_loop_stops_itself() {
        let lm = LifecycleManager::new();
        let automation = automation().await;
        automation.start().unwrap();

        let cause = lm.run(&automation).await;
        assert_eq!(
            cause,
            ShutdownCause::LoopStopped(StopReason::InferenceFailureLimit { failures: 5 })
        );
        assert!(cause.into_result().is_err());
    }

    #[test]
    fn only_failure_limit_is_error_exit() {
        assert!(ShutdownCause::Signal.into_result().is_ok());
        assert!(ShutdownCause::Requested.into_result().is_ok());
        assert!(ShutdownCause::LoopStopped(StopReason::Requested)
            .into_result()
            .is_ok());

        let err = ShutdownCause::LoopStopped(StopReason::InferenceFailureLimit { failures: 3 })
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains('3'));
    }
}
