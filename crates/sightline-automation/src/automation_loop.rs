//! 자동화 루프.
//!
//! 단일 워커 태스크가 캡처 → 감지 → 규칙 평가 → 입력 전달 사이클을 반복한다.
//! 제어 핸들(`AutomationLoop`)은 복제 가능하며 어느 태스크에서든
//! `start` / `pause` / `stop`을 호출할 수 있다.
//!
//! 상태 전이: `Idle → Running ⇄ Paused → Stopped` (Stopped는 종단)

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sightline_core::config::AppConfig;
use sightline_core::error::CoreError;
use sightline_core::ports::detector::Detector;
use sightline_core::ports::frame_source::FrameSource;

use crate::dispatcher::ActionDispatcher;
use crate::rule_engine::evaluate;
use crate::rule_store::RuleStore;
use crate::scheduler::{CadenceScheduler, FireStateTable};

/// 정지 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` 호출
    Requested,
    /// 연속 추론 실패 한도 도달
    InferenceFailureLimit { failures: u32 },
}

/// 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Running,
    Paused,
    Stopped(StopReason),
}

impl LoopState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, LoopState::Stopped(_))
    }
}

/// 사이클 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// 시작된 사이클 수
    pub cycles: u64,
    /// 캡처 불가로 건너뛴 사이클 수
    pub frames_skipped: u64,
    /// 누적 추론 실패 수
    pub inference_failures: u64,
    /// 현재 연속 추론 실패 수
    pub consecutive_failures: u32,
    /// 실제로 전달된 액션 수
    pub actions_fired: u64,
    /// 입력 전달 실패 수
    pub dispatch_failures: u64,
}

/// 루프 구성 요소
pub struct LoopComponents {
    pub frames: Arc<dyn FrameSource>,
    pub detector: Arc<dyn Detector>,
    pub rules: Arc<RuleStore>,
    pub dispatcher: ActionDispatcher,
}

/// 핸들과 워커가 공유하는 상태
struct Shared {
    state_tx: watch::Sender<LoopState>,
    /// 상태 전이 직렬화
    transition: Mutex<()>,
    /// 입력 전달 구간. `stop()`은 이 잠금을 잡은 뒤 Stopped를 게시한다.
    dispatch_gate: tokio::sync::Mutex<()>,
    stats: Mutex<LoopStats>,
}

impl Shared {
    fn state(&self) -> LoopState {
        *self.state_tx.borrow()
    }

    /// 종단 상태가 아니면 Stopped 게시. 새로 정지시켰으면 true.
    fn publish_stopped(&self, reason: StopReason) -> bool {
        let _t = self.transition.lock();
        if self.state().is_stopped() {
            return false;
        }
        self.state_tx.send_replace(LoopState::Stopped(reason));
        true
    }
}

/// 자동화 루프 제어 핸들
#[derive(Clone)]
pub struct AutomationLoop {
    shared: Arc<Shared>,
    /// 첫 `start()`에서 워커로 넘어감
    pending: Arc<Mutex<Option<Worker>>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AutomationLoop {
    pub fn new(components: LoopComponents, config: &AppConfig) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Idle);
        let shared = Arc::new(Shared {
            state_tx,
            transition: Mutex::new(()),
            dispatch_gate: tokio::sync::Mutex::new(()),
            stats: Mutex::new(LoopStats::default()),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            frames: components.frames,
            detector: components.detector,
            rules: components.rules,
            dispatcher: components.dispatcher,
            cadence: CadenceScheduler::new(&config.cadence),
            fire_state: FireStateTable::new(),
            max_failures: config.automation.max_consecutive_failures.max(1),
        };

        Self {
            shared,
            pending: Arc::new(Mutex::new(Some(worker))),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.shared.state_tx.subscribe()
    }

    pub fn stats(&self) -> LoopStats {
        *self.shared.stats.lock()
    }

    /// Idle/Paused → Running. 첫 호출에서 워커 태스크를 띄운다.
    ///
    /// tokio 런타임 안에서 호출해야 한다.
    pub fn start(&self) -> Result<(), CoreError> {
        let _t = self.shared.transition.lock();
        match self.shared.state() {
            LoopState::Idle => {
                let worker = self.pending.lock().take().ok_or_else(|| {
                    CoreError::Internal("워커 구성 요소가 이미 소비됨".to_string())
                })?;
                self.shared.state_tx.send_replace(LoopState::Running);
                *self.worker.lock() = Some(tokio::spawn(worker.run()));
                info!("자동화 루프 시작");
                Ok(())
            }
            LoopState::Paused => {
                self.shared.state_tx.send_replace(LoopState::Running);
                info!("자동화 루프 재개");
                Ok(())
            }
            other => Err(invalid("start", other)),
        }
    }

    /// Running → Paused
    pub fn pause(&self) -> Result<(), CoreError> {
        let _t = self.shared.transition.lock();
        match self.shared.state() {
            LoopState::Running => {
                self.shared.state_tx.send_replace(LoopState::Paused);
                info!("자동화 루프 일시정지");
                Ok(())
            }
            other => Err(invalid("pause", other)),
        }
    }

    /// 어느 상태에서든 Stopped로 전이하고 자원 해제까지 대기
    ///
    /// 진행 중인 입력 전달이 끝날 때까지 기다리며,
    /// 반환 후에는 어떤 액션도 전달되지 않는다. 이미 정지된 경우 아무것도 하지 않는다.
    pub async fn stop(&self) -> Result<(), CoreError> {
        {
            let gate = self.shared.dispatch_gate.lock().await;
            if self.shared.publish_stopped(StopReason::Requested) {
                info!("자동화 루프 정지 요청");
            }
            drop(gate);
        }

        // 시작 전이면 구성 요소를 여기서 해제
        drop(self.pending.lock().take());

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("워커 태스크 비정상 종료: {e}");
            }
        }
        debug!("자동화 루프 자원 해제 완료");
        Ok(())
    }
}

fn invalid(op: &str, state: LoopState) -> CoreError {
    CoreError::InvalidState(format!("{state:?} 상태에서 {op} 불가"))
}

/// 사이클 결과
enum Flow {
    Continue,
    Exit,
}

/// 워커 태스크가 소유하는 루프 본체
struct Worker {
    shared: Arc<Shared>,
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn Detector>,
    rules: Arc<RuleStore>,
    dispatcher: ActionDispatcher,
    cadence: CadenceScheduler,
    fire_state: FireStateTable,
    max_failures: u32,
}

impl Worker {
    async fn run(mut self) {
        let mut rx = self.shared.state_tx.subscribe();
        let clock = Instant::now();
        let mut revision = None;

        loop {
            let state = *rx.borrow_and_update();
            match state {
                LoopState::Running => {}
                LoopState::Stopped(_) => break,
                LoopState::Idle | LoopState::Paused => {
                    if rx.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let started = Instant::now();
            if let Flow::Exit = self.cycle(&mut rx, clock, &mut revision).await {
                break;
            }

            let delay = self.cadence.next_delay(started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let stats = *self.shared.stats.lock();
        info!(?stats, "자동화 워커 종료");
    }

    async fn cycle(
        &mut self,
        rx: &mut watch::Receiver<LoopState>,
        clock: Instant,
        revision: &mut Option<u64>,
    ) -> Flow {
        self.shared.stats.lock().cycles += 1;

        let captured = tokio::select! {
            result = self.frames.next_frame() => result,
            _ = wait_stopped(rx) => return Flow::Exit,
        };
        let frame = match captured {
            Ok(frame) => frame,
            Err(e) => {
                warn!(source = self.frames.name(), "프레임 획득 실패, 사이클 건너뜀: {e}");
                self.shared.stats.lock().frames_skipped += 1;
                return Flow::Continue;
            }
        };
        let geometry = frame.geometry();

        let detected = tokio::select! {
            result = self.detector.detect(frame) => result,
            _ = wait_stopped(rx) => return Flow::Exit,
        };

        let detections = match detected {
            Ok(detections) => {
                self.shared.stats.lock().consecutive_failures = 0;
                detections
            }
            Err(e) => {
                let failures = {
                    let mut stats = self.shared.stats.lock();
                    stats.inference_failures += 1;
                    stats.consecutive_failures += 1;
                    stats.consecutive_failures
                };
                warn!(failures, limit = self.max_failures, "감지 실패: {e}");
                if failures >= self.max_failures {
                    if self
                        .shared
                        .publish_stopped(StopReason::InferenceFailureLimit { failures })
                    {
                        warn!(failures, "연속 추론 실패 한도 도달, 루프 정지");
                    }
                    return Flow::Exit;
                }
                return Flow::Continue;
            }
        };

        // 감지 중 일시정지/정지된 경우 평가하지 않음 (쿨다운 기록 방지)
        if self.shared.state() != LoopState::Running {
            return Flow::Continue;
        }

        let snapshot = self.rules.snapshot();
        if *revision != Some(snapshot.revision) {
            self.fire_state.retain_rules(snapshot.ids());
            *revision = Some(snapshot.revision);
        }

        let now_ms = clock.elapsed().as_millis() as u64;
        let Some(fired) = evaluate(
            &detections,
            &snapshot,
            &mut self.fire_state,
            geometry,
            now_ms,
        ) else {
            return Flow::Continue;
        };

        let _gate = self.shared.dispatch_gate.lock().await;
        if self.shared.state() != LoopState::Running {
            debug!(rule_id = fired.rule_id, "루프가 실행 중이 아님, 액션 폐기");
            return Flow::Continue;
        }
        match self.dispatcher.dispatch(&fired.action, geometry).await {
            Ok(()) => {
                self.shared.stats.lock().actions_fired += 1;
                info!(
                    rule_id = fired.rule_id,
                    action = fired.action.kind(),
                    now_ms,
                    "액션 전달"
                );
            }
            Err(e) => {
                self.shared.stats.lock().dispatch_failures += 1;
                warn!(rule_id = fired.rule_id, "액션 전달 실패: {e}");
            }
        }
        Flow::Continue
    }
}

/// Stopped가 게시될 때까지 대기 (채널이 닫혀도 반환)
async fn wait_stopped(rx: &mut watch::Receiver<LoopState>) {
    let _ = rx.wait_for(LoopState::is_stopped).await;
}
