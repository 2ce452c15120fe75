//! 감지 모델 어댑터.
//!
//! 프레임 → 레터박스 → 추론 백엔드 → 디코딩 → 신뢰도 필터 → NMS.
//! 백엔드 호출은 블로킹 풀에서 실행되고 타임아웃으로 제한된다.
//! 타임아웃된 호출은 버리지 않고 보관하며, 끝나기 전에는 새 호출을 시작하지 않는다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sightline_core::config::DetectorConfig;
use sightline_core::error::CoreError;
use sightline_core::models::detection::Detection;
use sightline_core::models::frame::Frame;
use sightline_core::ports::detector::Detector;
use sightline_core::ports::inference::InferenceBackend;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::decode::decode;
use crate::letterbox::prepare;
use crate::model::ModelInfo;
use crate::nms::non_max_suppression;

type InferenceHandle = JoinHandle<Result<Vec<Detection>, CoreError>>;

/// 감지 모델 어댑터
///
/// 추론 백엔드 핸들은 어댑터와 진행 중인 호출이 공유하며,
/// 둘 다 놓으면 해제된다.
pub struct DetectionModelAdapter {
    backend: Arc<dyn InferenceBackend>,
    model: Arc<ModelInfo>,
    config: DetectorConfig,
    /// 타임아웃 후에도 아직 실행 중인 호출
    in_flight: Mutex<Option<InferenceHandle>>,
}

impl DetectionModelAdapter {
    pub fn new(backend: Arc<dyn InferenceBackend>, model: ModelInfo, config: DetectorConfig) -> Self {
        debug!(
            backend = backend.name(),
            model = %model.name,
            version = ?model.version,
            "감지 모델 어댑터 생성"
        );
        Self {
            backend,
            model: Arc::new(model),
            config,
            in_flight: Mutex::new(None),
        }
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.inference_timeout_ms)
    }

    /// 프레임 1장 감지
    ///
    /// 결과는 신뢰도 하한 이상, NMS 적용 후, 신뢰도 내림차순이다.
    pub async fn detect(&self, frame: Frame) -> Result<Vec<Detection>, CoreError> {
        let mut slot = self.in_flight.lock().await;

        if let Some(stale) = slot.take() {
            if stale.is_finished() {
                debug!("이전 타임아웃 호출 종료 확인, 결과 폐기");
            } else {
                *slot = Some(stale);
                return Err(CoreError::Inference(
                    "이전 추론 호출이 아직 진행 중".to_string(),
                ));
            }
        }

        if !frame.is_well_formed() {
            return Err(CoreError::Inference(format!(
                "프레임 형식 불일치: {}x{}, {}바이트",
                frame.width,
                frame.height,
                frame.pixels.len()
            )));
        }

        let backend = Arc::clone(&self.backend);
        let model = Arc::clone(&self.model);
        let config = self.config.clone();
        let mut handle =
            tokio::task::spawn_blocking(move || run_pipeline(backend.as_ref(), &model, frame, &config));

        let timeout = self.timeout();
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(CoreError::Inference(format!(
                "추론 태스크 실패: {join_err}"
            ))),
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(timeout_ms, "추론 타임아웃, 호출 완료 대기 중");
                *slot = Some(handle);
                Err(CoreError::InferenceTimeout { timeout_ms })
            }
        }
    }
}

#[async_trait]
impl Detector for DetectionModelAdapter {
    async fn detect(&self, frame: Frame) -> Result<Vec<Detection>, CoreError> {
        DetectionModelAdapter::detect(self, frame).await
    }
}

impl Drop for DetectionModelAdapter {
    fn drop(&mut self) {
        debug!(model = %self.model.name, "감지 모델 어댑터 해제");
    }
}

/// 블로킹 풀에서 실행되는 감지 파이프라인
fn run_pipeline(
    backend: &dyn InferenceBackend,
    model: &ModelInfo,
    frame: Frame,
    config: &DetectorConfig,
) -> Result<Vec<Detection>, CoreError> {
    let geometry = frame.geometry();
    let (input, letterbox) = prepare(frame, model.image_size)?;
    let output = backend.run(&input)?;
    let detections = decode(&output, model, &letterbox, geometry, config.confidence_floor)?;
    let kept = non_max_suppression(detections, config.iou_threshold);
    debug!(count = kept.len(), "감지 완료");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::YoloVersion;
    use sightline_core::ports::inference::InputTensor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model() -> ModelInfo {
        ModelInfo {
            name: "buttons".to_string(),
            version: YoloVersion::V10,
            description: String::new(),
            author: String::new(),
            labels: vec!["ok".to_string(), "close".to_string()],
            image_size: 32,
        }
    }

    /// 고정 출력 + 지연 + 호출 수 기록
    struct FakeBackend {
        output: Vec<f32>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl InferenceBackend for FakeBackend {
        fn run(&self, _input: &InputTensor) -> Result<Vec<f32>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(self.output.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn v10_output(rows: &[[f32; 6]]) -> Vec<f32> {
        let mut out = vec![0.0; model().output_len()];
        for (i, row) in rows.iter().enumerate() {
            out[i * 6..i * 6 + 6].copy_from_slice(row);
        }
        out
    }

    fn adapter(output: Vec<f32>, delay: Duration, timeout_ms: u64) -> (DetectionModelAdapter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(FakeBackend {
            output,
            delay,
            calls: Arc::clone(&calls),
        });
        let config = DetectorConfig {
            inference_timeout_ms: timeout_ms,
            ..DetectorConfig::default()
        };
        (DetectionModelAdapter::new(backend, model(), config), calls)
    }

    fn frame() -> Frame {
        Frame::from_rgba(32, 32, vec![0; 32 * 32 * 4])
    }

    #[tokio::test]
    async fn detect_filters_and_suppresses() {
        let output = v10_output(&[
            [0.25, 0.25, 0.75, 0.75, 0.9, 0.0],
            [0.26, 0.26, 0.76, 0.76, 0.7, 0.0],
            [0.25, 0.25, 0.75, 0.75, 0.8, 1.0],
            [0.0, 0.0, 0.5, 0.5, 0.01, 0.0],
        ]);
        let (adapter, _) = adapter(output, Duration::ZERO, 1000);

        let dets = adapter.detect(frame()).await.unwrap();
        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[1].class_id, 1);
    }

    #[tokio::test]
    async fn malformed_frame_rejected_without_backend_call() {
        let (adapter, calls) = adapter(v10_output(&[]), Duration::ZERO, 1000);
        let bad = Frame::from_rgba(32, 32, vec![0; 7]);

        let err = adapter.detect(bad).await.unwrap_err();
        assert!(matches!(err, CoreError::Inference(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_output_length_is_inference_error() {
        let (adapter, _) = adapter(vec![0.0; 3], Duration::ZERO, 1000);
        assert!(adapter.detect(frame()).await.unwrap_err().is_inference());
    }

    #[tokio::test]
    async fn timeout_keeps_single_call_in_flight() {
        let (adapter, calls) = adapter(v10_output(&[]), Duration::from_millis(300), 30);

        let err = adapter.detect(frame()).await.unwrap_err();
        assert!(matches!(err, CoreError::InferenceTimeout { timeout_ms: 30 }));

        // 이전 호출이 아직 실행 중: 새 호출 없이 실패
        let err = adapter.detect(frame()).await.unwrap_err();
        assert!(matches!(err, CoreError::Inference(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 이전 호출이 끝나면 다시 시작 가능
        tokio::time::sleep(Duration::from_millis(400)).await;
        let _ = adapter.detect(frame()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
