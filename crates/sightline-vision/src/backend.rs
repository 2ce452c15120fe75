//! 추론 백엔드 구현.
//!
//! 실제 신경망 런타임은 플랫폼 SDK에 묶여 있어 별도 바인딩으로 주입한다.
//! 바인딩이 없으면 [`NoOpInferenceBackend`]로 동작한다 (감지 0건).

use std::sync::Arc;

use sightline_core::error::CoreError;
use sightline_core::ports::inference::{InferenceBackend, InputTensor};
use tracing::{debug, info};

use crate::model::ModelInfo;

/// 항상 0으로 채운 출력을 반환하는 백엔드
///
/// 점수가 모두 0이므로 신뢰도 하한에서 전부 걸러진다.
pub struct NoOpInferenceBackend {
    output_len: usize,
    input_side: usize,
}

impl NoOpInferenceBackend {
    pub fn new(model: &ModelInfo) -> Self {
        Self {
            output_len: model.output_len(),
            input_side: model.image_size as usize,
        }
    }
}

impl InferenceBackend for NoOpInferenceBackend {
    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, CoreError> {
        let expected = [1, self.input_side, self.input_side, 3];
        if input.shape != expected || !input.is_consistent() {
            return Err(CoreError::Inference(format!(
                "입력 형상 불일치: 기대 {expected:?}, 실제 {:?}",
                input.shape
            )));
        }
        debug!("NoOp 추론: 출력 {}개", self.output_len);
        Ok(vec![0.0; self.output_len])
    }

    fn name(&self) -> &str {
        "noop"
    }
}

impl Drop for NoOpInferenceBackend {
    fn drop(&mut self) {
        debug!("NoOp 추론 백엔드 해제");
    }
}

/// 모델에 맞는 추론 백엔드 생성
pub fn create_inference_backend(model: &ModelInfo) -> Arc<dyn InferenceBackend> {
    info!(
        model = %model.name,
        "네이티브 추론 런타임 미연결: NoOp 백엔드 사용"
    );
    Arc::new(NoOpInferenceBackend::new(model))
}
