//! 추론 백엔드 포트.
//!
//! 온디바이스 신경망 실행기를 불투명한 오라클로 취급한다.
//! 모델 파일 포맷과 로딩은 이 포트 바깥의 관심사다.

use crate::error::CoreError;

/// 모델 입력 텐서 (NHWC, f32, 0.0 ~ 1.0)
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    /// [batch, height, width, channels]
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl InputTensor {
    /// 형상과 데이터 길이가 일치하는지
    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }
}

/// 추론 오라클: 입력 텐서를 받아 평탄화된 첫 번째 출력 텐서를 반환
///
/// 블로킹 호출이다. 호출자는 `spawn_blocking` + 타임아웃으로 감싼다.
/// 세션 핸들은 구현체의 수명에 묶이며 `Drop` 시 해제한다.
pub trait InferenceBackend: Send + Sync {
    /// 추론 1회 실행
    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, CoreError>;

    /// 백엔드 이름 (예: "litert", "noop")
    fn name(&self) -> &str;
}
