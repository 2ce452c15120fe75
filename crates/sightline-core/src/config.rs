//! 애플리케이션 설정 구조체.
//!
//! 감지기 임계값, 사이클 주기, 자동화 루프 한도, 저장소 경로, 모델 메타데이터 경로 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 감지 모델 어댑터 설정
    #[serde(default)]
    pub detector: DetectorConfig,
    /// 사이클 주기/백프레셔 설정
    #[serde(default)]
    pub cadence: CadenceConfig,
    /// 자동화 루프 설정
    #[serde(default)]
    pub automation: AutomationConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 모델 아티팩트 설정
    #[serde(default)]
    pub model: ModelConfig,
}

// ============================================================
// 감지기 설정
// ============================================================

/// 감지 모델 어댑터 설정: 신뢰도 하한, NMS 임계값, 추론 타임아웃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 전역 신뢰도 하한 (미만 감지는 반환 전 폐기)
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
    /// 동일 클래스 NMS IoU 임계값 (초과 시 병합)
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// 추론 호출 타임아웃 (밀리초)
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            iou_threshold: default_iou_threshold(),
            inference_timeout_ms: default_inference_timeout_ms(),
        }
    }
}

// ============================================================
// 사이클 주기 설정
// ============================================================

/// 사이클 주기 설정: 목표 간격과 지연 기반 적응형 확장
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// 목표 사이클 간격 (밀리초)
    #[serde(default = "default_target_interval_ms")]
    pub target_interval_ms: u64,
    /// 적응형 확장 상한 (밀리초)
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// 사이클 소요 시간이 이 값을 넘으면 간격 확장 (밀리초)
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            target_interval_ms: default_target_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            latency_threshold_ms: default_latency_threshold_ms(),
        }
    }
}

// ============================================================
// 자동화 루프 설정
// ============================================================

/// 자동화 루프 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// 연속 추론 실패 허용 한도 (도달 시 루프 정지)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// 드라이런 모드 (액션 결정만 하고 입력 주입 안 함)
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
            dry_run: false,
        }
    }
}

// ============================================================
// 저장소 / 모델 설정
// ============================================================

/// 로컬 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite DB 파일 경로 (None이면 플랫폼 기본 경로)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// 규칙 목록 저장 키
    #[serde(default = "default_rules_key")]
    pub rules_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            rules_key: default_rules_key(),
        }
    }
}

/// 모델 아티팩트 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// 모델 메타데이터 JSON 경로 (라벨, 입력 크기, 버전)
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 설정값 범위 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.confidence_floor) {
            return Err(CoreError::Config(format!(
                "detector.confidence_floor 범위 오류: {}",
                d.confidence_floor
            )));
        }
        if !(d.iou_threshold > 0.0 && d.iou_threshold <= 1.0) {
            return Err(CoreError::Config(format!(
                "detector.iou_threshold 범위 오류: {}",
                d.iou_threshold
            )));
        }
        if d.inference_timeout_ms == 0 {
            return Err(CoreError::Config(
                "detector.inference_timeout_ms는 0보다 커야 함".to_string(),
            ));
        }

        let c = &self.cadence;
        if c.target_interval_ms == 0 {
            return Err(CoreError::Config(
                "cadence.target_interval_ms는 0보다 커야 함".to_string(),
            ));
        }
        if c.max_interval_ms < c.target_interval_ms {
            return Err(CoreError::Config(format!(
                "cadence.max_interval_ms({})가 target_interval_ms({})보다 작음",
                c.max_interval_ms, c.target_interval_ms
            )));
        }

        if self.automation.max_consecutive_failures == 0 {
            return Err(CoreError::Config(
                "automation.max_consecutive_failures는 0보다 커야 함".to_string(),
            ));
        }
        if self.storage.rules_key.is_empty() {
            return Err(CoreError::Config("storage.rules_key가 비어 있음".to_string()));
        }
        Ok(())
    }

    /// 추론 타임아웃을 Duration으로 반환
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.detector.inference_timeout_ms)
    }

    /// 목표 사이클 간격을 Duration으로 반환
    pub fn target_interval(&self) -> Duration {
        Duration::from_millis(self.cadence.target_interval_ms)
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_confidence_floor() -> f32 {
    0.05
}
fn default_iou_threshold() -> f32 {
    0.45
}
fn default_inference_timeout_ms() -> u64 {
    2_000
}
fn default_target_interval_ms() -> u64 {
    500
}
fn default_max_interval_ms() -> u64 {
    5_000
}
fn default_latency_threshold_ms() -> u64 {
    400
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_rules_key() -> String {
    "automation.rules".to_string()
}
