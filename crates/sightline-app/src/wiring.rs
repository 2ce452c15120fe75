//! 어댑터 생성과 DI 와이어링.

use anyhow::Result;
use sightline_automation::{
    create_platform_input_driver, ActionDispatcher, LoopComponents, NoOpInputDriver, RuleStore,
};
use sightline_core::config::AppConfig;
use sightline_core::config_manager::project_dirs;
use sightline_core::ports::input_driver::InputDriver;
use sightline_core::ports::storage::KeyValueStore;
use sightline_storage::{MemoryKvStore, SqliteKvStore};
use sightline_vision::backend::create_inference_backend;
use sightline_vision::capture::create_platform_frame_source;
use sightline_vision::model::YoloVersion;
use sightline_vision::{DetectionModelAdapter, ModelInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// DB 파일 이름
const DB_FILE_NAME: &str = "sightline.db";

/// 데이터베이스 경로 결정 (CLI 인자 → 설정 → 플랫폼 기본 경로)
///
/// # 플랫폼별 기본 경로:
/// - macOS: `~/Library/Application Support/rs.sightline.sightline/sightline.db`
/// - Windows: `%APPDATA%\sightline\sightline\data\sightline.db`
/// - Linux: `~/.local/share/sightline/sightline.db`
pub fn resolve_db_path(data_dir: Option<&Path>, config: &AppConfig) -> PathBuf {
    data_dir
        .map(|d| d.join(DB_FILE_NAME))
        .or_else(|| config.storage.db_path.clone())
        .or_else(|| project_dirs().map(|p| p.data_dir().join(DB_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}

/// 키-값 저장소 열기. 실패하면 인메모리 저장소로 폴백한다.
pub fn open_kv_store(path: &Path) -> Arc<dyn KeyValueStore> {
    match SqliteKvStore::open(path) {
        Ok(store) => {
            info!(path = %path.display(), "SQLite 저장소 열림");
            Arc::new(store)
        }
        Err(e) => {
            warn!("SQLite 저장소 열기 실패, 인메모리 폴백 (규칙이 유지되지 않음): {e}");
            Arc::new(MemoryKvStore::new())
        }
    }
}

/// 규칙 저장소 로드 (경고는 로드 과정에서 기록됨)
pub async fn open_rule_store(config: &AppConfig, data_dir: Option<&Path>) -> RuleStore {
    let kv = open_kv_store(&resolve_db_path(data_dir, config));
    let (rules, warnings) = RuleStore::load(kv, config.storage.rules_key.clone()).await;
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "규칙 로드 중 경고 발생");
    }
    rules
}

/// 메타데이터가 없을 때 쓰는 단일 클래스 모델
pub fn fallback_model() -> ModelInfo {
    ModelInfo {
        name: "unconfigured".to_string(),
        version: YoloVersion::V8,
        description: "모델 메타데이터 미지정".to_string(),
        author: String::new(),
        labels: vec!["object".to_string()],
        image_size: 640,
    }
}

/// 모델 메타데이터 로드. 경로가 없으면 폴백 모델을 쓴다.
pub fn load_model(config: &AppConfig) -> Result<ModelInfo> {
    match &config.model.metadata_path {
        Some(path) => Ok(ModelInfo::load(path)?),
        None => {
            warn!("model.metadata_path 미설정, 폴백 모델 사용");
            Ok(fallback_model())
        }
    }
}

/// 입력 드라이버 선택 (드라이런이면 NoOp)
pub fn input_driver(config: &AppConfig) -> Arc<dyn InputDriver> {
    if config.automation.dry_run {
        info!("드라이런 모드: 입력 주입 비활성");
        Arc::new(NoOpInputDriver)
    } else {
        create_platform_input_driver()
    }
}

/// 루프 구성 요소 생성
pub async fn build_components(
    config: &AppConfig,
    data_dir: Option<&Path>,
    replay: Option<&Path>,
) -> Result<LoopComponents> {
    let rules = open_rule_store(config, data_dir).await;

    let model = load_model(config)?;
    let backend = create_inference_backend(&model);
    let detector = DetectionModelAdapter::new(backend, model, config.detector.clone());
    info!(
        model = %detector.model().name,
        backend = detector.backend_name(),
        "감지 모델 준비 완료"
    );

    let frames = create_platform_frame_source(replay)?;
    let dispatcher = ActionDispatcher::new(input_driver(config));
    info!(
        frames = frames.name(),
        input = dispatcher.platform(),
        rules = rules.snapshot().len(),
        "어댑터 와이어링 완료"
    );

    Ok(LoopComponents {
        frames,
        detector: Arc::new(detector),
        rules: Arc::new(rules),
        dispatcher,
    })
}
