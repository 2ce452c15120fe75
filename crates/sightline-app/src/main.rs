//! # sightline-app
//!
//! sightline 바이너리 진입점.
//! DI 와이어링, CLI 오버라이드, 라이프사이클 관리.

mod lifecycle;
mod wiring;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sightline_automation::AutomationLoop;
use sightline_core::config::AppConfig;
use sightline_core::config_manager::ConfigManager;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// sightline 화면 감지 자동화 에이전트
///
/// 화면을 주기적으로 캡처해 객체를 감지하고, 규칙에 맞으면 탭/스와이프를 주입한다.
#[derive(Parser, Debug)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 데이터 저장 경로 (기본: 플랫폼 데이터 디렉토리)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 목표 사이클 간격 (밀리초)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// 드라이런 (액션 결정만 하고 입력 주입 안 함)
    #[arg(long)]
    dry_run: bool,

    /// 모델 메타데이터 JSON 경로
    #[arg(long)]
    model: Option<PathBuf>,

    /// 화면 대신 이미지 파일을 프레임으로 재생
    #[arg(long)]
    replay: Option<PathBuf>,

    /// 규칙 목록을 JSON 파일로 내보내고 종료
    #[arg(long, value_name = "PATH", conflicts_with = "import_rules")]
    export_rules: Option<PathBuf>,

    /// JSON 파일의 규칙 목록으로 교체하고 종료
    #[arg(long, value_name = "PATH")]
    import_rules: Option<PathBuf>,

    /// CLI 오버라이드를 설정 파일에 저장
    #[arg(long)]
    save_config: bool,
}

impl Args {
    /// CLI 인자로 설정 오버라이드
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(interval) = self.interval_ms {
            config.cadence.target_interval_ms = interval;
            config.cadence.max_interval_ms = config.cadence.max_interval_ms.max(interval);
        }
        if self.dry_run {
            config.automation.dry_run = true;
        }
        if let Some(ref model) = self.model {
            config.model.metadata_path = Some(model.clone());
        }
    }
}

/// 설정 로드 (파일 → CLI 오버라이드 → 검증)
fn load_config(args: &Args) -> Result<AppConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let mut config = match manager {
        Ok(mut manager) if args.save_config => {
            let saved = manager
                .update_with(|c| args.apply_overrides(c))
                .map_err(|e| anyhow!("설정 저장 실패: {e}"))?;
            info!(path = %manager.config_path().display(), "설정 저장");
            saved
        }
        Ok(manager) => {
            info!(path = %manager.config_path().display(), "설정 로드");
            manager.get()
        }
        Err(e) if args.save_config => {
            return Err(anyhow!("설정 파일을 열 수 없어 저장 불가: {e}"));
        }
        Err(e) => {
            warn!("설정 파일 사용 불가, 기본값 사용: {e}");
            AppConfig::default_config()
        }
    };

    args.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!("설정 검증 실패: {e}"))?;
    Ok(config)
}

/// 규칙 내보내기/가져오기 명령 처리
///
/// 명령을 처리했으면 true 반환 (프로그램 종료), 없으면 false (계속 실행)
async fn handle_rule_commands(args: &Args, config: &AppConfig) -> Result<bool> {
    if args.export_rules.is_none() && args.import_rules.is_none() {
        return Ok(false);
    }

    let rules = wiring::open_rule_store(config, args.data_dir.as_deref()).await;

    if let Some(ref path) = args.export_rules {
        let json = rules.export_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("규칙 내보내기 실패: {}", path.display()))?;
        println!("규칙 {}개 내보냄: {}", rules.snapshot().len(), path.display());
    }

    if let Some(ref path) = args.import_rules {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("규칙 파일 읽기 실패: {}", path.display()))?;
        let warnings = rules.import_json(&json).await?;
        for w in &warnings {
            eprintln!("경고: {w}");
        }
        println!("규칙 {}개 가져옴: {}", rules.snapshot().len(), path.display());
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "sightline={0},sightline_app={0},sightline_core={0},sightline_vision={0},sightline_storage={0},sightline_automation={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = load_config(&args)?;

    if handle_rule_commands(&args, &config).await? {
        return Ok(());
    }

    info!(
        interval_ms = config.cadence.target_interval_ms,
        dry_run = config.automation.dry_run,
        "sightline 시작"
    );

    let components =
        wiring::build_components(&config, args.data_dir.as_deref(), args.replay.as_deref())
            .await?;
    let automation = AutomationLoop::new(components, &config);
    automation.start()?;

    let lifecycle = LifecycleManager::new();
    let cause = lifecycle.run(&automation).await;

    info!(?cause, "sightline 종료");
    cause.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_config_writes_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = Args::parse_from([
            "sightline",
            "--config",
            path.to_str().unwrap(),
            "--interval-ms",
            "250",
            "--dry-run",
            "--save-config",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.cadence.target_interval_ms, 250);

        let stored = ConfigManager::with_path(path).unwrap().get();
        assert_eq!(stored.cadence.target_interval_ms, 250);
        assert!(stored.automation.dry_run);
    }

    #[test]
    fn overrides_without_save_leave_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = Args::parse_from([
            "sightline",
            "--config",
            path.to_str().unwrap(),
            "--interval-ms",
            "250",
        ]);

        assert_eq!(load_config(&args).unwrap().cadence.target_interval_ms, 250);
        let stored = ConfigManager::with_path(path).unwrap().get();
        assert_eq!(stored.cadence.target_interval_ms, 500);
    }

    #[test]
    fn invalid_override_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let args = Args::parse_from([
            "sightline",
            "--config",
            path.to_str().unwrap(),
            "--interval-ms",
            "0",
            "--save-config",
        ]);

        assert!(load_config(&args).is_err());
        let stored = ConfigManager::with_path(path).unwrap().get();
        assert_eq!(stored.cadence.target_interval_ms, 500);
    }
}
