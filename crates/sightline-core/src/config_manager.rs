//! 설정 파일 관리.
//!
//! 플랫폼 설정 디렉토리(`directories::ProjectDirs`)의 `config.json`을 읽고 쓴다.
//! 데이터 디렉토리와 같은 식별자를 써서 설정과 DB가 한 앱 경로 아래에 놓인다.

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 식별자 (qualifier, organization, application)
pub const APP_QUALIFIER: (&str, &str, &str) = ("rs", "sightline", "sightline");

/// 플랫폼 경로 집합
pub fn project_dirs() -> Option<ProjectDirs> {
    let (qualifier, organization, application) = APP_QUALIFIER;
    ProjectDirs::from(qualifier, organization, application)
}

/// 설정 관리자
///
/// 파일이 없으면 기본 설정을 만들어 저장하고, 있으면 읽어서 검증한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: AppConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 플랫폼 기본 경로의 설정 로드
    pub fn new() -> Result<Self, CoreError> {
        Self::with_path(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 지정된 경로의 설정 로드 (없으면 기본값으로 생성)
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        let config = if config_path.exists() {
            read_config(&config_path)?
        } else {
            let config = AppConfig::default_config();
            write_config(&config_path, &config)?;
            info!(path = %config_path.display(), "기본 설정 파일 생성");
            config
        };
        Ok(Self {
            config,
            config_path,
        })
    }

    /// 현재 설정 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 설정 일부를 고쳐 검증 후 파일에 기록
    ///
    /// 검증이나 기록에 실패하면 현재 설정은 그대로 남는다.
    pub fn update_with<F>(&mut self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut next = self.config.clone();
        updater(&mut next);
        next.validate()?;
        write_config(&self.config_path, &next)?;
        debug!(path = %self.config_path.display(), "설정 저장");
        self.config = next;
        Ok(self.config.clone())
    }

    /// 플랫폼 설정 디렉토리
    ///
    /// - macOS: `~/Library/Application Support/rs.sightline.sightline/`
    /// - Windows: `%APPDATA%\sightline\sightline\config\`
    /// - Linux: `$XDG_CONFIG_HOME/sightline/` 또는 `~/.config/sightline/`
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        project_dirs()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없음".to_string()))
    }
}

fn read_config(path: &Path) -> Result<AppConfig, CoreError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("설정 파일 읽기 실패: {}: {e}", path.display())))?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| CoreError::Config(format!("설정 파일 파싱 실패: {}: {e}", path.display())))?;
    config.validate()?;
    debug!(path = %path.display(), "설정 파일 로드");
    Ok(config)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CoreError::Config(format!("설정 디렉토리 생성 실패: {}: {e}", parent.display()))
        })?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)
        .map_err(|e| CoreError::Config(format!("설정 파일 저장 실패: {}: {e}", path.display())))
}
