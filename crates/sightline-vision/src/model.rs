//! 모델 메타데이터.
//!
//! 모델 패키지에 동봉되는 `metadata.json`을 해석한다.
//! 입력 크기, 라벨 목록, 출력 레이아웃을 결정하는 YOLO 세대 정보를 담는다.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sightline_core::error::CoreError;
use tracing::debug;

/// 기본 입력 크기 (정사각형)
const DEFAULT_IMAGE_SIZE: u32 = 640;

/// 입력 크기 상한
pub const MAX_IMAGE_SIZE: u32 = 4096;

/// YOLO v10 출력 박스 수 (모델 내부 NMS 적용 후 고정)
pub const V10_MAX_BOXES: usize = 300;

/// YOLO v10 박스당 채널 수 (x1, y1, x2, y2, score, class)
pub const V10_CHANNELS: usize = 6;

/// 출력 레이아웃을 결정하는 YOLO 세대
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YoloVersion {
    V8,
    V10,
    V11,
}

impl YoloVersion {
    /// 버전 문자열 해석 ("yolov8n", "v11", "10" 등). "8"이 들어 있으면 V8이 우선한다.
    pub fn parse(name: &str) -> Option<Self> {
        if name.contains('8') {
            Some(YoloVersion::V8)
        } else if name.contains("10") {
            Some(YoloVersion::V10)
        } else if name.contains("11") {
            Some(YoloVersion::V11)
        } else {
            None
        }
    }
}

/// 메타데이터 원본 (모든 필드 선택적)
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMetadata {
    name: String,
    version: String,
    description: String,
    author: String,
    labels: Vec<String>,
    image_size: Option<u32>,
}

/// 검증된 모델 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: YoloVersion,
    pub description: String,
    pub author: String,
    pub labels: Vec<String>,
    /// 정사각형 입력 한 변 (32의 배수)
    pub image_size: u32,
}

impl ModelInfo {
    /// 메타데이터 JSON 해석 + 검증
    pub fn from_metadata_json(json: &str) -> Result<Self, CoreError> {
        let raw: RawMetadata = serde_json::from_str(json)?;

        if raw.name.trim().is_empty() {
            return Err(CoreError::validation("name", "모델 이름이 비어 있음"));
        }
        let version = YoloVersion::parse(&raw.version).ok_or_else(|| {
            CoreError::validation("version", format!("지원하지 않는 버전: {:?}", raw.version))
        })?;
        if raw.labels.is_empty() {
            return Err(CoreError::validation("labels", "라벨 목록이 비어 있음"));
        }
        let image_size = raw.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
        if image_size > MAX_IMAGE_SIZE {
            return Err(CoreError::validation(
                "imageSize",
                format!("{image_size}: 최대 {MAX_IMAGE_SIZE}"),
            ));
        }
        if image_size == 0 || image_size % 32 != 0 {
            return Err(CoreError::validation(
                "imageSize",
                format!("{image_size}: 32의 배수여야 함"),
            ));
        }

        Ok(Self {
            name: raw.name,
            version,
            description: raw.description,
            author: raw.author,
            labels: raw.labels,
            image_size,
        })
    }

    /// 메타데이터 파일 로드
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("모델 메타데이터 읽기 실패: {}: {e}", path.display()))
        })?;
        let info = Self::from_metadata_json(&content)?;
        debug!(
            name = %info.name,
            version = ?info.version,
            classes = info.labels.len(),
            image_size = info.image_size,
            "모델 메타데이터 로드"
        );
        Ok(info)
    }

    /// 클래스 수
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// 클래스 ID → 라벨
    pub fn label(&self, class_id: u32) -> Option<&str> {
        self.labels.get(class_id as usize).map(String::as_str)
    }

    /// 앵커 박스 수 (stride 8/16/32 특징맵 합)
    pub fn box_count(&self) -> usize {
        let s = self.image_size as usize;
        (s / 8).pow(2) + (s / 16).pow(2) + (s / 32).pow(2)
    }

    /// 첫 번째 출력 텐서의 기대 원소 수
    pub fn output_len(&self) -> usize {
        match self.version {
            YoloVersion::V8 | YoloVersion::V11 => (4 + self.num_classes()) * self.box_count(),
            YoloVersion::V10 => V10_MAX_BOXES * V10_CHANNELS,
        }
    }
}
