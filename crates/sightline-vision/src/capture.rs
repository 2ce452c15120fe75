//! 프레임 소스 구현.
//!
//! - `ScreenCapture`: xcap 기반 주 모니터 캡처 (feature `capture`)
//! - `ImageFileFrameSource`: 정지 이미지 반복 재생 (오프라인 검증용)
//! - `UnavailableFrameSource`: 항상 캡처 불가

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use sightline_core::error::CoreError;
use sightline_core::models::frame::Frame;
use sightline_core::ports::frame_source::FrameSource;
use tracing::{debug, info};

/// 이미지 → RGBA8 프레임
pub fn frame_from_image(image: &DynamicImage) -> Frame {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::from_rgba(width, height, rgba.into_raw())
}

/// 정지 이미지를 매 사이클 같은 프레임으로 공급
pub struct ImageFileFrameSource {
    path: PathBuf,
    image: DynamicImage,
}

impl ImageFileFrameSource {
    /// 이미지 파일 로드
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let image = image::open(path).map_err(|e| {
            CoreError::CaptureUnavailable(format!("이미지 열기 실패: {}: {e}", path.display()))
        })?;
        debug!(
            "이미지 프레임 소스: {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FrameSource for ImageFileFrameSource {
    async fn next_frame(&self) -> Result<Frame, CoreError> {
        Ok(frame_from_image(&self.image))
    }

    fn name(&self) -> &str {
        "image-file"
    }
}

/// 캡처 세션이 없는 환경용 소스
pub struct UnavailableFrameSource {
    reason: String,
}

impl UnavailableFrameSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl FrameSource for UnavailableFrameSource {
    async fn next_frame(&self) -> Result<Frame, CoreError> {
        Err(CoreError::CaptureUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// 스크린 캡처: xcap 기반
#[cfg(feature = "capture")]
pub struct ScreenCapture;

#[cfg(feature = "capture")]
impl ScreenCapture {
    pub fn new() -> Self {
        Self
    }

    /// 주 모니터 캡처 (블로킹)
    fn capture_primary() -> Result<Frame, CoreError> {
        use xcap::Monitor;

        let monitors = Monitor::all()
            .map_err(|e| CoreError::CaptureUnavailable(format!("모니터 목록 조회 실패: {e}")))?;

        let primary = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let monitor = monitors
            .into_iter()
            .nth(primary)
            .ok_or_else(|| CoreError::CaptureUnavailable("모니터를 찾을 수 없음".to_string()))?;

        let scale = monitor.scale_factor().unwrap_or(1.0).max(f32::EPSILON);
        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::CaptureUnavailable(format!("스크린 캡처 실패: {e}")))?;

        let (width, height) = image.dimensions();
        let logical_width = ((width as f32 / scale).round() as u32).max(1);
        let logical_height = ((height as f32 / scale).round() as u32).max(1);
        debug!("스크린 캡처 완료: {width}x{height} (scale {scale})");

        Ok(Frame::from_rgba(width, height, image.into_raw())
            .with_logical_size(logical_width, logical_height))
    }
}

#[cfg(feature = "capture")]
impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "capture")]
#[async_trait]
impl FrameSource for ScreenCapture {
    async fn next_frame(&self) -> Result<Frame, CoreError> {
        tokio::task::spawn_blocking(Self::capture_primary)
            .await
            .map_err(|e| CoreError::CaptureUnavailable(format!("캡처 태스크 실패: {e}")))?
    }

    fn name(&self) -> &str {
        "xcap"
    }
}

/// 플랫폼에 맞는 프레임 소스 생성
///
/// `replay`가 있으면 해당 이미지를 재생한다.
pub fn create_platform_frame_source(
    replay: Option<&Path>,
) -> Result<Arc<dyn FrameSource>, CoreError> {
    if let Some(path) = replay {
        return Ok(Arc::new(ImageFileFrameSource::open(path)?));
    }

    #[cfg(feature = "capture")]
    {
        info!("xcap 스크린 캡처 사용");
        Ok(Arc::new(ScreenCapture::new()))
    }

    #[cfg(not(feature = "capture"))]
    {
        info!("capture feature 비활성: 프레임 소스 없음");
        Ok(Arc::new(UnavailableFrameSource::new(
            "capture feature 비활성",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn image_to_frame() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])));
        let frame = frame_from_image(&img);
        assert_eq!((frame.width, frame.height), (3, 2));
        assert!(frame.is_well_formed());
        assert_eq!(&frame.pixels[..4], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn replay_source_serves_same_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.png");
        RgbaImage::from_pixel(8, 4, Rgba([9, 9, 9, 255]))
            .save(&path)
            .unwrap();

        let source = create_platform_frame_source(Some(&path)).unwrap();
        assert_eq!(source.name(), "image-file");
        let a = source.next_frame().await.unwrap();
        let b = source.next_frame().await.unwrap();
        assert_eq!(a.pixels, b.pixels);
        assert_eq!((a.width, a.height), (8, 4));
    }

    #[test]
    fn missing_image_is_capture_unavailable() {
        let result = ImageFileFrameSource::open(Path::new("/nonexistent/screen.png"));
        assert!(matches!(result, Err(CoreError::CaptureUnavailable(_))));
    }

    #[tokio::test]
    async fn unavailable_source_errors() {
        let source = UnavailableFrameSource::new("no session");
        assert!(matches!(
            source.next_frame().await,
            Err(CoreError::CaptureUnavailable(_))
        ));
    }
}
