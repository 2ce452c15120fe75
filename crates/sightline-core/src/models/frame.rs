//! 프레임(화면 스냅샷) 모델.
//!
//! 한 사이클 동안 오케스트레이터가 독점 소유하며 감지 완료 후 폐기된다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RGBA8 픽셀당 바이트 수
pub const RGBA_CHANNELS: usize = 4;

/// 캡처된 화면 프레임 (RGBA8, row-major)
#[derive(Clone)]
pub struct Frame {
    /// 픽셀 너비
    pub width: u32,
    /// 픽셀 높이
    pub height: u32,
    /// 논리 화면 너비 (입력 좌표계, HiDPI에서 픽셀과 다를 수 있음)
    pub logical_width: u32,
    /// 논리 화면 높이
    pub logical_height: u32,
    /// RGBA8 픽셀 데이터
    pub pixels: Vec<u8>,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// RGBA8 버퍼로 프레임 생성 (논리 크기 = 픽셀 크기)
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            logical_width: width,
            logical_height: height,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// 논리 화면 크기 지정
    pub fn with_logical_size(mut self, logical_width: u32, logical_height: u32) -> Self {
        self.logical_width = logical_width;
        self.logical_height = logical_height;
        self
    }

    /// 크기 정보만 분리 (프레임 폐기 후에도 좌표 변환에 사용)
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width,
            height: self.height,
            logical_width: self.logical_width,
            logical_height: self.logical_height,
        }
    }

    /// 너비·높이 기준 기대 버퍼 길이
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * RGBA_CHANNELS
    }

    /// 버퍼 길이와 크기가 일치하고 비어 있지 않은지
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.expected_len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("logical_width", &self.logical_width)
            .field("logical_height", &self.logical_height)
            .field("bytes", &self.pixels.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// 프레임 크기 정보 (픽셀 + 논리 좌표계)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub logical_width: u32,
    pub logical_height: u32,
}

impl FrameGeometry {
    /// 픽셀 = 논리 크기인 지오메트리
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            logical_width: width,
            logical_height: height,
        }
    }

    /// 픽셀 좌표 → [0,1] 정규화 좌표
    pub fn normalize(&self, x: f32, y: f32) -> (f32, f32) {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        (x / w, y / h)
    }

    /// [0,1] 정규화 좌표 → 픽셀 좌표
    pub fn denormalize(&self, nx: f32, ny: f32) -> (f32, f32) {
        (nx * self.width as f32, ny * self.height as f32)
    }

    /// 픽셀 좌표를 프레임 내부로 제한
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        let max_x = self.width.saturating_sub(1) as f32;
        let max_y = self.height.saturating_sub(1) as f32;
        (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
    }

    /// 픽셀 좌표 → 논리 화면 좌표 (입력 주입용)
    pub fn to_logical(&self, x: f32, y: f32) -> (i32, i32) {
        let sx = self.logical_width as f32 / self.width.max(1) as f32;
        let sy = self.logical_height as f32 / self.height.max(1) as f32;
        ((x * sx).round() as i32, (y * sy).round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_checks_length() {
        let frame = Frame::from_rgba(2, 2, vec![0; 16]);
        assert!(frame.is_well_formed());

        let short = Frame::from_rgba(2, 2, vec![0; 15]);
        assert!(!short.is_well_formed());

        let empty = Frame::from_rgba(0, 0, vec![]);
        assert!(!empty.is_well_formed());
    }

    #[test]
    fn logical_mapping_on_hidpi() {
        let geometry = Frame::from_rgba(2880, 1800, vec![])
            .with_logical_size(1440, 900)
            .geometry();
        assert_eq!(geometry.to_logical(1000.0, 500.0), (500, 250));
    }

    #[test]
    fn clamp_keeps_point_inside() {
        let geometry = FrameGeometry::new(100, 50);
        assert_eq!(geometry.clamp(-5.0, 80.0), (0.0, 49.0));
    }

    #[test]
    fn debug_omits_pixels() {
        let frame = Frame::from_rgba(1, 1, vec![1, 2, 3, 4]);
        let text = format!("{frame:?}");
        assert!(text.contains("bytes: 4"));
    }
}
