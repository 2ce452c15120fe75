//! 레터박스 전처리.
//!
//! 종횡비를 유지한 채 정사각형 모델 입력으로 축소하고
//! 남는 영역은 회색(114)으로 채운다. 역변환은 디코더가 사용한다.

use fast_image_resize::{images::Image as FirImage, PixelType, ResizeAlg, ResizeOptions, Resizer};
use sightline_core::error::CoreError;
use sightline_core::models::frame::{Frame, RGBA_CHANNELS};
use sightline_core::ports::inference::InputTensor;

/// 패딩 색상 (YOLO 학습 관례)
pub const PAD_VALUE: u8 = 114;

/// 레터박스 기하 정보
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// 원본 → 입력 배율
    pub scale: f32,
    /// 좌측 패딩 (입력 픽셀)
    pub offset_x: u32,
    /// 상단 패딩 (입력 픽셀)
    pub offset_y: u32,
    /// 정사각형 입력 한 변
    pub target: u32,
    /// 축소된 원본 너비
    pub scaled_width: u32,
    /// 축소된 원본 높이
    pub scaled_height: u32,
}

impl Letterbox {
    /// 원본 크기와 목표 크기로 기하 계산
    pub fn compute(src_width: u32, src_height: u32, target: u32) -> Result<Self, CoreError> {
        if src_width == 0 || src_height == 0 {
            return Err(CoreError::Inference("소스 프레임 크기 0".to_string()));
        }
        if target == 0 {
            return Err(CoreError::Inference("모델 입력 크기 0".to_string()));
        }

        let scale = (target as f32 / src_width as f32).min(target as f32 / src_height as f32);
        let scaled_width = ((src_width as f32 * scale) as u32).clamp(1, target);
        let scaled_height = ((src_height as f32 * scale) as u32).clamp(1, target);

        Ok(Self {
            scale,
            offset_x: (target - scaled_width) / 2,
            offset_y: (target - scaled_height) / 2,
            target,
            scaled_width,
            scaled_height,
        })
    }

    /// 정규화 입력 좌표(0~1) → 원본 프레임 픽셀 좌표
    pub fn restore(&self, nx: f32, ny: f32) -> (f32, f32) {
        let t = self.target as f32;
        (
            (nx * t - self.offset_x as f32) / self.scale,
            (ny * t - self.offset_y as f32) / self.scale,
        )
    }
}

/// 프레임을 모델 입력 텐서(NHWC, RGB, 0~1)로 변환
///
/// 프레임을 소비한다. 픽셀 버퍼를 리사이저에 그대로 넘기기 위함.
pub fn prepare(frame: Frame, target: u32) -> Result<(InputTensor, Letterbox), CoreError> {
    if !frame.is_well_formed() {
        return Err(CoreError::Inference(format!(
            "프레임 형식 불일치: {}x{} RGBA 기대 {}바이트, 실제 {}바이트",
            frame.width,
            frame.height,
            frame.expected_len(),
            frame.pixels.len()
        )));
    }

    let letterbox = Letterbox::compute(frame.width, frame.height, target)?;
    let scaled = resize_rgba(
        frame.pixels,
        frame.width,
        frame.height,
        letterbox.scaled_width,
        letterbox.scaled_height,
    )?;

    let side = target as usize;
    let pad = PAD_VALUE as f32 / 255.0;
    let mut data = vec![pad; side * side * 3];

    let sw = letterbox.scaled_width as usize;
    let ox = letterbox.offset_x as usize;
    let oy = letterbox.offset_y as usize;
    for (row, line) in scaled.chunks_exact(sw * RGBA_CHANNELS).enumerate() {
        let dst_row = (row + oy) * side;
        for (col, px) in line.chunks_exact(RGBA_CHANNELS).enumerate() {
            let dst = (dst_row + col + ox) * 3;
            data[dst] = px[0] as f32 / 255.0;
            data[dst + 1] = px[1] as f32 / 255.0;
            data[dst + 2] = px[2] as f32 / 255.0;
        }
    }

    Ok((
        InputTensor {
            shape: [1, side, side, 3],
            data,
        },
        letterbox,
    ))
}

/// fast_image_resize 기반 RGBA 리사이즈 (동일 크기면 그대로 반환)
fn resize_rgba(
    pixels: Vec<u8>,
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>, CoreError> {
    if src_w == dst_w && src_h == dst_h {
        return Ok(pixels);
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, pixels, PixelType::U8x4)
        .map_err(|e| CoreError::Inference(format!("소스 이미지 생성 실패: {e}")))?;
    let mut dst_image = FirImage::new(dst_w, dst_h, PixelType::U8x4);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Inference(format!("리사이즈 실패: {e}")))?;

    Ok(dst_image.into_vec())
}
