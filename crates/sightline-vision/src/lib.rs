//! # sightline-vision
//!
//! 감지 모델 어댑터 크레이트.
//! 프레임 레터박스 전처리, 추론 백엔드 호출(타임아웃 포함),
//! YOLO 출력 디코딩, 신뢰도 하한 필터와 클래스별 NMS,
//! 그리고 화면/이미지 파일 프레임 소스를 담당한다.

pub mod adapter;
pub mod backend;
pub mod capture;
pub mod decode;
pub mod letterbox;
pub mod model;
pub mod nms;

pub use adapter::DetectionModelAdapter;
pub use model::{ModelInfo, YoloVersion};
