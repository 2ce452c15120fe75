//! 도메인 모델.
//!
//! 사이클 단위로 생성/폐기되는 프레임·감지 결과와
//! 장기 보존되는 규칙·액션 정의를 포함한다.

pub mod action;
pub mod detection;
pub mod frame;
pub mod rule;
