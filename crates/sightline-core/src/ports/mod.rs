//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 각 어댑터 crate가 이 trait들을 구현하며,
//! `sightline-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! I/O 포트는 `async_trait` 매크로로 object safety를 보장하고,
//! 추론 백엔드는 블로킹 풀에서 호출되므로 동기 trait으로 둔다.

pub mod detector;
pub mod frame_source;
pub mod inference;
pub mod input_driver;
pub mod storage;
