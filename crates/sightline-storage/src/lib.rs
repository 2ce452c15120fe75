//! # sightline-storage
//!
//! 로컬 저장소 어댑터.
//! `KeyValueStore` 포트를 SQLite 파일 또는 메모리로 구현한다.
//!
//! ## 모듈
//! - `sqlite`: SQLite 키-값 저장소 (WAL, 스키마 마이그레이션)
//! - `memory`: 인메모리 키-값 저장소 (테스트, 저장 불가 환경)
//! - `migration`: 스키마 마이그레이션

pub mod memory;
pub mod migration;
pub mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
