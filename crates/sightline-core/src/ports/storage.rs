//! 영속 키-값 저장소 포트.
//!
//! 구현: `sightline-storage` crate (rusqlite, 인메모리)

use async_trait::async_trait;

use crate::error::CoreError;

/// 바이트 키-값 저장소
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 값 조회 (없으면 `None`)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    /// 값 저장 (기존 값 덮어씀)
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError>;

    /// 값 삭제 (삭제된 경우 true)
    async fn remove(&self, key: &str) -> Result<bool, CoreError>;
}
