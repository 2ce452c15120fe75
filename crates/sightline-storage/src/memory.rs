//! 인메모리 키-값 저장소.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use sightline_core::error::CoreError;
use sightline_core::ports::storage::KeyValueStore;

/// 프로세스 수명 동안만 유지되는 저장소
///
/// `set_fail_writes(true)`로 쓰기 실패를 흉내낼 수 있다.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 값을 채운 저장소
    pub fn with_entry(key: &str, value: &[u8]) -> Self {
        let store = Self::new();
        store.entries.write().insert(key.to_string(), value.to_vec());
        store
    }

    /// 이후 쓰기 호출을 `Persistence` 에러로 실패시킴
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_writable(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Persistence("쓰기 비활성화됨".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        self.check_writable()?;
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CoreError> {
        self.check_writable()?;
        Ok(self.entries.write().remove(key).is_some())
    }
}
