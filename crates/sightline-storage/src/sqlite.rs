//! SQLite 키-값 저장소.
//!
//! `KeyValueStore` 포트 구현. 연결은 `Mutex`로 직렬화하고,
//! 디스크 I/O는 블로킹 풀에서 실행한다.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sightline_core::error::CoreError;
use sightline_core::ports::storage::KeyValueStore;
use tracing::{debug, info};

use crate::migration;

/// SQLite 키-값 저장소
#[derive(Clone)]
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// 파일 기반 저장소 생성 (상위 디렉토리 자동 생성)
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Persistence(format!(
                        "저장소 디렉토리 생성 실패: {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Persistence(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Persistence(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Persistence(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 인메모리 SQLite 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Persistence(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Persistence(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 저장된 키 목록 (정렬)
    pub fn keys(&self) -> Result<Vec<String>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;

        let mut stmt = conn
            .prepare("SELECT key FROM kv ORDER BY key")
            .map_err(|e| CoreError::Persistence(format!("쿼리 준비 실패: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| CoreError::Persistence(format!("쿼리 실행 실패: {e}")))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| CoreError::Persistence(format!("행 읽기 실패: {e}")))?);
        }
        Ok(keys)
    }

    /// 블로킹 풀에서 연결 작업 실행
    async fn with_conn<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))?;
            f(&guard)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("저장소 태스크 실패: {e}")))?
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
            .map_err(|e| CoreError::Persistence(format!("값 조회 실패: {e}")))
        })
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| CoreError::Persistence(format!("값 저장 실패: {e}")))?;
            debug!(key = %key, bytes = value.len(), "키-값 저장");
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool, CoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(|e| CoreError::Persistence(format!("값 삭제 실패: {e}")))?;
            Ok(deleted > 0)
        })
        .await
    }
}
