//! 규칙 저장소 통합 테스트.
//!
//! RuleStore ↔ SqliteKvStore 파일 영속화, 손상 항목 복구, 내보내기/가져오기.

use sightline_automation::{RuleStore, RuleStoreWarning};
use sightline_core::error::CoreError;
use sightline_core::models::action::{ActionPoint, ActionSpec};
use sightline_core::models::rule::{NormalizedRect, Rule};
use sightline_core::ports::storage::KeyValueStore;
use sightline_storage::SqliteKvStore;
use std::sync::Arc;

const KEY: &str = "automation.rules";

fn sample_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: 1,
            name: "confirm".to_string(),
            enabled: true,
            target_class: 0,
            min_confidence: 0.7,
            region: Some(NormalizedRect::new(0.5, 0.5, 0.5, 0.5)),
            action: ActionSpec::Tap {
                at: ActionPoint::BoxOffset { dx: 4.0, dy: -2.0 },
            },
            cooldown_ms: 1500,
            priority: 5,
        },
        Rule {
            id: 2,
            name: "scroll".to_string(),
            enabled: false,
            target_class: 3,
            min_confidence: 0.4,
            region: None,
            action: ActionSpec::Swipe {
                from: ActionPoint::Fixed { x: 0.5, y: 0.8 },
                to: ActionPoint::Fixed { x: 0.5, y: 0.2 },
                duration_ms: 300,
            },
            cooldown_ms: 0,
            priority: 10,
        },
    ]
}

/// 저장 → 재시작 → 동일 규칙 복원 (평가 순서 정렬)
#[tokio::test]
async fn rules_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sightline.db");

    {
        let kv = Arc::new(SqliteKvStore::open(&db).unwrap());
        let (store, warnings) = RuleStore::load(kv, KEY).await;
        assert!(warnings.is_empty());
        store.replace_all(sample_rules()).await.unwrap();
        store.set_enabled(2, true).await.unwrap();
    }

    let kv = Arc::new(SqliteKvStore::open(&db).unwrap());
    let (store, warnings) = RuleStore::load(kv, KEY).await;
    assert!(warnings.is_empty());

    let rules = store.rules();
    assert_eq!(rules.len(), 2);
    // 우선순위 10이 먼저
    assert_eq!(rules[0].id, 2);
    assert!(rules[0].enabled);
    assert_eq!(rules[1], sample_rules()[0]);
}

/// 손상된 항목 → 빈 규칙 집합 + 경고, 이후 저장으로 복구
#[tokio::test]
async fn corrupted_entry_falls_back_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sightline.db");
    let kv = Arc::new(SqliteKvStore::open(&db).unwrap());
    kv.put(KEY, b"{ not json").await.unwrap();

    let (store, warnings) = RuleStore::load(kv.clone(), KEY).await;
    assert!(store.snapshot().is_empty());
    assert!(matches!(warnings.as_slice(), [RuleStoreWarning::Malformed(_)]));

    store.upsert(sample_rules().remove(0)).await.unwrap();
    let (reloaded, warnings) = RuleStore::load(kv, KEY).await;
    assert!(warnings.is_empty());
    assert_eq!(reloaded.rules().len(), 1);
}

/// 하나만 잘못된 규칙은 그것만 버리고 나머지는 로드
#[tokio::test]
async fn single_bad_rule_is_dropped() {
    let kv = Arc::new(SqliteKvStore::open_in_memory().unwrap());
    let doc = serde_json::json!({
        "version": 1,
        "rules": [
            serde_json::to_value(&sample_rules()[0]).unwrap(),
            { "id": 7, "target_class": 1, "min_confidence": 4.0 },
            serde_json::to_value(&sample_rules()[1]).unwrap(),
        ]
    });
    kv.put(KEY, doc.to_string().as_bytes()).await.unwrap();

    let (store, warnings) = RuleStore::load(kv, KEY).await;
    assert_eq!(store.rules().len(), 2);
    assert!(store.get(7).is_none());
    assert!(matches!(
        warnings.as_slice(),
        [RuleStoreWarning::InvalidRule { index: 1, .. }]
    ));
}

/// 내보내기 → 다른 저장소로 가져오기
#[tokio::test]
async fn export_then_import_into_fresh_store() {
    let source_kv = Arc::new(SqliteKvStore::open_in_memory().unwrap());
    let (source, _) = RuleStore::load(source_kv, KEY).await;
    source.replace_all(sample_rules()).await.unwrap();
    let json = source.export_json().unwrap();

    let target_kv = Arc::new(SqliteKvStore::open_in_memory().unwrap());
    let (target, _) = RuleStore::load(target_kv.clone(), KEY).await;
    let warnings = target.import_json(&json).await.unwrap();
    assert!(warnings.is_empty());
    assert_eq!(target.rules(), source.rules());

    // 가져온 규칙은 저장소에도 기록됨
    let stored = target_kv.get(KEY).await.unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["rules"].as_array().unwrap().len(), 2);
}

/// 없는 규칙 변경은 NotFound, 스냅샷 유지
#[tokio::test]
async fn missing_rule_mutation_is_not_found() {
    let kv = Arc::new(SqliteKvStore::open_in_memory().unwrap());
    let (store, _) = RuleStore::load(kv, KEY).await;
    store.replace_all(sample_rules()).await.unwrap();
    let before = store.snapshot();

    assert!(matches!(
        store.remove(42).await,
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        store.set_enabled(42, false).await,
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(store.snapshot().revision, before.revision);
}
