//! 규칙 저장소.
//!
//! 규칙 집합을 키-값 저장소의 단일 키에 JSON으로 영속화하고,
//! 자동화 루프에는 불변 스냅샷(`Arc<RuleSnapshot>`)을 제공한다.
//! 변경은 새 스냅샷을 만들어 교체하므로 읽는 쪽은 잠금 없이 평가한다.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sightline_core::error::CoreError;
use sightline_core::models::rule::{Rule, RuleId};
use sightline_core::ports::storage::KeyValueStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 저장 문서 형식 버전
pub const RULES_FORMAT_VERSION: u32 = 1;

/// 저장 문서
#[derive(Debug, Serialize, Deserialize)]
struct RulesDocument {
    version: u32,
    rules: Vec<Value>,
}

/// 규칙 집합의 불변 스냅샷 (우선순위 내림차순, ID 오름차순 정렬)
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    pub revision: u64,
    pub rules: Arc<[Rule]>,
}

impl RuleSnapshot {
    fn new(revision: u64, mut rules: Vec<Rule>) -> Self {
        rules.sort_by(Rule::evaluation_order);
        Self {
            revision,
            rules: rules.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.iter().map(|r| r.id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 로드/가져오기 중 발생한 비치명 경고
#[derive(Debug)]
pub enum RuleStoreWarning {
    /// 저장소 읽기 실패: 빈 규칙 집합으로 시작
    Unreadable(CoreError),
    /// 문서 전체 해석 실패: 빈 규칙 집합으로 시작
    Malformed(String),
    /// 개별 규칙 해석/검증 실패: 해당 규칙만 제외
    InvalidRule { index: usize, error: CoreError },
    /// 중복 ID: 뒤에 나온 규칙 제외
    DuplicateId(RuleId),
}

impl std::fmt::Display for RuleStoreWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStoreWarning::Unreadable(e) => write!(f, "규칙 저장소 읽기 실패: {e}"),
            RuleStoreWarning::Malformed(reason) => write!(f, "규칙 문서 형식 오류: {reason}"),
            RuleStoreWarning::InvalidRule { index, error } => {
                write!(f, "규칙 #{index} 제외: {error}")
            }
            RuleStoreWarning::DuplicateId(id) => write!(f, "중복 규칙 ID {id} 제외"),
        }
    }
}

/// 규칙 저장소
pub struct RuleStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    current: RwLock<Arc<RuleSnapshot>>,
    /// 변경과 영속화 순서를 직렬화
    write_lock: Mutex<()>,
}

impl RuleStore {
    /// 저장소에서 규칙 로드
    ///
    /// 항목이 없거나 손상되었으면 빈 규칙 집합으로 시작하고 경고를 반환한다.
    pub async fn load(
        kv: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
    ) -> (Self, Vec<RuleStoreWarning>) {
        let key = key.into();
        let mut warnings = Vec::new();

        let rules = match kv.get(&key).await {
            Ok(Some(bytes)) => parse_document(&bytes, &mut warnings),
            Ok(None) => {
                debug!(key = %key, "저장된 규칙 없음");
                Vec::new()
            }
            Err(e) => {
                warnings.push(RuleStoreWarning::Unreadable(e));
                Vec::new()
            }
        };

        for w in &warnings {
            warn!(key = %key, "{w}");
        }
        info!(key = %key, rules = rules.len(), "규칙 로드 완료");

        let store = Self {
            kv,
            key,
            current: RwLock::new(Arc::new(RuleSnapshot::new(1, rules))),
            write_lock: Mutex::new(()),
        };
        (store, warnings)
    }

    /// 현재 스냅샷 (Arc 복제, 잠금은 즉시 해제)
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.read().clone()
    }

    /// 평가 순서대로 정렬된 규칙 목록
    pub fn rules(&self) -> Vec<Rule> {
        self.snapshot().rules.to_vec()
    }

    pub fn get(&self, id: RuleId) -> Option<Rule> {
        self.snapshot().get(id).cloned()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 규칙 추가 또는 교체 (검증 후)
    pub async fn upsert(&self, rule: Rule) -> Result<Arc<RuleSnapshot>, CoreError> {
        rule.validate()?;
        let id = rule.id;
        let _guard = self.write_lock.lock().await;
        let snapshot = self.mutate(|rules| {
            match rules.iter_mut().find(|r| r.id == id) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
            Ok(())
        })?;
        debug!(rule_id = id, revision = snapshot.revision, "규칙 저장");
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// 규칙 삭제
    pub async fn remove(&self, id: RuleId) -> Result<Arc<RuleSnapshot>, CoreError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.mutate(|rules| {
            let before = rules.len();
            rules.retain(|r| r.id != id);
            if rules.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        })?;
        debug!(rule_id = id, revision = snapshot.revision, "규칙 삭제");
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// 활성/비활성 전환
    pub async fn set_enabled(
        &self,
        id: RuleId,
        enabled: bool,
    ) -> Result<Arc<RuleSnapshot>, CoreError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.mutate(|rules| {
            let rule = rules.iter_mut().find(|r| r.id == id).ok_or_else(|| not_found(id))?;
            rule.enabled = enabled;
            Ok(())
        })?;
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// 규칙 집합 전체 교체
    ///
    /// 하나라도 검증에 실패하거나 ID가 중복되면 아무것도 바꾸지 않는다.
    pub async fn replace_all(&self, rules: Vec<Rule>) -> Result<Arc<RuleSnapshot>, CoreError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.id) {
                return Err(CoreError::validation("id", format!("중복 규칙 ID: {}", rule.id)));
            }
        }
        let _guard = self.write_lock.lock().await;
        let snapshot = self.mutate(move |current| {
            *current = rules;
            Ok(())
        })?;
        info!(rules = snapshot.len(), revision = snapshot.revision, "규칙 집합 교체");
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// 현재 스냅샷을 저장소에 기록
    pub async fn save(&self) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot();
        self.persist(&snapshot).await
    }

    /// 현재 규칙 집합을 저장 형식 JSON으로 내보내기
    pub fn export_json(&self) -> Result<String, CoreError> {
        let snapshot = self.snapshot();
        Ok(serde_json::to_string_pretty(&to_document(&snapshot)?)?)
    }

    /// JSON 문서에서 규칙 가져오기
    ///
    /// 개별 규칙 오류는 경고로 돌려주고 나머지로 전체 교체한다.
    /// 문서 자체가 손상되었으면 `Validation` 에러.
    pub async fn import_json(&self, json: &str) -> Result<Vec<RuleStoreWarning>, CoreError> {
        let mut warnings = Vec::new();
        let rules = parse_rules(json.as_bytes(), &mut warnings)
            .map_err(|reason| CoreError::validation("rules", reason))?;
        self.replace_all(rules).await?;
        for w in &warnings {
            warn!("{w}");
        }
        Ok(warnings)
    }

    /// 복제-수정-교체 (리비전 증가). 호출자가 `write_lock`을 잡고 있어야 한다.
    fn mutate<F>(&self, f: F) -> Result<Arc<RuleSnapshot>, CoreError>
    where
        F: FnOnce(&mut Vec<Rule>) -> Result<(), CoreError>,
    {
        let current = self.snapshot();
        let mut rules = current.rules.to_vec();
        f(&mut rules)?;
        let next = Arc::new(RuleSnapshot::new(current.revision + 1, rules));
        *self.current.write() = Arc::clone(&next);
        Ok(next)
    }

    /// 스냅샷 영속화 (실패해도 메모리 변경은 유지)
    async fn persist(&self, snapshot: &RuleSnapshot) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(&to_document(snapshot)?)?;
        self.kv.put(&self.key, &bytes).await.map_err(|e| {
            warn!(key = %self.key, revision = snapshot.revision, "규칙 저장 실패: {e}");
            match e {
                CoreError::Persistence(msg) => CoreError::Persistence(msg),
                other => CoreError::Persistence(other.to_string()),
            }
        })
    }
}

fn not_found(id: RuleId) -> CoreError {
    CoreError::NotFound {
        resource_type: "Rule".to_string(),
        id: id.to_string(),
    }
}

fn to_document(snapshot: &RuleSnapshot) -> Result<RulesDocument, CoreError> {
    let rules = snapshot
        .rules
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RulesDocument {
        version: RULES_FORMAT_VERSION,
        rules,
    })
}

/// 저장 문서 해석: 문서 손상 시 빈 집합 + 경고
fn parse_document(bytes: &[u8], warnings: &mut Vec<RuleStoreWarning>) -> Vec<Rule> {
    match parse_rules(bytes, warnings) {
        Ok(rules) => rules,
        Err(reason) => {
            warnings.push(RuleStoreWarning::Malformed(reason));
            Vec::new()
        }
    }
}

/// `{ "version": 1, "rules": [...] }` 또는 규칙 배열을 규칙 단위로 해석
fn parse_rules(bytes: &[u8], warnings: &mut Vec<RuleStoreWarning>) -> Result<Vec<Rule>, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => {
            let doc: RulesDocument = serde_json::from_value(value).map_err(|e| e.to_string())?;
            if doc.version > RULES_FORMAT_VERSION {
                return Err(format!("지원하지 않는 형식 버전: {}", doc.version));
            }
            doc.rules
        }
        _ => return Err("규칙 문서는 객체 또는 배열이어야 함".to_string()),
    };

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let rule = match serde_json::from_value::<Rule>(item) {
            Ok(rule) => rule,
            Err(e) => {
                warnings.push(RuleStoreWarning::InvalidRule {
                    index,
                    error: CoreError::Config(format!("규칙 해석 실패: {e}")),
                });
                continue;
            }
        };
        if let Err(e) = rule.validate() {
            warnings.push(RuleStoreWarning::InvalidRule { index, error: e });
            continue;
        }
        if !seen.insert(rule.id) {
            warnings.push(RuleStoreWarning::DuplicateId(rule.id));
            continue;
        }
        rules.push(rule);
    }
    Ok(rules)
}
