//! 사이클 주기와 규칙별 쿨다운 상태.
//!
//! `CadenceScheduler`는 다음 사이클까지의 대기 시간을 정하고,
//! `FireStateTable`은 규칙별 마지막 발동 시각을 보관한다.

use std::collections::HashMap;
use std::time::Duration;

use sightline_core::config::CadenceConfig;
use sightline_core::models::rule::RuleId;
use tracing::debug;

/// 적응형 사이클 주기
///
/// 사이클 소요 시간이 지연 임계값을 넘으면 유효 간격을 두 배로(상한까지),
/// 다시 임계값 이하로 내려오면 절반으로(목표 간격까지) 조정한다.
#[derive(Debug, Clone)]
pub struct CadenceScheduler {
    target: Duration,
    max: Duration,
    latency_threshold: Duration,
    current: Duration,
}

impl CadenceScheduler {
    pub fn new(config: &CadenceConfig) -> Self {
        let target = Duration::from_millis(config.target_interval_ms);
        Self {
            target,
            max: Duration::from_millis(config.max_interval_ms).max(target),
            latency_threshold: Duration::from_millis(config.latency_threshold_ms),
            current: target,
        }
    }

    /// 직전 사이클 소요 시간을 반영해 다음 사이클까지 대기 시간 계산
    pub fn next_delay(&mut self, cycle_elapsed: Duration) -> Duration {
        let previous = self.current;
        if cycle_elapsed > self.latency_threshold {
            self.current = (self.current * 2).min(self.max);
        } else if self.current > self.target {
            self.current = (self.current / 2).max(self.target);
        }

        if self.current != previous {
            debug!(
                elapsed_ms = cycle_elapsed.as_millis() as u64,
                interval_ms = self.current.as_millis() as u64,
                "사이클 간격 조정"
            );
        }

        self.current.saturating_sub(cycle_elapsed)
    }

    /// 현재 유효 간격
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    pub fn target_interval(&self) -> Duration {
        self.target
    }
}

/// 규칙별 발동 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFireState {
    pub last_fired_at_ms: Option<u64>,
}

/// 규칙 ID → 발동 상태 (발동 시 생성, 규칙 삭제 시 정리)
#[derive(Debug, Default)]
pub struct FireStateTable {
    states: HashMap<RuleId, RuleFireState>,
}

impl FireStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fired(&self, rule_id: RuleId) -> Option<u64> {
        self.states.get(&rule_id).and_then(|s| s.last_fired_at_ms)
    }

    /// 쿨다운이 지났는지 (발동 이력이 없으면 항상 true)
    pub fn is_ready(&self, rule_id: RuleId, cooldown_ms: u64, now_ms: u64) -> bool {
        match self.last_fired(rule_id) {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
        }
    }

    pub fn record_fire(&mut self, rule_id: RuleId, now_ms: u64) {
        self.states.entry(rule_id).or_default().last_fired_at_ms = Some(now_ms);
    }

    /// 주어진 ID 목록에 없는 규칙 상태 제거
    pub fn retain_rules<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = RuleId>,
    {
        let live: std::collections::HashSet<RuleId> = ids.into_iter().collect();
        let before = self.states.len();
        self.states.retain(|id, _| live.contains(id));
        let removed = before - self.states.len();
        if removed > 0 {
            debug!(removed, "삭제된 규칙의 발동 상태 정리");
        }
    }

    /// 단일 규칙 상태 제거
    pub fn prune(&mut self, rule_id: RuleId) -> bool {
        self.states.remove(&rule_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
