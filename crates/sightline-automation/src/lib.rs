//! # sightline-automation
//!
//! 인지-판단-행동 루프 크레이트.
//! 규칙 저장소(스냅샷), 규칙 엔진, 쿨다운/주기 스케줄러,
//! 액션 디스패처(입력 드라이버), 그리고 이들을 묶는 자동화 루프를 담당한다.
//! 한 사이클에 전달되는 액션은 최대 하나다.

pub mod automation_loop;
pub mod dispatcher;
pub mod rule_engine;
pub mod rule_store;
pub mod scheduler;

pub use automation_loop::{AutomationLoop, LoopComponents, LoopState, LoopStats, StopReason};
pub use dispatcher::{create_platform_input_driver, ActionDispatcher, NoOpInputDriver};
pub use rule_store::{RuleSnapshot, RuleStore, RuleStoreWarning};
