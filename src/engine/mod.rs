// ==========================================
// 住宅选配规则引擎 - 引擎层
// ==========================================
// 职责: 规则传播 / 状态汇总 / 价格区间 / 变更单流程 / 单调性检测
// 红线: 纯内存同步计算,不做 I/O; 所有禁用必须可追溯到规则
// ==========================================

pub mod error;
pub mod monotony;
pub mod price_range;
pub mod propagation;
pub mod selection;
pub mod session;
pub mod status;
pub mod workflow;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use monotony::{
    MonotonyConflict, MonotonyDetector, MonotonyInput, MonotonySelection, SelectionGate,
};
pub use price_range::{relevant_set, PriceRange, PriceRangeEnumerator, PriceRangeReport};
pub use propagation::{
    PropagationDelta, PropagationOptions, PropagationOutcome, RuleCycle, RulePropagationEngine,
};
pub use selection::SelectionDelta;
pub use session::{ConfigSession, SessionUpdate};
pub use status::{StatusAggregator, StatusSummary};
pub use workflow::{
    allowed_actions, sequence_position, AckOutcome, ActionMenuKey, ChangeOrderWorkflow,
    TransitionAck, TransitionRequest, TransitionTarget,
};
