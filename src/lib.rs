// ==========================================
// 住宅选配规则引擎 - 核心库
// ==========================================
// 范围: 规则传播 / 完成状态 / 价格区间 / 变更单审批 / 单调性冲突
// 定位: 库级契约,数据访问、持久化与展示由外部协作方负责
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 选配树、规则、变更单、地块
pub mod domain;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 引擎参数与审批策略
pub mod config;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ChangeType, ConstructionStatus, EnvelopeState, PickType, PointKind, PointStatus, RuleKind,
    SalesStatus,
};

// 领域实体
pub use domain::{
    ChangeOrderAction, ChangeOrderGroup, Choice, ChoiceId, ConfigTree, DecisionPoint, Lot,
    MonotonyRule, OptionId, PointId, RuleStore,
};

// 引擎
pub use engine::{
    ChangeOrderWorkflow, ConfigSession, EngineError, EngineResult, MonotonyDetector,
    PriceRangeEnumerator, RulePropagationEngine, StatusAggregator,
};

// 配置
pub use config::{ApprovalPolicyReader, ApprovalPolicyTable, EngineConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "住宅选配规则引擎";
