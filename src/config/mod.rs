// ==========================================
// 住宅选配规则引擎 - 配置层
// ==========================================
// 职责: 引擎参数 (迭代上限 / 枚举上限) 与施工自动审批策略
// 存储: JSON (外部数据层提供)
// ==========================================

pub mod approval_policy;
pub mod engine_config;

// 重导出核心配置
pub use approval_policy::{ApprovalPolicyEntry, ApprovalPolicyReader, ApprovalPolicyTable};
pub use engine_config::{
    ConfigError, EngineConfig, MonotonyConfig, PriceRangeConfig, PropagationConfig,
};
