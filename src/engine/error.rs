// ==========================================
// 住宅选配规则引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: ConflictOverrideRequired 与 EnumerationBudgetExceeded 为结构化结果,
//       分别见 SelectionGate 与 PriceRange::approximate,不在此枚举中
// ==========================================

use crate::config::ConfigError;
use crate::domain::change_order::ChangeOrderAction;
use crate::domain::tree::{ChoiceId, GroupId, OptionId, PointId, SubGroupId};
use crate::domain::types::SalesStatus;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 规则传播 =====
    #[error("规则图未收敛: passes={passes}, unstable_choices={unstable_choices:?}")]
    RuleCycle {
        passes: usize,
        unstable_choices: Vec<ChoiceId>,
    },

    // ===== 变更单流程 =====
    #[error("无效的状态迁移: from={from} action={action}")]
    InvalidTransition {
        from: SalesStatus,
        action: ChangeOrderAction,
    },

    #[error("不可达的确认状态: from={from} to={to}")]
    UnreachableStatus { from: SalesStatus, to: SalesStatus },

    #[error("变更单后缀已用尽: sequence={sequence}")]
    SuffixExhausted { sequence: u32 },

    // ===== 价格区间 =====
    #[error("相关集合过大: size={size}, limit={limit}")]
    EnumerationTooLarge { size: usize, limit: usize },

    // ===== 树/数据 =====
    #[error("未知分组: {0}")]
    UnknownGroup(GroupId),

    #[error("未知子分组: {0}")]
    UnknownSubGroup(SubGroupId),

    #[error("未知决策点: {0}")]
    UnknownPoint(PointId),

    #[error("未知选项: {0}")]
    UnknownChoice(ChoiceId),

    #[error("未知选件: {0}")]
    UnknownOption(OptionId),

    #[error("数量无效: choice={choice}, quantity={quantity}, max={max}")]
    InvalidQuantity {
        choice: ChoiceId,
        quantity: u32,
        max: u32,
    },

    // ===== 配置 =====
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
