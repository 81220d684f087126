// ==========================================
// 住宅选配规则引擎 - 领域模型层
// ==========================================
// 职责: 定义选配树、规则、变更单、地块等实体与封闭枚举
// 红线: 不含引擎逻辑,不含 I/O
// ==========================================

pub mod change_order;
pub mod lot;
pub mod rules;
pub mod tree;
pub mod types;

// 重导出核心类型
pub use change_order::{
    ChangeOrderAction, ChangeOrderChoice, ChangeOrderGroup, EnvelopeRef, SequencePosition,
    StatusHistoryEntry, SubChangeOrder,
};
pub use lot::{Lot, MonotonyRule};
pub use rules::{
    ChoiceRule, LotChoiceRule, OptionRule, OptionRuleChoice, PointRule, RuleClause, RuleStore,
};
pub use tree::{
    AttributeAssignment, CatalogOption, Choice, ChoiceId, ConfigTree, DecisionPoint, DisabledBy,
    Group, GroupId, OptionId, PointId, SubGroup, SubGroupId,
};
pub use types::{
    ChangeType, ConstructionStatus, EnvelopeState, ParseEnumError, PickType, PointKind,
    PointStatus, RuleKind, SalesStatus,
};
