// ==========================================
// 住宅选配规则引擎 - 规则传播引擎
// ==========================================
// 职责: 给定选配树与规则仓,迭代至不动点,重算所有 Choice/Point 的启用状态
// 输入: ConfigTree (只读) + RuleStore (只读) + 传播选项
// 输出: 新的 ConfigTree + 变更增量 (delta)
// 红线: 不修改输入; 未收敛不得静默死循环,必须上报 RuleCycle
// ==========================================

mod core;
mod outcome;

#[cfg(test)]
mod tests;

pub use self::core::{PropagationOptions, RulePropagationEngine};
pub use self::outcome::{PropagationDelta, PropagationOutcome, RuleCycle};
