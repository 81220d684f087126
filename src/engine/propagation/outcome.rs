use crate::domain::tree::{ChoiceId, ConfigTree, OptionId, PointId};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

// ==========================================
// PropagationDelta - 相对输入树的变更增量
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationDelta {
    pub choices_enabled: Vec<ChoiceId>,
    pub choices_disabled: Vec<ChoiceId>,
    pub points_enabled: Vec<PointId>,
    pub points_disabled: Vec<PointId>,
    /// 单选点基数归一化时被取消的选中
    pub deselected: Vec<ChoiceId>,
    pub options_selected: Vec<OptionId>,
    pub options_deselected: Vec<OptionId>,
    /// 调整后价格发生变化的 Choice
    pub price_changed: Vec<ChoiceId>,
}

impl PropagationDelta {
    pub fn is_empty(&self) -> bool {
        self.choices_enabled.is_empty()
            && self.choices_disabled.is_empty()
            && self.points_enabled.is_empty()
            && self.points_disabled.is_empty()
            && self.deselected.is_empty()
            && self.options_selected.is_empty()
            && self.options_deselected.is_empty()
            && self.price_changed.is_empty()
    }
}

/// 规则图未收敛的诊断信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCycle {
    pub passes: usize,
    /// 最后一轮仍在翻转的 Choice (已默认禁用)
    pub unstable_choices: Vec<ChoiceId>,
}

// ==========================================
// PropagationOutcome - 传播结果
// ==========================================
#[derive(Debug, Clone)]
pub struct PropagationOutcome {
    pub tree: ConfigTree,
    pub delta: PropagationDelta,
    pub passes: usize,
    pub cycle: Option<RuleCycle>,
}

impl PropagationOutcome {
    pub fn converged(&self) -> bool {
        self.cycle.is_none()
    }

    /// 未收敛时转换为 EngineError::RuleCycle
    pub fn ensure_converged(self) -> EngineResult<Self> {
        match self.cycle {
            Some(cycle) => Err(EngineError::RuleCycle {
                passes: cycle.passes,
                unstable_choices: cycle.unstable_choices,
            }),
            None => Ok(self),
        }
    }
}
