// ==========================================
// 住宅选配规则引擎 - 规则模型
// ==========================================
// 规则类型:
// - ChoiceRule: 约束单个 Choice 的可用性
// - PointRule: 约束整个决策点的可用性
// - OptionRule: 决定选件是否必选 (影响调整后价格)
// - LotChoiceRule: 地块范围的必选/禁选
// ==========================================

use crate::domain::tree::{ChoiceId, ConfigTree, OptionId, PointId};
use crate::domain::types::RuleKind;
use crate::engine::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 规则子句: MustHave 需全部被引用项选中; MustNotHave 需被引用项均未选中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleClause {
    pub kind: RuleKind,
    #[serde(default)]
    pub choices: Vec<ChoiceId>,
    #[serde(default)]
    pub points: Vec<PointId>,
}

impl RuleClause {
    pub fn must_have(choices: Vec<ChoiceId>, points: Vec<PointId>) -> Self {
        Self {
            kind: RuleKind::MustHave,
            choices,
            points,
        }
    }

    pub fn must_not_have(choices: Vec<ChoiceId>, points: Vec<PointId>) -> Self {
        Self {
            kind: RuleKind::MustNotHave,
            choices,
            points,
        }
    }

    /// 按给定的"是否选中"判定函数评估子句
    pub fn is_satisfied_by<C, P>(&self, choice_selected: C, point_selected: P) -> bool
    where
        C: Fn(ChoiceId) -> bool,
        P: Fn(PointId) -> bool,
    {
        match self.kind {
            RuleKind::MustHave => {
                self.choices.iter().all(|c| choice_selected(*c))
                    && self.points.iter().all(|p| point_selected(*p))
            }
            RuleKind::MustNotHave => {
                !self.choices.iter().any(|c| choice_selected(*c))
                    && !self.points.iter().any(|p| point_selected(*p))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRule {
    pub target: ChoiceId,
    pub clauses: Vec<RuleClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRule {
    pub target: PointId,
    pub clauses: Vec<RuleClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRuleChoice {
    pub choice: ChoiceId,
    pub must_have: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRule {
    pub option: OptionId,
    /// 选件价格计入该 Choice 的调整后价格
    pub target_choice: ChoiceId,
    pub choices: Vec<OptionRuleChoice>,
}

impl OptionRule {
    /// 条件 Choice 是否满足 (不含目标自身)
    pub fn is_satisfied_by<C>(&self, choice_selected: C) -> bool
    where
        C: Fn(ChoiceId) -> bool,
    {
        self.choices
            .iter()
            .all(|entry| choice_selected(entry.choice) == entry.must_have)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotChoiceRule {
    pub lot_id: i64,
    pub choice: ChoiceId,
    pub kind: RuleKind,
}

// ==========================================
// RuleStore - 规则仓
// ==========================================
// 反向索引在构建时生成,传播过程中只读
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleStore {
    #[serde(default)]
    pub choice_rules: Vec<ChoiceRule>,
    #[serde(default)]
    pub point_rules: Vec<PointRule>,
    #[serde(default)]
    pub option_rules: Vec<OptionRule>,
    #[serde(default)]
    pub lot_choice_rules: Vec<LotChoiceRule>,

    #[serde(skip)]
    by_choice: HashMap<ChoiceId, Vec<usize>>,
    #[serde(skip)]
    by_point: HashMap<PointId, Vec<usize>>,
    #[serde(skip)]
    options_by_choice: HashMap<ChoiceId, Vec<usize>>,
}

impl RuleStore {
    pub fn new(
        choice_rules: Vec<ChoiceRule>,
        point_rules: Vec<PointRule>,
        option_rules: Vec<OptionRule>,
        lot_choice_rules: Vec<LotChoiceRule>,
    ) -> Self {
        let mut store = Self {
            choice_rules,
            point_rules,
            option_rules,
            lot_choice_rules,
            ..Default::default()
        };
        store.reindex();
        store
    }

    /// 重建反向索引 (反序列化后需调用)
    pub fn reindex(&mut self) {
        self.by_choice.clear();
        self.by_point.clear();
        self.options_by_choice.clear();
        for (i, rule) in self.choice_rules.iter().enumerate() {
            self.by_choice.entry(rule.target).or_default().push(i);
        }
        for (i, rule) in self.point_rules.iter().enumerate() {
            self.by_point.entry(rule.target).or_default().push(i);
        }
        for (i, rule) in self.option_rules.iter().enumerate() {
            self.options_by_choice
                .entry(rule.target_choice)
                .or_default()
                .push(i);
        }
    }

    pub fn add_choice_rule(&mut self, rule: ChoiceRule) {
        self.by_choice
            .entry(rule.target)
            .or_default()
            .push(self.choice_rules.len());
        self.choice_rules.push(rule);
    }

    pub fn add_point_rule(&mut self, rule: PointRule) {
        self.by_point
            .entry(rule.target)
            .or_default()
            .push(self.point_rules.len());
        self.point_rules.push(rule);
    }

    pub fn add_option_rule(&mut self, rule: OptionRule) {
        self.options_by_choice
            .entry(rule.target_choice)
            .or_default()
            .push(self.option_rules.len());
        self.option_rules.push(rule);
    }

    pub fn add_lot_choice_rule(&mut self, rule: LotChoiceRule) {
        self.lot_choice_rules.push(rule);
    }

    /// 以 choice 为目标的 ChoiceRule (下标, 规则)
    pub fn rules_for_choice(&self, choice: ChoiceId) -> impl Iterator<Item = (usize, &ChoiceRule)> {
        self.by_choice
            .get(&choice)
            .into_iter()
            .flatten()
            .map(move |i| (*i, &self.choice_rules[*i]))
    }

    /// 以 point 为目标的 PointRule (下标, 规则)
    pub fn rules_for_point(&self, point: PointId) -> impl Iterator<Item = (usize, &PointRule)> {
        self.by_point
            .get(&point)
            .into_iter()
            .flatten()
            .map(move |i| (*i, &self.point_rules[*i]))
    }

    /// 价格计入 choice 的 OptionRule
    pub fn option_rules_for_choice(&self, choice: ChoiceId) -> impl Iterator<Item = &OptionRule> {
        self.options_by_choice
            .get(&choice)
            .into_iter()
            .flatten()
            .map(move |i| &self.option_rules[*i])
    }

    pub fn lot_rules(&self, lot_id: i64) -> impl Iterator<Item = &LotChoiceRule> {
        self.lot_choice_rules
            .iter()
            .filter(move |r| r.lot_id == lot_id)
    }

    pub fn is_empty(&self) -> bool {
        self.choice_rules.is_empty()
            && self.point_rules.is_empty()
            && self.option_rules.is_empty()
            && self.lot_choice_rules.is_empty()
    }

    /// 校验所有规则引用的节点均存在于树中
    pub fn validate_against(&self, tree: &ConfigTree) -> EngineResult<()> {
        let check_clause = |clause: &RuleClause| -> EngineResult<()> {
            for c in &clause.choices {
                tree.choice(*c)?;
            }
            for p in &clause.points {
                tree.point(*p)?;
            }
            Ok(())
        };

        for rule in &self.choice_rules {
            tree.choice(rule.target)?;
            rule.clauses.iter().try_for_each(check_clause)?;
        }
        for rule in &self.point_rules {
            tree.point(rule.target)?;
            rule.clauses.iter().try_for_each(check_clause)?;
        }
        for rule in &self.option_rules {
            tree.option(rule.option)?;
            tree.choice(rule.target_choice)?;
            for entry in &rule.choices {
                tree.choice(entry.choice)?;
            }
        }
        for rule in &self.lot_choice_rules {
            tree.choice(rule.choice)?;
        }
        Ok(())
    }

    /// 索引是否与规则列表一致 (反序列化后未 reindex 时为 false)
    pub(crate) fn is_indexed(&self) -> bool {
        let indexed: usize = self.by_choice.values().map(Vec::len).sum();
        let point_indexed: usize = self.by_point.values().map(Vec::len).sum();
        let option_indexed: usize = self.options_by_choice.values().map(Vec::len).sum();
        indexed == self.choice_rules.len()
            && point_indexed == self.point_rules.len()
            && option_indexed == self.option_rules.len()
    }

    /// 返回已建立索引的规则仓 (必要时克隆后重建)
    pub fn indexed(&self) -> std::borrow::Cow<'_, RuleStore> {
        if self.is_indexed() {
            std::borrow::Cow::Borrowed(self)
        } else {
            let mut store = self.clone();
            store.reindex();
            std::borrow::Cow::Owned(store)
        }
    }
}
