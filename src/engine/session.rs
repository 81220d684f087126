// ==========================================
// 住宅选配规则引擎 - 选配会话编排器
// ==========================================
// 用途: 协调 选中 → 规则传播 → 状态汇总 的执行顺序
// 提交: 在工作副本上完成全部步骤后整体替换,任一步失败则会话树不变
// ==========================================

use crate::config::EngineConfig;
use crate::domain::lot::Lot;
use crate::domain::rules::RuleStore;
use crate::domain::tree::{ChoiceId, ConfigTree};
use crate::engine::error::EngineResult;
use crate::engine::monotony::{MonotonyConflict, MonotonyDetector, SelectionGate};
use crate::engine::price_range::{PriceRange, PriceRangeEnumerator, PriceRangeReport};
use crate::engine::propagation::{
    PropagationDelta, PropagationOptions, RuleCycle, RulePropagationEngine,
};
use crate::engine::selection::{self, SelectionDelta};
use crate::engine::status::{StatusAggregator, StatusSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

// ==========================================
// SessionUpdate - 单次操作结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub selection: SelectionDelta,
    pub propagation: PropagationDelta,
    pub passes: usize,
    /// 规则图未收敛时的诊断 (相关 Choice 已默认禁用)
    pub cycle: Option<RuleCycle>,
    pub status: StatusSummary,
}

// ==========================================
// ConfigSession - 选配会话
// ==========================================
#[derive(Debug, Clone)]
pub struct ConfigSession {
    tree: ConfigTree,
    rules: RuleStore,
    lot: Option<Lot>,
    plan_id: Option<i64>,
    config: EngineConfig,
    propagation: RulePropagationEngine,
    enumerator: PriceRangeEnumerator,
}

impl ConfigSession {
    /// 创建会话并完成首次传播
    ///
    /// # 返回
    /// - Err(Config): 配置无效
    /// - Err(Unknown*): 树内引用不一致, 或规则引用了不存在的节点
    pub fn new(
        tree: ConfigTree,
        mut rules: RuleStore,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        tree.validate()?;
        rules.reindex();
        rules.validate_against(&tree)?;

        let propagation = RulePropagationEngine::new(config.propagation.clone());
        let enumerator =
            PriceRangeEnumerator::new(config.price_range.clone(), propagation.clone());
        let mut session = Self {
            tree,
            rules,
            lot: None,
            plan_id: None,
            config,
            propagation,
            enumerator,
        };
        session.refresh()?;
        Ok(session)
    }

    /// 绑定地块与户型 (启用地块规则与单调性检测), 并重新传播
    pub fn with_lot(mut self, lot: Lot, plan_id: i64) -> EngineResult<Self> {
        self.lot = Some(lot);
        self.plan_id = Some(plan_id);
        self.refresh()?;
        Ok(self)
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn lot(&self) -> Option<&Lot> {
        self.lot.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 会话树交还调用方
    pub fn into_tree(self) -> ConfigTree {
        self.tree
    }

    pub fn propagation_options(&self) -> PropagationOptions {
        PropagationOptions {
            lot_id: self.lot.as_ref().map(|l| l.id),
            max_passes: None,
        }
    }

    // ===== 选中操作 =====

    #[instrument(skip(self))]
    pub fn select(&mut self, choice: ChoiceId, quantity: u32) -> EngineResult<SessionUpdate> {
        let mut work = self.tree.clone();
        let delta = selection::select_choice(&mut work, choice, quantity)?;
        self.commit(work, delta)
    }

    pub fn deselect(&mut self, choice: ChoiceId) -> EngineResult<SessionUpdate> {
        self.select(choice, 0)
    }

    pub fn set_override_note(&mut self, choice: ChoiceId, note: &str) -> EngineResult<()> {
        selection::set_override_note(&mut self.tree, choice, note)
    }

    pub fn clear_override_note(&mut self, choice: ChoiceId) -> EngineResult<()> {
        selection::clear_override_note(&mut self.tree, choice)
    }

    /// 不改选中, 重新传播并汇总
    pub fn refresh(&mut self) -> EngineResult<SessionUpdate> {
        let work = self.tree.clone();
        self.commit(work, SelectionDelta::default())
    }

    // ===== 按需计算 =====

    pub fn price_range(&self, choice: ChoiceId) -> EngineResult<Option<PriceRange>> {
        self.enumerator
            .compute(&self.tree, &self.rules, choice, &self.propagation_options())
    }

    pub fn price_ranges(&self) -> EngineResult<PriceRangeReport> {
        self.enumerator
            .compute_all(&self.tree, &self.rules, &self.propagation_options())
    }

    /// 当前选择的单调性冲突 (未绑定地块或检测关闭时为 None)
    pub fn monotony(&self) -> Option<MonotonyConflict> {
        let (lot, plan_id) = self.monotony_scope()?;
        Some(MonotonyDetector::evaluate_tree(&self.tree, lot, plan_id))
    }

    /// 选中前门禁 (未绑定地块或检测关闭时放行)
    pub fn gate_selection(&self, choice: ChoiceId) -> EngineResult<SelectionGate> {
        match self.monotony_scope() {
            Some((lot, plan_id)) => {
                MonotonyDetector::gate_selection(&self.tree, lot, plan_id, choice)
            }
            None => {
                self.tree.choice(choice)?;
                Ok(SelectionGate::Proceed)
            }
        }
    }

    fn monotony_scope(&self) -> Option<(&Lot, i64)> {
        if !self.config.monotony.enabled {
            return None;
        }
        Some((self.lot.as_ref()?, self.plan_id?))
    }

    /// 传播 + 状态汇总后整体提交
    fn commit(
        &mut self,
        work: ConfigTree,
        selection: SelectionDelta,
    ) -> EngineResult<SessionUpdate> {
        let outcome = self
            .propagation
            .apply(&work, &self.rules, &self.propagation_options())?;
        if let Some(cycle) = &outcome.cycle {
            warn!(
                passes = cycle.passes,
                unstable = cycle.unstable_choices.len(),
                "规则图未收敛, 结果已提交但需人工处理"
            );
        }

        let mut tree = outcome.tree;
        let status = StatusAggregator::aggregate(&mut tree);
        self.tree = tree;

        debug!(passes = outcome.passes, "会话已提交");
        info!(
            overall = %status.overall,
            total = self.tree.selections_total(),
            "选配状态已刷新"
        );

        Ok(SessionUpdate {
            selection,
            propagation: outcome.delta,
            passes: outcome.passes,
            cycle: outcome.cycle,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lot::MonotonyRule;
    use crate::domain::rules::{ChoiceRule, RuleClause};
    use crate::domain::types::{PickType, PointKind, PointStatus};

    fn session() -> (ConfigSession, ChoiceId, ChoiceId) {
        let mut tree = ConfigTree::new();
        let g = tree.add_group("Exterior");
        let sg = tree.add_sub_group(g, "Facade").unwrap();
        let p = tree
            .add_point(sg, 1, "Elevation", PickType::Pick1, PointKind::Elevation)
            .unwrap();
        let a = tree.add_choice(p, 5, "Elevation A", 0.0).unwrap();
        let q = tree
            .add_point(sg, 2, "Porch", PickType::Pick0or1, PointKind::Standard)
            .unwrap();
        let porch = tree.add_choice(q, 40, "Covered porch", 3500.0).unwrap();

        let mut rules = RuleStore::default();
        rules.add_choice_rule(ChoiceRule {
            target: porch,
            clauses: vec![RuleClause::must_have(vec![a], vec![])],
        });
        let session = ConfigSession::new(tree, rules, EngineConfig::default()).unwrap();
        (session, a, porch)
    }

    #[test]
    fn test_select_runs_full_pipeline() {
        let (mut session, a, porch) = session();
        assert!(!session.tree().choices[porch.index()].enabled);

        let update = session.select(a, 1).unwrap();
        assert_eq!(update.propagation.choices_enabled, vec![porch]);
        assert!(update.cycle.is_none());
        assert_eq!(update.status.overall, PointStatus::Completed);
        assert!(session.tree().choices[porch.index()].enabled);
    }

    #[test]
    fn test_failed_selection_leaves_session_untouched() {
        let (mut session, a, _) = session();
        let before = session.tree().choices[a.index()].quantity;
        assert!(session.select(a, 3).is_err());
        assert_eq!(session.tree().choices[a.index()].quantity, before);
    }

    #[test]
    fn test_monotony_requires_lot_and_respects_config() {
        let (session, a, _) = session();
        assert!(session.monotony().is_none());
        assert_eq!(session.gate_selection(a).unwrap(), SelectionGate::Proceed);

        let mut lot = Lot::new(9, 1);
        lot.monotony_rules.push(MonotonyRule {
            plan_id: 10,
            elevation_choice_id: Some(5),
            color_scheme_choice_id: None,
            excluded_color_attribute_ids: Vec::new(),
        });
        let mut session = session.with_lot(lot, 10).unwrap();
        assert!(matches!(
            session.gate_selection(a).unwrap(),
            SelectionGate::OverrideRequired(_)
        ));

        session.select(a, 1).unwrap();
        assert_eq!(session.monotony().map(|c| c.elevation_conflict), Some(true));
        session.set_override_note(a, "approved").unwrap();
        assert_eq!(session.monotony().map(|c| c.elevation_conflict), Some(false));
    }
}
