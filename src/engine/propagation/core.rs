use super::outcome::{PropagationDelta, PropagationOutcome, RuleCycle};
use crate::config::PropagationConfig;
use crate::domain::rules::RuleStore;
use crate::domain::tree::{ChoiceId, ConfigTree, DisabledBy, OptionId, PointId};
use crate::domain::types::RuleKind;
use crate::engine::error::EngineResult;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

/// 单次传播的调用选项
#[derive(Debug, Clone, Default)]
pub struct PropagationOptions {
    /// 当前地块 (启用地块规则)
    pub lot_id: Option<i64>,
    /// 覆盖配置中的最大迭代轮数
    pub max_passes: Option<usize>,
}

impl PropagationOptions {
    pub fn for_lot(lot_id: i64) -> Self {
        Self {
            lot_id: Some(lot_id),
            max_passes: None,
        }
    }
}

// ==========================================
// RulePropagationEngine - 规则传播引擎
// ==========================================
// 算法: 按 id 顺序 Gauss-Seidel 迭代,直到某一轮无启用标记变化
// 上界: choices + points + 1 轮 (或配置值)
#[derive(Debug, Clone, Default)]
pub struct RulePropagationEngine {
    config: PropagationConfig,
}

impl RulePropagationEngine {
    pub fn new(config: PropagationConfig) -> Self {
        Self { config }
    }

    /// 对输入树执行规则传播,返回新树与增量
    ///
    /// # 参数
    /// - tree: 选配树 (不修改)
    /// - rules: 规则仓
    /// - options: 地块 / 迭代上限
    ///
    /// # 返回
    /// - Ok(outcome): outcome.cycle 为 Some 时表示未收敛,不稳定的 Choice 已默认禁用
    /// - Err: 树内引用不一致, 或规则引用了不存在的节点
    #[instrument(skip_all, fields(choices = tree.choices.len(), lot_id = ?options.lot_id))]
    pub fn apply(
        &self,
        tree: &ConfigTree,
        rules: &RuleStore,
        options: &PropagationOptions,
    ) -> EngineResult<PropagationOutcome> {
        tree.validate()?;
        let rules = rules.indexed();
        rules.validate_against(tree)?;

        let mut work = tree.clone();
        let (delta, passes, cycle) = self.propagate_in_place(&mut work, tree, &rules, options);

        debug!(
            passes,
            converged = cycle.is_none(),
            changed = !delta.is_empty(),
            "规则传播完成"
        );

        Ok(PropagationOutcome {
            tree: work,
            delta,
            passes,
            cycle,
        })
    }

    /// 在工作副本上传播 (调用方已完成规则校验)
    pub(crate) fn propagate_in_place(
        &self,
        work: &mut ConfigTree,
        original: &ConfigTree,
        rules: &RuleStore,
        options: &PropagationOptions,
    ) -> (PropagationDelta, usize, Option<RuleCycle>) {
        let mut delta = PropagationDelta::default();

        // === 步骤 1: 单选点基数归一化 ===
        delta.deselected = normalize_pick_types(work);

        // === 步骤 2: 地块规则 (与选中无关,预先计算) ===
        let lot_disabled = lot_disabled_choices(work, rules, options.lot_id);

        // === 步骤 3: 迭代至不动点 ===
        let max_passes = options
            .max_passes
            .or(self.config.max_passes)
            .unwrap_or(work.choices.len() + work.points.len() + 1)
            .max(1);

        let mut passes = 0;
        let mut converged = false;
        let mut last_flipped: BTreeSet<ChoiceId> = BTreeSet::new();

        while passes < max_passes {
            passes += 1;
            let (points_flipped, choices_flipped) = run_pass(work, rules, &lot_disabled);
            debug!(pass = passes, points_flipped, flipped = choices_flipped.len(), "传播轮次");
            if points_flipped == 0 && choices_flipped.is_empty() {
                converged = true;
                break;
            }
            last_flipped = choices_flipped;
        }

        let cycle = if converged {
            None
        } else {
            warn!(
                passes,
                unstable = ?last_flipped,
                "规则图未收敛, 不稳定选项默认禁用"
            );
            for id in &last_flipped {
                let choice = &mut work.choices[id.index()];
                choice.enabled = false;
                choice.disabled_by = vec![DisabledBy::RuleCycle];
            }
            Some(RuleCycle {
                passes,
                unstable_choices: last_flipped.into_iter().collect(),
            })
        };

        // === 步骤 4: 选件必选 + 调整后价格 ===
        apply_option_rules(work, rules);

        // === 步骤 5: 计算增量 ===
        collect_delta(&mut delta, original, work);

        (delta, passes, cycle)
    }
}

/// 单选点 (Pick1 / Pick0or1) 若有多个选中: 保留 id 顺序中第一个已启用者,否则保留第一个
fn normalize_pick_types(tree: &mut ConfigTree) -> Vec<ChoiceId> {
    let mut deselected = Vec::new();
    for point_idx in 0..tree.points.len() {
        if !tree.points[point_idx].pick_type.is_single() {
            continue;
        }
        let selected: Vec<ChoiceId> = tree.points[point_idx]
            .choice_ids
            .iter()
            .copied()
            .filter(|c| tree.choices[c.index()].is_selected())
            .collect();
        if selected.len() <= 1 {
            continue;
        }
        let keep = selected
            .iter()
            .copied()
            .find(|c| tree.choices[c.index()].enabled)
            .unwrap_or(selected[0]);
        for id in selected.into_iter().filter(|c| *c != keep) {
            tree.choices[id.index()].quantity = 0;
            deselected.push(id);
        }
    }
    deselected
}

/// 地块规则: MustNotHave 禁用该 Choice; MustHave 禁用其同点兄弟
fn lot_disabled_choices(
    tree: &ConfigTree,
    rules: &RuleStore,
    lot_id: Option<i64>,
) -> BTreeMap<ChoiceId, i64> {
    let mut disabled = BTreeMap::new();
    let Some(lot_id) = lot_id else {
        return disabled;
    };
    for rule in rules.lot_rules(lot_id) {
        match rule.kind {
            RuleKind::MustNotHave => {
                disabled.insert(rule.choice, lot_id);
            }
            RuleKind::MustHave => {
                let point_id = tree.choices[rule.choice.index()].point_id;
                for sibling in &tree.points[point_id.index()].choice_ids {
                    if *sibling != rule.choice {
                        disabled.insert(*sibling, lot_id);
                    }
                }
            }
        }
    }
    disabled
}

/// 执行一轮评估, 返回 (翻转的点数量, 翻转的 Choice 集合)
fn run_pass(
    work: &mut ConfigTree,
    rules: &RuleStore,
    lot_disabled: &BTreeMap<ChoiceId, i64>,
) -> (usize, BTreeSet<ChoiceId>) {
    let mut points_flipped = 0;
    let mut choices_flipped = BTreeSet::new();

    for point_idx in 0..work.points.len() {
        let point_id = PointId(point_idx as u32);
        let violations = point_violations(work, rules, point_id);
        let enabled = violations.is_empty();
        let point = &mut work.points[point_idx];
        if point.enabled != enabled {
            points_flipped += 1;
        }
        point.enabled = enabled;
        point.disabled_by = violations;
    }

    for choice_idx in 0..work.choices.len() {
        let choice_id = ChoiceId(choice_idx as u32);
        let violations = choice_violations(work, rules, lot_disabled, choice_id);
        let enabled = violations.is_empty();
        let choice = &mut work.choices[choice_idx];
        if choice.enabled != enabled {
            choices_flipped.insert(choice_id);
        }
        choice.enabled = enabled;
        choice.disabled_by = violations;
    }

    (points_flipped, choices_flipped)
}

fn point_violations(tree: &ConfigTree, rules: &RuleStore, point_id: PointId) -> Vec<DisabledBy> {
    let mut violations = Vec::new();
    for (rule_index, rule) in rules.rules_for_point(point_id) {
        for (clause_index, clause) in rule.clauses.iter().enumerate() {
            let satisfied = clause.is_satisfied_by(
                |c| tree.is_effectively_selected(c),
                |p| tree.is_point_effectively_selected(p),
            );
            if !satisfied {
                violations.push(DisabledBy::PointRule {
                    rule_index,
                    clause_index,
                });
            }
        }
    }
    violations
}

fn choice_violations(
    tree: &ConfigTree,
    rules: &RuleStore,
    lot_disabled: &BTreeMap<ChoiceId, i64>,
    choice_id: ChoiceId,
) -> Vec<DisabledBy> {
    let mut violations = Vec::new();
    let point_id = tree.choices[choice_id.index()].point_id;
    if !tree.points[point_id.index()].enabled {
        violations.push(DisabledBy::PointDisabled { point: point_id });
    }
    if let Some(lot_id) = lot_disabled.get(&choice_id) {
        violations.push(DisabledBy::LotRule { lot_id: *lot_id });
    }
    for (rule_index, rule) in rules.rules_for_choice(choice_id) {
        for (clause_index, clause) in rule.clauses.iter().enumerate() {
            let satisfied = clause.is_satisfied_by(
                |c| tree.is_effectively_selected(c),
                |p| tree.is_point_effectively_selected(p),
            );
            if !satisfied {
                violations.push(DisabledBy::ChoiceRule {
                    rule_index,
                    clause_index,
                });
            }
        }
    }
    violations
}

/// 选件规则: 条件满足时选件价格计入目标 Choice; 目标生效选中时选件自动选中
pub(crate) fn apply_option_rules(tree: &mut ConfigTree, rules: &RuleStore) {
    let mut active_by_choice: BTreeMap<ChoiceId, BTreeSet<OptionId>> = BTreeMap::new();
    let mut selected_options: BTreeSet<OptionId> = BTreeSet::new();

    for rule in &rules.option_rules {
        if !rule.is_satisfied_by(|c| tree.is_effectively_selected(c)) {
            continue;
        }
        active_by_choice
            .entry(rule.target_choice)
            .or_default()
            .insert(rule.option);
        if tree.is_effectively_selected(rule.target_choice) {
            selected_options.insert(rule.option);
        }
    }

    for option in tree.options.iter_mut() {
        option.selected = selected_options.contains(&option.id);
    }

    let option_prices: Vec<f64> = tree.options.iter().map(|o| o.price).collect();
    for choice in tree.choices.iter_mut() {
        let extra: f64 = active_by_choice
            .get(&choice.id)
            .map(|ids| ids.iter().map(|o| option_prices[o.index()]).sum())
            .unwrap_or(0.0);
        choice.adjusted_price = choice.price + extra;
    }
}

fn collect_delta(delta: &mut PropagationDelta, before: &ConfigTree, after: &ConfigTree) {
    for (old, new) in before.choices.iter().zip(after.choices.iter()) {
        match (old.enabled, new.enabled) {
            (false, true) => delta.choices_enabled.push(new.id),
            (true, false) => delta.choices_disabled.push(new.id),
            _ => {}
        }
        if (old.adjusted_price - new.adjusted_price).abs() > f64::EPSILON {
            delta.price_changed.push(new.id);
        }
    }
    for (old, new) in before.points.iter().zip(after.points.iter()) {
        match (old.enabled, new.enabled) {
            (false, true) => delta.points_enabled.push(new.id),
            (true, false) => delta.points_disabled.push(new.id),
            _ => {}
        }
    }
    for (old, new) in before.options.iter().zip(after.options.iter()) {
        match (old.selected, new.selected) {
            (false, true) => delta.options_selected.push(new.id),
            (true, false) => delta.options_deselected.push(new.id),
            _ => {}
        }
    }
}
