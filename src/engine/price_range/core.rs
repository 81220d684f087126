use super::relevant::relevant_set;
use crate::config::PriceRangeConfig;
use crate::domain::rules::RuleStore;
use crate::domain::tree::{ChoiceId, ConfigTree, PointId};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::propagation::{PropagationOptions, RulePropagationEngine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

// ==========================================
// PriceRange - 价格区间
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    /// 有效样本数
    pub samples: usize,
    /// 实际枚举的组合数
    pub permutations: u64,
    /// 枚举因上限中止, 区间为近似值
    pub approximate: bool,
}

impl PriceRange {
    fn from_samples(samples: &[f64], permutations: u64, approximate: bool) -> Option<Self> {
        let first = *samples.first()?;
        let (min, max) = samples
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self {
            min,
            max,
            samples: samples.len(),
            permutations,
            approximate,
        })
    }
}

/// 批量区间结果
///
/// 相关集合超限的 Choice 单独列出, 不影响其它 Choice 的区间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRangeReport {
    pub ranges: BTreeMap<ChoiceId, PriceRange>,
    /// 被拒绝的 Choice → 相关集合规模
    pub refused: BTreeMap<ChoiceId, usize>,
}

// ==========================================
// PriceRangeEnumerator
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PriceRangeEnumerator {
    config: PriceRangeConfig,
    propagation: RulePropagationEngine,
}

impl PriceRangeEnumerator {
    pub fn new(config: PriceRangeConfig, propagation: RulePropagationEngine) -> Self {
        Self {
            config,
            propagation,
        }
    }

    /// 计算目标 Choice 的可达价格区间
    ///
    /// # 流程
    /// 1. 求相关集合 (超出 max_relevant_set 直接拒绝)
    /// 2. 逐个枚举选中/未选中组合 (至多 max_permutations 个)
    /// 3. 违反基数约束或 ChoiceRule/PointRule 的组合剔除
    /// 4. 幸存组合在草稿树上跑规则传播, 目标及其所属点均启用时记录调整后价格
    ///
    /// # 返回
    /// - Ok(Some(range)): 区间 (approximate=true 表示枚举被截断)
    /// - Ok(None): 任何组合下目标都不可用
    #[instrument(skip(self, tree, rules, options))]
    pub fn compute(
        &self,
        tree: &ConfigTree,
        rules: &RuleStore,
        target: ChoiceId,
        options: &PropagationOptions,
    ) -> EngineResult<Option<PriceRange>> {
        tree.validate()?;
        let rules = rules.indexed();
        rules.validate_against(tree)?;
        self.compute_validated(tree, &rules, target, options)
    }

    /// 计算全部 Choice 的价格区间 (报表/导出用)
    ///
    /// 单个 Choice 的相关集合超出 max_relevant_set 时记入 refused 并继续;
    /// 其它错误 (树或规则引用不一致) 整体返回 Err
    #[instrument(skip_all, fields(choices = tree.choices.len()))]
    pub fn compute_all(
        &self,
        tree: &ConfigTree,
        rules: &RuleStore,
        options: &PropagationOptions,
    ) -> EngineResult<PriceRangeReport> {
        tree.validate()?;
        let rules = rules.indexed();
        rules.validate_against(tree)?;

        let mut report = PriceRangeReport::default();
        for choice in &tree.choices {
            match self.compute_validated(tree, &rules, choice.id, options) {
                Ok(Some(range)) => {
                    report.ranges.insert(choice.id, range);
                }
                Ok(None) => {}
                Err(EngineError::EnumerationTooLarge { size, limit }) => {
                    warn!(choice = %choice.id, size, limit, "相关集合过大, 跳过该 Choice");
                    report.refused.insert(choice.id, size);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            ranges = report.ranges.len(),
            refused = report.refused.len(),
            "批量价格区间完成"
        );
        Ok(report)
    }

    fn compute_validated(
        &self,
        tree: &ConfigTree,
        rules: &RuleStore,
        target: ChoiceId,
        options: &PropagationOptions,
    ) -> EngineResult<Option<PriceRange>> {
        let relevant = relevant_set(tree, rules, target)?;
        let limit_set = self.config.max_relevant_set.min(63);
        if relevant.len() > limit_set {
            return Err(EngineError::EnumerationTooLarge {
                size: relevant.len(),
                limit: limit_set,
            });
        }

        // 相关集合为空时只有一个组合
        let total: u64 = 1u64 << relevant.len();
        let budget = self.config.max_permutations as u64;
        let approximate = total > budget;
        let limit = total.min(budget);
        if approximate {
            warn!(
                relevant = relevant.len(),
                total, budget, "组合数超出上限, 价格区间为近似值"
            );
        }

        let touched_points: BTreeSet<_> = relevant
            .iter()
            .chain(std::iter::once(&target))
            .map(|c| tree.choices[c.index()].point_id)
            .collect();

        let mut samples = Vec::new();
        let mut rejected = 0usize;
        for mask in 0..limit {
            let scratch = materialize(tree, &relevant, target, mask);

            if violates_cardinality(&scratch, &touched_points)
                || violates_rules(&scratch, rules, &relevant, target)
            {
                rejected += 1;
                continue;
            }

            let mut settled = scratch;
            let (_, _, cycle) =
                self.propagation
                    .propagate_in_place(&mut settled, tree, rules, options);
            if cycle.is_some() {
                rejected += 1;
                continue;
            }

            let choice = &settled.choices[target.index()];
            if choice.enabled && settled.points[choice.point_id.index()].enabled {
                samples.push(choice.adjusted_price);
            }
        }

        debug!(
            relevant = relevant.len(),
            permutations = limit,
            rejected,
            samples = samples.len(),
            "价格区间枚举完成"
        );

        Ok(PriceRange::from_samples(&samples, limit, approximate))
    }
}

/// 在草稿树上落地一个组合: 第 i 位对应 relevant[i] 的选中状态, 目标视为选中
fn materialize(
    tree: &ConfigTree,
    relevant: &[ChoiceId],
    target: ChoiceId,
    mask: u64,
) -> ConfigTree {
    let mut scratch = tree.clone();
    for (bit, id) in relevant.iter().enumerate() {
        let choice = &mut scratch.choices[id.index()];
        choice.quantity = if mask & (1u64 << bit) != 0 {
            choice.quantity.max(1)
        } else {
            0
        };
    }
    let target_choice = &mut scratch.choices[target.index()];
    target_choice.quantity = target_choice.quantity.max(1);

    // 单选点: 目标独占, 非相关兄弟清空
    let point = &scratch.points[target_choice.point_id.index()];
    if point.pick_type.is_single() {
        let others: Vec<ChoiceId> = point
            .choice_ids
            .iter()
            .copied()
            .filter(|c| *c != target && !relevant.contains(c))
            .collect();
        for id in others {
            scratch.choices[id.index()].quantity = 0;
        }
    }
    scratch
}

fn violates_cardinality(tree: &ConfigTree, points: &BTreeSet<PointId>) -> bool {
    points.iter().any(|p| {
        let point = &tree.points[p.index()];
        let selected = point
            .choice_ids
            .iter()
            .filter(|c| tree.choices[c.index()].is_selected())
            .count();
        point.pick_type.exceeds_max(selected)
    })
}

/// 组合内被选中的 Choice 若违反自身 ChoiceRule 或所属点 PointRule 即剔除 (按原始选中判定)
fn violates_rules(
    tree: &ConfigTree,
    rules: &RuleStore,
    relevant: &[ChoiceId],
    target: ChoiceId,
) -> bool {
    let choice_selected = |c: ChoiceId| {
        tree.choices
            .get(c.index())
            .map_or(false, |choice| choice.is_selected())
    };
    let point_selected = |p: PointId| {
        tree.points.get(p.index()).map_or(false, |point| {
            point.choice_ids.iter().any(|c| choice_selected(*c))
        })
    };

    relevant
        .iter()
        .chain(std::iter::once(&target))
        .filter(|c| choice_selected(**c))
        .any(|c| {
            let point_id = tree.choices[c.index()].point_id;
            rules
                .rules_for_choice(*c)
                .flat_map(|(_, rule)| rule.clauses.iter())
                .chain(
                    rules
                        .rules_for_point(point_id)
                        .flat_map(|(_, rule)| rule.clauses.iter()),
                )
                .any(|clause| !clause.is_satisfied_by(choice_selected, point_selected))
        })
}
