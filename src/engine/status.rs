// ==========================================
// 住宅选配规则引擎 - 完成状态汇总
// ==========================================
// 职责: 自底向上推导 Point / SubGroup / Group 完成状态
// 规则: 上层状态取子节点中最差者
//       CONFLICTED > REQUIRED > PARTIALLY_COMPLETED > COMPLETED > VIEWED > UNVIEWED
// 红线: 只读规则传播结果,不改变启用状态与选中
// ==========================================

use crate::domain::tree::{ConfigTree, DecisionPoint, PointId};
use crate::domain::types::PointStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 状态汇总结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub overall: PointStatus,
    pub point_counts: BTreeMap<PointStatus, usize>,
    pub conflicted_points: Vec<PointId>,
    pub required_points: Vec<PointId>,
}

impl StatusSummary {
    /// 所有必选项均已完成且无冲突
    pub fn is_complete(&self) -> bool {
        self.conflicted_points.is_empty() && self.required_points.is_empty()
    }
}

// ==========================================
// StatusAggregator
// ==========================================
pub struct StatusAggregator;

impl StatusAggregator {
    /// 推导单个决策点的状态
    ///
    /// # 规则
    /// 1. 有选中但被禁用的 Choice → CONFLICTED
    /// 2. 选中数超出上限 → CONFLICTED
    /// 3. 选中数不足下限: 点可用 (点启用且至少一个 Choice 启用) → REQUIRED, 否则 CONFLICTED
    /// 4. 满足且无选中 → VIEWED / UNVIEWED
    /// 5. 满足但有选中 Choice 缺必需属性 → PARTIALLY_COMPLETED
    /// 6. 否则 → COMPLETED
    pub fn point_status(tree: &ConfigTree, point: &DecisionPoint) -> PointStatus {
        let choices: Vec<_> = point
            .choice_ids
            .iter()
            .filter_map(|id| tree.choices.get(id.index()))
            .collect();
        let selected: Vec<_> = choices.iter().filter(|c| c.is_selected()).collect();

        if selected.iter().any(|c| !c.enabled || !point.enabled) {
            return PointStatus::Conflicted;
        }
        if point.pick_type.exceeds_max(selected.len()) {
            return PointStatus::Conflicted;
        }
        if selected.len() < point.pick_type.min() {
            let available = point.enabled && choices.iter().any(|c| c.enabled);
            return if available {
                PointStatus::Required
            } else {
                PointStatus::Conflicted
            };
        }
        if selected.is_empty() {
            return if point.viewed {
                PointStatus::Viewed
            } else {
                PointStatus::Unviewed
            };
        }
        if selected.iter().all(|c| c.attributes_complete()) {
            PointStatus::Completed
        } else {
            PointStatus::PartiallyCompleted
        }
    }

    /// 重算并写回全树状态
    #[instrument(skip_all, fields(points = tree.points.len()))]
    pub fn aggregate(tree: &mut ConfigTree) -> StatusSummary {
        let point_statuses: Vec<PointStatus> = tree
            .points
            .iter()
            .map(|p| Self::point_status(tree, p))
            .collect();

        for (point, status) in tree.points.iter_mut().zip(point_statuses.iter()) {
            point.status = *status;
        }
        for choice in tree.choices.iter_mut() {
            choice.completed = choice.is_selected() && choice.enabled && choice.attributes_complete();
        }

        for sub_group in tree.sub_groups.iter_mut() {
            sub_group.status = fold_worst(
                sub_group
                    .point_ids
                    .iter()
                    .filter_map(|p| point_statuses.get(p.index()).copied()),
            );
        }
        let sub_group_statuses: Vec<PointStatus> =
            tree.sub_groups.iter().map(|sg| sg.status).collect();
        for group in tree.groups.iter_mut() {
            group.status = fold_worst(
                group
                    .sub_group_ids
                    .iter()
                    .filter_map(|sg| sub_group_statuses.get(sg.index()).copied()),
            );
        }

        let mut point_counts = BTreeMap::new();
        let mut conflicted_points = Vec::new();
        let mut required_points = Vec::new();
        for (point, status) in tree.points.iter().zip(point_statuses.iter()) {
            *point_counts.entry(*status).or_insert(0) += 1;
            match status {
                PointStatus::Conflicted => conflicted_points.push(point.id),
                PointStatus::Required => required_points.push(point.id),
                _ => {}
            }
        }

        let overall = fold_worst(tree.groups.iter().map(|g| g.status));
        debug!(
            %overall,
            conflicted = conflicted_points.len(),
            required = required_points.len(),
            "状态汇总完成"
        );

        StatusSummary {
            overall,
            point_counts,
            conflicted_points,
            required_points,
        }
    }
}

/// 取最差状态; 无子节点时为 UNVIEWED
fn fold_worst(statuses: impl Iterator<Item = PointStatus>) -> PointStatus {
    statuses.fold(PointStatus::Unviewed, PointStatus::worst)
}
