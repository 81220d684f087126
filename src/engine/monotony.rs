// ==========================================
// 住宅选配规则引擎 - 单调性冲突检测
// ==========================================
// 职责: 按地块 + 户型的排他规则检查立面 / 配色选择
// 规则:
// - 立面冲突: 立面目录 ID 命中规则的排除立面
// - 配色冲突: 配色目录 ID 命中规则的排除配色
// - 配色属性冲突: 无独立配色点时,立面的全部属性都在规则排除集内 (全部命中,非任一)
// 覆写: 冲突点内任一 Choice 带人工备注即抑制该冲突,备注清除后恢复
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::tree::{ChoiceId, ConfigTree, DecisionPoint};
use crate::domain::types::PointKind;
use crate::engine::error::EngineResult;
use crate::engine::selection::select_choice;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// 参与检测的一个选择
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotonySelection {
    pub catalog_id: i64,
    #[serde(default)]
    pub attribute_ids: Vec<i64>,
    /// 所在点已有人工覆写备注
    #[serde(default)]
    pub overridden: bool,
}

impl MonotonySelection {
    pub fn new(catalog_id: i64) -> Self {
        Self {
            catalog_id,
            attribute_ids: Vec::new(),
            overridden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotonyInput {
    pub plan_id: i64,
    pub elevation: Option<MonotonySelection>,
    pub color_scheme: Option<MonotonySelection>,
    /// 树中存在独立的配色决策点
    pub has_color_scheme_point: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotonyConflict {
    pub elevation_conflict: bool,
    pub color_scheme_conflict: bool,
    /// 配色冲突来自立面属性 (无独立配色点)
    pub color_scheme_attribute_conflict: bool,
}

impl MonotonyConflict {
    pub fn any(&self) -> bool {
        self.elevation_conflict || self.color_scheme_conflict
    }
}

/// 选中前的门禁结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gate", content = "conflict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionGate {
    Proceed,
    /// 调用方需先录入覆写备注
    OverrideRequired(MonotonyConflict),
}

// ==========================================
// MonotonyDetector
// ==========================================
pub struct MonotonyDetector;

impl MonotonyDetector {
    /// 纯函数检测
    pub fn check(lot: &Lot, input: &MonotonyInput) -> MonotonyConflict {
        let mut conflict = MonotonyConflict::default();

        if let Some(elevation) = input.elevation.as_ref().filter(|s| !s.overridden) {
            conflict.elevation_conflict = lot
                .rules_for_plan(input.plan_id)
                .any(|r| r.elevation_choice_id == Some(elevation.catalog_id));

            if !input.has_color_scheme_point && !elevation.attribute_ids.is_empty() {
                conflict.color_scheme_attribute_conflict =
                    lot.rules_for_plan(input.plan_id).any(|r| {
                        !r.excluded_color_attribute_ids.is_empty()
                            && elevation
                                .attribute_ids
                                .iter()
                                .all(|a| r.excluded_color_attribute_ids.contains(a))
                    });
            }
        }

        if let Some(scheme) = input.color_scheme.as_ref().filter(|s| !s.overridden) {
            conflict.color_scheme_conflict = lot
                .rules_for_plan(input.plan_id)
                .any(|r| r.color_scheme_choice_id == Some(scheme.catalog_id));
        }
        conflict.color_scheme_conflict |= conflict.color_scheme_attribute_conflict;

        conflict
    }

    /// 从选配树提取立面 / 配色选择后检测
    #[instrument(skip(tree, lot), fields(lot_id = lot.id))]
    pub fn evaluate_tree(tree: &ConfigTree, lot: &Lot, plan_id: i64) -> MonotonyConflict {
        let color_point = tree.points_of_kind(PointKind::ColorScheme).next();
        let input = MonotonyInput {
            plan_id,
            elevation: tree
                .points_of_kind(PointKind::Elevation)
                .next()
                .and_then(|p| selection_in(tree, p)),
            color_scheme: color_point.and_then(|p| selection_in(tree, p)),
            has_color_scheme_point: color_point.is_some(),
        };
        let conflict = Self::check(lot, &input);
        debug!(?input, ?conflict, "单调性检测");
        conflict
    }

    /// 模拟选中后检测, 决定是否需要覆写备注
    ///
    /// 非立面 / 配色点的 Choice 直接放行
    pub fn gate_selection(
        tree: &ConfigTree,
        lot: &Lot,
        plan_id: i64,
        choice_id: ChoiceId,
    ) -> EngineResult<SelectionGate> {
        let point_id = tree.choice(choice_id)?.point_id;
        if tree.point(point_id)?.kind == PointKind::Standard {
            return Ok(SelectionGate::Proceed);
        }

        let mut simulated = tree.clone();
        select_choice(&mut simulated, choice_id, 1)?;
        let conflict = Self::evaluate_tree(&simulated, lot, plan_id);
        Ok(if conflict.any() {
            SelectionGate::OverrideRequired(conflict)
        } else {
            SelectionGate::Proceed
        })
    }
}

/// 点内第一个选中的 Choice; 点内任一 Choice 有备注即视为已覆写
fn selection_in(tree: &ConfigTree, point: &DecisionPoint) -> Option<MonotonySelection> {
    let choices = || point.choice_ids.iter().filter_map(|c| tree.choices.get(c.index()));
    let selected = choices().find(|c| c.is_selected())?;
    Some(MonotonySelection {
        catalog_id: selected.catalog_id,
        attribute_ids: selected
            .selected_attributes
            .iter()
            .map(|a| a.attribute_id)
            .collect(),
        overridden: choices().any(|c| c.has_override()),
    })
}
