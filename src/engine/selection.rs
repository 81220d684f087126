// ==========================================
// 住宅选配规则引擎 - 选中操作
// ==========================================
// 职责: 修改选中数量 / 覆写备注 / 属性分配 / 浏览标记
// 红线: 不修改 enabled,启用状态只由规则传播推导
// 红线: 单选点 (Pick1 / Pick0or1) 选中新 Choice 时清空兄弟
// ==========================================

use crate::domain::tree::{AttributeAssignment, ChoiceId, ConfigTree, PointId};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 一次选中操作造成的变化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDelta {
    /// (choice, 旧数量, 新数量)
    pub quantity_changed: Vec<(ChoiceId, u32, u32)>,
    /// 因单选约束被清空的兄弟
    pub deselected_siblings: Vec<ChoiceId>,
    pub point_viewed: Option<PointId>,
}

impl SelectionDelta {
    pub fn is_empty(&self) -> bool {
        self.quantity_changed.is_empty()
            && self.deselected_siblings.is_empty()
            && self.point_viewed.is_none()
    }
}

/// 选中 Choice (quantity = 0 等价于取消选中)
///
/// # 参数
/// - quantity: 目标数量, 不得超过 max_quantity (未设置时上限为 1)
///
/// # 返回
/// - Err(InvalidQuantity): 数量越界
/// - Err(UnknownChoice): Choice 不存在
pub fn select_choice(
    tree: &mut ConfigTree,
    choice_id: ChoiceId,
    quantity: u32,
) -> EngineResult<SelectionDelta> {
    let choice = tree.choice(choice_id)?;
    let max = choice.max_quantity.unwrap_or(1);
    if quantity > max {
        return Err(EngineError::InvalidQuantity {
            choice: choice_id,
            quantity,
            max,
        });
    }
    let point_id = choice.point_id;
    let old_quantity = choice.quantity;

    let mut delta = SelectionDelta::default();

    if quantity > 0 && tree.point(point_id)?.pick_type.is_single() {
        for sibling in tree.siblings(choice_id)? {
            let sibling_choice = tree.choice_mut(sibling)?;
            if sibling_choice.is_selected() {
                delta
                    .quantity_changed
                    .push((sibling, sibling_choice.quantity, 0));
                sibling_choice.quantity = 0;
                delta.deselected_siblings.push(sibling);
            }
        }
    }

    let choice = tree.choice_mut(choice_id)?;
    choice.quantity = quantity;
    choice.viewed = true;
    if old_quantity != quantity {
        delta.quantity_changed.push((choice_id, old_quantity, quantity));
    }

    let point = tree.point_mut(point_id)?;
    if !point.viewed {
        point.viewed = true;
        delta.point_viewed = Some(point_id);
    }

    debug!(
        choice = %choice_id,
        old_quantity,
        quantity,
        deselected = delta.deselected_siblings.len(),
        "选中变更"
    );
    Ok(delta)
}

pub fn deselect_choice(tree: &mut ConfigTree, choice_id: ChoiceId) -> EngineResult<SelectionDelta> {
    select_choice(tree, choice_id, 0)
}

/// 设置人工覆写备注 (空白备注视为清除)
pub fn set_override_note(
    tree: &mut ConfigTree,
    choice_id: ChoiceId,
    note: &str,
) -> EngineResult<()> {
    let choice = tree.choice_mut(choice_id)?;
    let trimmed = note.trim();
    choice.override_note = if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    };
    Ok(())
}

pub fn clear_override_note(tree: &mut ConfigTree, choice_id: ChoiceId) -> EngineResult<()> {
    tree.choice_mut(choice_id)?.override_note = None;
    Ok(())
}

/// 替换 Choice 的属性/位置分配
///
/// 同一属性组的多条分配 (不同位置) 均保留
pub fn assign_attributes(
    tree: &mut ConfigTree,
    choice_id: ChoiceId,
    assignments: Vec<AttributeAssignment>,
) -> EngineResult<()> {
    let choice = tree.choice_mut(choice_id)?;
    choice.selected_attributes = assignments;
    Ok(())
}

pub fn mark_point_viewed(tree: &mut ConfigTree, point_id: PointId) -> EngineResult<bool> {
    let point = tree.point_mut(point_id)?;
    let changed = !point.viewed;
    point.viewed = true;
    Ok(changed)
}
