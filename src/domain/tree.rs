// ==========================================
// 住宅选配规则引擎 - 选配树领域模型
// ==========================================
// 结构: Group → SubGroup → DecisionPoint → Choice, Option 挂接于 Choice
// 存储: 扁平 arena + 整数 id 寻址 (拷贝工作副本成本低)
// 红线: Choice.enabled 只由规则传播写入,选中操作不得直接修改
// ==========================================

use crate::domain::types::{PickType, PointKind, PointStatus};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 节点 ID (arena 下标)
// ==========================================
macro_rules! node_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

node_id!(GroupId, "G");
node_id!(SubGroupId, "SG");
node_id!(PointId, "P");
node_id!(ChoiceId, "C");
node_id!(OptionId, "O");

// ==========================================
// DisabledBy - 禁用原因 (诊断用)
// ==========================================
// 红线: 每条禁用必须能追溯到具体规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisabledBy {
    /// 选项规则的某条子句未满足
    ChoiceRule { rule_index: usize, clause_index: usize },
    /// 决策点规则的某条子句未满足 (用于 Point.disabled_by)
    PointRule { rule_index: usize, clause_index: usize },
    /// 地块规则禁止
    LotRule { lot_id: i64 },
    /// 所属决策点被禁用
    PointDisabled { point: PointId },
    /// 规则图未收敛,默认禁用
    RuleCycle,
}

impl fmt::Display for DisabledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledBy::ChoiceRule {
                rule_index,
                clause_index,
            } => write!(f, "CHOICE_RULE[{}].clause[{}]", rule_index, clause_index),
            DisabledBy::PointRule {
                rule_index,
                clause_index,
            } => write!(f, "POINT_RULE[{}].clause[{}]", rule_index, clause_index),
            DisabledBy::LotRule { lot_id } => write!(f, "LOT_RULE(lot={})", lot_id),
            DisabledBy::PointDisabled { point } => write!(f, "POINT_DISABLED({})", point),
            DisabledBy::RuleCycle => write!(f, "RULE_CYCLE"),
        }
    }
}

// ==========================================
// AttributeAssignment - 属性/位置选择
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub attribute_group_id: i64,
    pub attribute_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
}

// ==========================================
// 树节点
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub label: String,
    pub sub_group_ids: Vec<SubGroupId>,
    pub status: PointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGroup {
    pub id: SubGroupId,
    pub group_id: GroupId,
    pub label: String,
    pub point_ids: Vec<PointId>,
    pub status: PointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPoint {
    pub id: PointId,
    pub sub_group_id: SubGroupId,
    pub catalog_id: i64,
    pub label: String,
    pub pick_type: PickType,
    #[serde(default)]
    pub kind: PointKind,
    pub choice_ids: Vec<ChoiceId>,
    pub enabled: bool,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default)]
    pub disabled_by: Vec<DisabledBy>,
    pub status: PointStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub point_id: PointId,
    /// 目录 ID (单调性规则按此匹配)
    pub catalog_id: i64,
    pub label: String,
    /// 0 = 未选中, >0 = 选中数量
    pub quantity: u32,
    #[serde(default)]
    pub max_quantity: Option<u32>,
    pub enabled: bool,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default)]
    pub completed: bool,
    /// 基础价格
    pub price: f64,
    /// 规则调整后价格 (基础价格 + 生效的规则选件)
    pub adjusted_price: f64,
    #[serde(default)]
    pub option_ids: Vec<OptionId>,
    /// 需要选择属性/位置的属性组
    #[serde(default)]
    pub attribute_groups: Vec<i64>,
    #[serde(default)]
    pub selected_attributes: Vec<AttributeAssignment>,
    /// 人工覆写备注 (单调性冲突 / 自动审批判定)
    #[serde(default)]
    pub override_note: Option<String>,
    #[serde(default)]
    pub disabled_by: Vec<DisabledBy>,
}

impl Choice {
    pub fn is_selected(&self) -> bool {
        self.quantity > 0
    }

    /// 每个必需属性组均已有选择
    pub fn attributes_complete(&self) -> bool {
        self.attribute_groups.iter().all(|group| {
            self.selected_attributes
                .iter()
                .any(|a| a.attribute_group_id == *group)
        })
    }

    pub fn has_override(&self) -> bool {
        self.override_note
            .as_deref()
            .map_or(false, |note| !note.trim().is_empty())
    }
}

/// 可挂接到一个或多个 Choice 的计价目录项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: OptionId,
    pub label: String,
    pub price: f64,
    pub choice_ids: Vec<ChoiceId>,
    /// 由选件规则自动选中
    #[serde(default)]
    pub selected: bool,
}

// ==========================================
// ConfigTree - 选配树 arena
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigTree {
    pub tree_version_id: Option<String>,
    pub groups: Vec<Group>,
    pub sub_groups: Vec<SubGroup>,
    pub points: Vec<DecisionPoint>,
    pub choices: Vec<Choice>,
    pub options: Vec<CatalogOption>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== 构建 =====

    pub fn add_group(&mut self, label: &str) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(Group {
            id,
            label: label.to_string(),
            sub_group_ids: Vec::new(),
            status: PointStatus::Unviewed,
        });
        id
    }

    pub fn add_sub_group(&mut self, group_id: GroupId, label: &str) -> EngineResult<SubGroupId> {
        let id = SubGroupId(self.sub_groups.len() as u32);
        self.groups
            .get_mut(group_id.index())
            .ok_or(EngineError::UnknownGroup(group_id))?
            .sub_group_ids
            .push(id);
        self.sub_groups.push(SubGroup {
            id,
            group_id,
            label: label.to_string(),
            point_ids: Vec::new(),
            status: PointStatus::Unviewed,
        });
        Ok(id)
    }

    pub fn add_point(
        &mut self,
        sub_group_id: SubGroupId,
        catalog_id: i64,
        label: &str,
        pick_type: PickType,
        kind: PointKind,
    ) -> EngineResult<PointId> {
        let id = PointId(self.points.len() as u32);
        self.sub_groups
            .get_mut(sub_group_id.index())
            .ok_or(EngineError::UnknownSubGroup(sub_group_id))?
            .point_ids
            .push(id);
        self.points.push(DecisionPoint {
            id,
            sub_group_id,
            catalog_id,
            label: label.to_string(),
            pick_type,
            kind,
            choice_ids: Vec::new(),
            enabled: true,
            viewed: false,
            disabled_by: Vec::new(),
            status: PointStatus::Unviewed,
        });
        Ok(id)
    }

    pub fn add_choice(
        &mut self,
        point_id: PointId,
        catalog_id: i64,
        label: &str,
        price: f64,
    ) -> EngineResult<ChoiceId> {
        let id = ChoiceId(self.choices.len() as u32);
        self.point_mut(point_id)?.choice_ids.push(id);
        self.choices.push(Choice {
            id,
            point_id,
            catalog_id,
            label: label.to_string(),
            quantity: 0,
            max_quantity: None,
            enabled: true,
            viewed: false,
            completed: false,
            price,
            adjusted_price: price,
            option_ids: Vec::new(),
            attribute_groups: Vec::new(),
            selected_attributes: Vec::new(),
            override_note: None,
            disabled_by: Vec::new(),
        });
        Ok(id)
    }

    pub fn add_option(
        &mut self,
        label: &str,
        price: f64,
        choice_ids: &[ChoiceId],
    ) -> EngineResult<OptionId> {
        let id = OptionId(self.options.len() as u32);
        for choice_id in choice_ids {
            self.choice_mut(*choice_id)?.option_ids.push(id);
        }
        self.options.push(CatalogOption {
            id,
            label: label.to_string(),
            price,
            choice_ids: choice_ids.to_vec(),
            selected: false,
        });
        Ok(id)
    }

    // ===== 完整性 =====

    /// 校验 arena 引用一致性 (外部 JSON 载入的树必须先通过)
    ///
    /// - 每个节点的 id 等于其下标
    /// - 父子引用双向一致, 所有引用 id 都在范围内
    ///
    /// 首个不一致处以对应的 Unknown* 错误返回
    pub fn validate(&self) -> EngineResult<()> {
        for (i, group) in self.groups.iter().enumerate() {
            if group.id.index() != i {
                return Err(EngineError::UnknownGroup(group.id));
            }
            for sg in &group.sub_group_ids {
                match self.sub_groups.get(sg.index()) {
                    Some(sub_group) if sub_group.group_id == group.id => {}
                    _ => return Err(EngineError::UnknownSubGroup(*sg)),
                }
            }
        }

        for (i, sub_group) in self.sub_groups.iter().enumerate() {
            if sub_group.id.index() != i {
                return Err(EngineError::UnknownSubGroup(sub_group.id));
            }
            if self.groups.get(sub_group.group_id.index()).is_none() {
                return Err(EngineError::UnknownGroup(sub_group.group_id));
            }
            for p in &sub_group.point_ids {
                match self.points.get(p.index()) {
                    Some(point) if point.sub_group_id == sub_group.id => {}
                    _ => return Err(EngineError::UnknownPoint(*p)),
                }
            }
        }

        for (i, point) in self.points.iter().enumerate() {
            if point.id.index() != i {
                return Err(EngineError::UnknownPoint(point.id));
            }
            match self.sub_groups.get(point.sub_group_id.index()) {
                Some(sub_group) if sub_group.point_ids.contains(&point.id) => {}
                _ => return Err(EngineError::UnknownSubGroup(point.sub_group_id)),
            }
            for c in &point.choice_ids {
                match self.choices.get(c.index()) {
                    Some(choice) if choice.point_id == point.id => {}
                    _ => return Err(EngineError::UnknownChoice(*c)),
                }
            }
        }

        for (i, choice) in self.choices.iter().enumerate() {
            if choice.id.index() != i {
                return Err(EngineError::UnknownChoice(choice.id));
            }
            match self.points.get(choice.point_id.index()) {
                Some(point) if point.choice_ids.contains(&choice.id) => {}
                _ => return Err(EngineError::UnknownPoint(choice.point_id)),
            }
            if let Some(o) = choice
                .option_ids
                .iter()
                .find(|o| self.options.get(o.index()).is_none())
            {
                return Err(EngineError::UnknownOption(*o));
            }
        }

        for (i, option) in self.options.iter().enumerate() {
            if option.id.index() != i {
                return Err(EngineError::UnknownOption(option.id));
            }
            if let Some(c) = option
                .choice_ids
                .iter()
                .find(|c| self.choices.get(c.index()).is_none())
            {
                return Err(EngineError::UnknownChoice(*c));
            }
        }
        Ok(())
    }

    // ===== 访问 =====

    pub fn choice(&self, id: ChoiceId) -> EngineResult<&Choice> {
        self.choices
            .get(id.index())
            .ok_or(EngineError::UnknownChoice(id))
    }

    pub fn choice_mut(&mut self, id: ChoiceId) -> EngineResult<&mut Choice> {
        self.choices
            .get_mut(id.index())
            .ok_or(EngineError::UnknownChoice(id))
    }

    pub fn point(&self, id: PointId) -> EngineResult<&DecisionPoint> {
        self.points.get(id.index()).ok_or(EngineError::UnknownPoint(id))
    }

    pub fn point_mut(&mut self, id: PointId) -> EngineResult<&mut DecisionPoint> {
        self.points
            .get_mut(id.index())
            .ok_or(EngineError::UnknownPoint(id))
    }

    pub fn option(&self, id: OptionId) -> EngineResult<&CatalogOption> {
        self.options
            .get(id.index())
            .ok_or(EngineError::UnknownOption(id))
    }

    /// 同一决策点下的其它 Choice
    pub fn siblings(&self, id: ChoiceId) -> EngineResult<Vec<ChoiceId>> {
        let point_id = self.choice(id)?.point_id;
        Ok(self
            .point(point_id)?
            .choice_ids
            .iter()
            .copied()
            .filter(|c| *c != id)
            .collect())
    }

    /// 决策点下已选中 (quantity>0) 的 Choice 数量
    pub fn selected_count(&self, point_id: PointId) -> EngineResult<usize> {
        let point = self.point(point_id)?;
        Ok(point
            .choice_ids
            .iter()
            .filter(|c| self.choices.get(c.index()).map_or(false, Choice::is_selected))
            .count())
    }

    /// 当前生效选中: 已选中 + 自身启用 + 所属点启用
    pub fn is_effectively_selected(&self, id: ChoiceId) -> bool {
        self.choices.get(id.index()).map_or(false, |c| {
            c.is_selected()
                && c.enabled
                && self
                    .points
                    .get(c.point_id.index())
                    .map_or(false, |p| p.enabled)
        })
    }

    /// 决策点是否有生效选中
    pub fn is_point_effectively_selected(&self, id: PointId) -> bool {
        self.points.get(id.index()).map_or(false, |p| {
            p.choice_ids.iter().any(|c| self.is_effectively_selected(*c))
        })
    }

    pub fn points_of_kind(&self, kind: PointKind) -> impl Iterator<Item = &DecisionPoint> {
        self.points.iter().filter(move |p| p.kind == kind)
    }

    /// 当前选中合计价 (按调整后价格 × 数量)
    pub fn selections_total(&self) -> f64 {
        self.choices
            .iter()
            .filter(|c| c.is_selected())
            .map(|c| c.adjusted_price * f64::from(c.quantity))
            .sum()
    }
}
