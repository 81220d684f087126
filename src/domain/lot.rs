// ==========================================
// 住宅选配规则引擎 - 地块与单调性规则
// ==========================================
// 单调性规则: 同一社区相邻地块不得重复相同立面/配色
// 规则按户型 (plan) 生效
// ==========================================

use serde::{Deserialize, Serialize};

/// 地块范围的排他映射
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotonyRule {
    pub plan_id: i64,
    /// 被排除的立面目录 ID
    #[serde(default)]
    pub elevation_choice_id: Option<i64>,
    /// 被排除的配色方案目录 ID
    #[serde(default)]
    pub color_scheme_choice_id: Option<i64>,
    /// 被排除的配色属性 ID 集合 (无独立配色点时按立面属性判定)
    #[serde(default)]
    pub excluded_color_attribute_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    #[serde(default)]
    pub community_id: i64,
    #[serde(default)]
    pub lot_block: String,
    #[serde(default)]
    pub monotony_rules: Vec<MonotonyRule>,
}

impl Lot {
    pub fn new(id: i64, community_id: i64) -> Self {
        Self {
            id,
            community_id,
            ..Default::default()
        }
    }

    /// 当前户型适用的单调性规则
    pub fn rules_for_plan(&self, plan_id: i64) -> impl Iterator<Item = &MonotonyRule> {
        self.monotony_rules
            .iter()
            .filter(move |r| r.plan_id == plan_id)
    }
}
