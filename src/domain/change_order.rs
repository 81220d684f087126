// ==========================================
// 住宅选配规则引擎 - 变更单领域模型
// ==========================================
// 红线: status_history 只追加,每次被接受的状态迁移恰好一条
// 红线: 时间戳来自外部持久化确认,本地不生成
// 排序: (sequence, suffix),同一序号每次重提 suffix 按字母递增
// ==========================================

use crate::domain::tree::ChoiceId;
use crate::domain::types::{ChangeType, ConstructionStatus, EnvelopeState, SalesStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// ChangeOrderAction - 用户可执行的操作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOrderAction {
    SendForSignature,
    CancelSignature,
    MarkSigned,
    Approve,
    Reject,
    Resubmit,
    Withdraw,
    ApproveConstruction,
}

impl ChangeOrderAction {
    /// 操作对应的目标销售状态 (ApproveConstruction 不改变销售状态)
    pub fn target_status(&self) -> Option<SalesStatus> {
        match self {
            ChangeOrderAction::SendForSignature => Some(SalesStatus::OutforSignature),
            ChangeOrderAction::CancelSignature => Some(SalesStatus::Pending),
            ChangeOrderAction::MarkSigned => Some(SalesStatus::Signed),
            ChangeOrderAction::Approve => Some(SalesStatus::Approved),
            ChangeOrderAction::Reject => Some(SalesStatus::Rejected),
            ChangeOrderAction::Resubmit => Some(SalesStatus::Resolved),
            ChangeOrderAction::Withdraw => Some(SalesStatus::Withdrawn),
            ChangeOrderAction::ApproveConstruction => None,
        }
    }
}

impl fmt::Display for ChangeOrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOrderAction::SendForSignature => write!(f, "SEND_FOR_SIGNATURE"),
            ChangeOrderAction::CancelSignature => write!(f, "CANCEL_SIGNATURE"),
            ChangeOrderAction::MarkSigned => write!(f, "MARK_SIGNED"),
            ChangeOrderAction::Approve => write!(f, "APPROVE"),
            ChangeOrderAction::Reject => write!(f, "REJECT"),
            ChangeOrderAction::Resubmit => write!(f, "RESUBMIT"),
            ChangeOrderAction::Withdraw => write!(f, "WITHDRAW"),
            ChangeOrderAction::ApproveConstruction => write!(f, "APPROVE_CONSTRUCTION"),
        }
    }
}

// ==========================================
// SequencePosition - 在有序变更单序列中的位置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequencePosition {
    /// 最早的未终结变更单
    Head,
    /// 排在 Head 之后
    Queued,
}

// ==========================================
// 子变更单
// ==========================================

/// 变更单中的一条选配变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOrderChoice {
    pub choice_id: ChoiceId,
    pub quantity: u32,
    #[serde(default)]
    pub override_note: Option<String>,
}

impl ChangeOrderChoice {
    pub fn has_override(&self) -> bool {
        self.override_note
            .as_deref()
            .map_or(false, |note| !note.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubChangeOrder {
    pub change_type: ChangeType,
    #[serde(default)]
    pub choices: Vec<ChangeOrderChoice>,
    /// 价格调整金额 (仅 PriceAdjustment 使用)
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SubChangeOrder {
    pub fn new(change_type: ChangeType) -> Self {
        Self {
            change_type,
            choices: Vec::new(),
            amount: None,
            description: None,
        }
    }
}

// ==========================================
// 状态历史 / 电子签名信封
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub sales_status: SalesStatus,
    pub construction_status: ConstructionStatus,
    /// 服务端确认时间戳
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRef {
    pub envelope_id: String,
    pub state: EnvelopeState,
}

// ==========================================
// ChangeOrderGroup - 变更单组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOrderGroup {
    pub id: Uuid,
    pub job_id: i64,
    pub community_id: i64,
    pub sales_status: SalesStatus,
    pub construction_status: ConstructionStatus,
    pub sequence: u32,
    #[serde(default)]
    pub suffix: Option<char>,
    #[serde(default)]
    pub change_orders: Vec<SubChangeOrder>,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default)]
    pub envelopes: Vec<EnvelopeRef>,
    /// 重提前的变更单 ID
    #[serde(default)]
    pub predecessor_id: Option<Uuid>,
}

impl ChangeOrderGroup {
    pub fn new(id: Uuid, job_id: i64, community_id: i64, sequence: u32) -> Self {
        Self {
            id,
            job_id,
            community_id,
            sales_status: SalesStatus::Pending,
            construction_status: ConstructionStatus::NotApplicable,
            sequence,
            suffix: None,
            change_orders: Vec::new(),
            status_history: Vec::new(),
            envelopes: Vec::new(),
            predecessor_id: None,
        }
    }

    /// 排序键: 序号优先, 同序号 None < 'a' < 'b' ...
    pub fn sort_key(&self) -> (u32, Option<char>) {
        (self.sequence, self.suffix)
    }

    /// 展示用编号, 如 "3", "3a"
    pub fn display_number(&self) -> String {
        match self.suffix {
            Some(s) => format!("{}{}", self.sequence, s),
            None => self.sequence.to_string(),
        }
    }

    /// 最近一个信封的状态
    pub fn envelope_state(&self) -> EnvelopeState {
        self.envelopes
            .last()
            .map_or(EnvelopeState::None, |e| e.state)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.status_history.last().map(|h| h.timestamp)
    }

    pub fn is_terminal(&self) -> bool {
        self.sales_status.is_terminal()
    }

    /// 是否有任一仍被选中 (数量 > 0) 的选配变更带覆写备注
    pub fn has_override_notes(&self) -> bool {
        self.change_orders
            .iter()
            .flat_map(|co| co.choices.iter())
            .any(|c| c.quantity > 0 && c.has_override())
    }

    /// 参与施工自动审批判定的变更类型 (去重, 有序)
    pub fn relevant_change_types(&self) -> Vec<ChangeType> {
        let mut types: Vec<ChangeType> = self
            .change_orders
            .iter()
            .map(|co| co.change_type)
            .filter(ChangeType::affects_construction)
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_orders_suffixes() {
        let mut a = ChangeOrderGroup::new(Uuid::new_v4(), 1, 1, 3);
        let mut b = a.clone();
        let c = ChangeOrderGroup::new(Uuid::new_v4(), 1, 1, 4);
        a.suffix = None;
        b.suffix = Some('a');
        assert!(a.sort_key() < b.sort_key());
        assert!(b.sort_key() < c.sort_key());
        assert_eq!(b.display_number(), "3a");
    }

    #[test]
    fn test_relevant_change_types_excludes_price_adjustment() {
        let mut group = ChangeOrderGroup::new(Uuid::new_v4(), 1, 1, 1);
        group
            .change_orders
            .push(SubChangeOrder::new(ChangeType::PriceAdjustment));
        group.change_orders.push(SubChangeOrder::new(ChangeType::Sales));
        group.change_orders.push(SubChangeOrder::new(ChangeType::Sales));
        assert_eq!(group.relevant_change_types(), vec![ChangeType::Sales]);
    }

    #[test]
    fn test_envelope_state_uses_latest() {
        let mut group = ChangeOrderGroup::new(Uuid::new_v4(), 1, 1, 1);
        assert_eq!(group.envelope_state(), EnvelopeState::None);
        group.envelopes.push(EnvelopeRef {
            envelope_id: "env-1".to_string(),
            state: EnvelopeState::Draft,
        });
        group.envelopes.push(EnvelopeRef {
            envelope_id: "env-2".to_string(),
            state: EnvelopeState::Sent,
        });
        assert_eq!(group.envelope_state(), EnvelopeState::Sent);
    }

    #[test]
    fn test_override_note_on_removed_choice_is_ignored() {
        let mut group = ChangeOrderGroup::new(Uuid::new_v4(), 1, 1, 1);
        let mut sub = SubChangeOrder::new(ChangeType::Sales);
        sub.choices.push(ChangeOrderChoice {
            choice_id: ChoiceId(4),
            quantity: 0,
            override_note: Some("monotony waived".to_string()),
        });
        group.change_orders.push(sub);
        assert!(!group.has_override_notes());

        group.change_orders[0].choices[0].quantity = 1;
        assert!(group.has_override_notes());
    }
}
