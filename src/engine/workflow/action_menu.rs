use crate::domain::change_order::{ChangeOrderAction, ChangeOrderGroup, SequencePosition};
use crate::domain::types::{ConstructionStatus, EnvelopeState, SalesStatus};
use serde::{Deserialize, Serialize};

/// 动作菜单查表键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionMenuKey {
    pub sales_status: SalesStatus,
    pub construction_status: ConstructionStatus,
    pub position: SequencePosition,
    pub envelope: EnvelopeState,
}

impl ActionMenuKey {
    pub fn for_group(group: &ChangeOrderGroup, position: SequencePosition) -> Self {
        Self {
            sales_status: group.sales_status,
            construction_status: group.construction_status,
            position,
            envelope: group.envelope_state(),
        }
    }
}

/// 允许的用户动作 (纯查表)
///
/// # 规则
/// - 只有序列 Head 可发起签署 / 审批, 排队中的变更单只能撤回或驳回
/// - 签署中: 信封已完成 (或线下签署, 无信封) 才可标记已签
/// - 已审批且施工待审: 仅可人工施工审批
pub fn allowed_actions(key: ActionMenuKey) -> &'static [ChangeOrderAction] {
    use ChangeOrderAction::*;
    use EnvelopeState as Env;
    use SequencePosition::*;

    match (key.sales_status, key.position, key.envelope) {
        (SalesStatus::Pending, Head, Env::None | Env::Draft) => &[SendForSignature, Withdraw],
        (SalesStatus::Pending, _, _) => &[Withdraw],

        (SalesStatus::OutforSignature, _, Env::Completed | Env::None) => {
            &[MarkSigned, CancelSignature]
        }
        (SalesStatus::OutforSignature, _, _) => &[CancelSignature],

        (SalesStatus::Signed, Head, _) => &[Approve, Reject],
        (SalesStatus::Signed, Queued, _) => &[Reject],

        (SalesStatus::Rejected, _, _) => &[Resubmit, Withdraw],

        (SalesStatus::Approved, _, _) => match key.construction_status {
            ConstructionStatus::Pending => &[ApproveConstruction],
            ConstructionStatus::NotApplicable | ConstructionStatus::Approved => &[],
        },

        (SalesStatus::Withdrawn | SalesStatus::Resolved, _, _) => &[],
    }
}
