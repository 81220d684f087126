use super::action_menu::{allowed_actions, ActionMenuKey};
use crate::config::ApprovalPolicyReader;
use crate::domain::change_order::{
    ChangeOrderAction, ChangeOrderGroup, EnvelopeRef, SequencePosition, StatusHistoryEntry,
};
use crate::domain::types::{ConstructionStatus, EnvelopeState, SalesStatus};
use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 请求 / 确认
// ==========================================

/// 迁移目标: 销售状态或施工子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionTarget {
    Sales(SalesStatus),
    Construction(ConstructionStatus),
}

/// 已校验的迁移请求 (交由外部持久化执行)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub group_id: Uuid,
    pub action: ChangeOrderAction,
    pub from: SalesStatus,
    pub target: TransitionTarget,
}

/// 服务端确认
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionAck {
    pub target: TransitionTarget,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// 发起签署时服务端创建的信封
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TransitionAck {
    pub fn sales(status: SalesStatus, timestamp: DateTime<Utc>, actor: &str) -> Self {
        Self {
            target: TransitionTarget::Sales(status),
            timestamp,
            actor: actor.to_string(),
            envelope_id: None,
            note: None,
        }
    }

    pub fn construction(
        status: ConstructionStatus,
        timestamp: DateTime<Utc>,
        actor: &str,
    ) -> Self {
        Self {
            target: TransitionTarget::Construction(status),
            timestamp,
            actor: actor.to_string(),
            envelope_id: None,
            note: None,
        }
    }

    pub fn with_envelope(mut self, envelope_id: &str) -> Self {
        self.envelope_id = Some(envelope_id.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckOutcome {
    /// 已落地并追加历史
    Applied,
    /// 不晚于已记录的迁移且目标不同, 忽略
    Superseded,
    /// 与最后一条历史同一时间戳且状态相同, 忽略
    Duplicate,
}

// ==========================================
// 序列工具
// ==========================================

/// 计算变更单在同一 job 的有序序列中的位置
///
/// Head = 按 (sequence, suffix) 排序最早的未终结变更单
pub fn sequence_position(group: &ChangeOrderGroup, all: &[ChangeOrderGroup]) -> SequencePosition {
    let blocked = all.iter().any(|other| {
        other.id != group.id
            && other.job_id == group.job_id
            && !other.is_terminal()
            && other.sort_key() < group.sort_key()
    });
    if blocked {
        SequencePosition::Queued
    } else {
        SequencePosition::Head
    }
}

/// 重提后的后缀: None → 'a' → 'b' ... 'z' 之后报错
pub fn next_suffix(sequence: u32, suffix: Option<char>) -> EngineResult<char> {
    match suffix {
        None => Ok('a'),
        Some(c) if ('a'..'z').contains(&c) => Ok((c as u8 + 1) as char),
        Some(_) => Err(EngineError::SuffixExhausted { sequence }),
    }
}

// ==========================================
// ChangeOrderWorkflow - 变更单状态机
// ==========================================
pub struct ChangeOrderWorkflow<P: ApprovalPolicyReader> {
    policy: P,
}

impl<P: ApprovalPolicyReader> ChangeOrderWorkflow<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// 当前可执行的动作
    pub fn available_actions(
        &self,
        group: &ChangeOrderGroup,
        position: SequencePosition,
    ) -> &'static [ChangeOrderAction] {
        allowed_actions(ActionMenuKey::for_group(group, position))
    }

    /// 校验动作并生成迁移请求 (不修改变更单)
    ///
    /// # 返回
    /// - Err(InvalidTransition): 动作不在当前状态的菜单中
    #[instrument(skip(self, group), fields(group_id = %group.id, from = %group.sales_status))]
    pub fn request(
        &self,
        group: &ChangeOrderGroup,
        action: ChangeOrderAction,
        position: SequencePosition,
    ) -> EngineResult<TransitionRequest> {
        if !self.available_actions(group, position).contains(&action) {
            warn!(%action, ?position, "动作不在允许菜单中");
            return Err(EngineError::InvalidTransition {
                from: group.sales_status,
                action,
            });
        }

        let target = match action.target_status() {
            Some(status) => TransitionTarget::Sales(status),
            None => TransitionTarget::Construction(ConstructionStatus::Approved),
        };
        debug!(%action, ?target, "迁移请求已校验");

        Ok(TransitionRequest {
            group_id: group.id,
            action,
            from: group.sales_status,
            target,
        })
    }

    /// 落地服务端确认
    ///
    /// # 规则 (先比时间戳, 再比状态)
    /// 1. 时间戳早于最后一条历史 → Superseded
    /// 2. 时间戳等于最后一条历史: 目标与当前状态相同 → Duplicate, 否则 → Superseded
    /// 3. 更新的时间戳且目标与当前状态相同 → 只追加历史, 推进时间戳水位
    /// 4. 目标从当前状态不可达 → Err(UnreachableStatus)
    /// 5. 否则落地 (允许跳过未到达的中间确认), 追加一条历史
    #[instrument(skip(self, group, ack), fields(group_id = %group.id, target = ?ack.target))]
    pub fn acknowledge(
        &self,
        group: &mut ChangeOrderGroup,
        ack: TransitionAck,
    ) -> EngineResult<AckOutcome> {
        let is_current = match ack.target {
            TransitionTarget::Sales(status) => status == group.sales_status,
            TransitionTarget::Construction(status) => status == group.construction_status,
        };
        if let Some(last) = group.last_timestamp() {
            if ack.timestamp < last || (ack.timestamp == last && !is_current) {
                debug!(timestamp = %ack.timestamp, %last, "确认不晚于已记录迁移");
                return Ok(AckOutcome::Superseded);
            }
            if ack.timestamp == last {
                debug!("重复确认");
                return Ok(AckOutcome::Duplicate);
            }
        }

        if is_current {
            // 状态未变也留痕: 推进时间戳水位
            debug!(timestamp = %ack.timestamp, "状态未变, 仅推进时间戳");
        } else {
            match ack.target {
                TransitionTarget::Sales(status) => self.apply_sales(group, status, &ack)?,
                TransitionTarget::Construction(status) => {
                    apply_construction(group, status)?;
                }
            }
        }

        group.status_history.push(StatusHistoryEntry {
            sales_status: group.sales_status,
            construction_status: group.construction_status,
            timestamp: ack.timestamp,
            actor: ack.actor,
            note: ack.note,
        });

        info!(
            sales_status = %group.sales_status,
            construction_status = %group.construction_status,
            "变更单状态已更新"
        );
        Ok(AckOutcome::Applied)
    }

    /// 重提被驳回的变更单
    ///
    /// # 流程
    /// 1. 原变更单 → Resolved (resolved_ack)
    /// 2. 新建 Pending 变更单: 新 ID, 同序号, 下一后缀, 复制变更内容 (pending_ack)
    ///
    /// # 返回
    /// - Err(InvalidTransition): 原变更单不是 Rejected, 或确认目标不匹配
    /// - Err(SuffixExhausted): 后缀超过 'z'
    #[instrument(skip(self, rejected, resolved_ack, pending_ack), fields(group_id = %rejected.id))]
    pub fn resubmit(
        &self,
        rejected: &mut ChangeOrderGroup,
        resolved_ack: TransitionAck,
        pending_ack: TransitionAck,
    ) -> EngineResult<ChangeOrderGroup> {
        let invalid = EngineError::InvalidTransition {
            from: rejected.sales_status,
            action: ChangeOrderAction::Resubmit,
        };
        if rejected.sales_status != SalesStatus::Rejected
            || resolved_ack.target != TransitionTarget::Sales(SalesStatus::Resolved)
            || pending_ack.target != TransitionTarget::Sales(SalesStatus::Pending)
        {
            return Err(invalid);
        }
        // 先算后缀, 失败时原变更单不动
        let suffix = next_suffix(rejected.sequence, rejected.suffix)?;

        if self.acknowledge(rejected, resolved_ack)? != AckOutcome::Applied {
            return Err(invalid);
        }

        let mut next = ChangeOrderGroup::new(
            Uuid::new_v4(),
            rejected.job_id,
            rejected.community_id,
            rejected.sequence,
        );
        next.suffix = Some(suffix);
        next.change_orders = rejected.change_orders.clone();
        next.predecessor_id = Some(rejected.id);
        next.status_history.push(StatusHistoryEntry {
            sales_status: SalesStatus::Pending,
            construction_status: next.construction_status,
            timestamp: pending_ack.timestamp,
            actor: pending_ack.actor,
            note: pending_ack.note,
        });

        info!(
            predecessor = %rejected.id,
            new_group = %next.id,
            number = %next.display_number(),
            "变更单已重提"
        );
        Ok(next)
    }

    fn apply_sales(
        &self,
        group: &mut ChangeOrderGroup,
        status: SalesStatus,
        ack: &TransitionAck,
    ) -> EngineResult<()> {
        if !group.sales_status.can_reach(status) {
            return Err(EngineError::UnreachableStatus {
                from: group.sales_status,
                to: status,
            });
        }

        match status {
            SalesStatus::OutforSignature => match &ack.envelope_id {
                Some(id) => group.envelopes.push(EnvelopeRef {
                    envelope_id: id.clone(),
                    state: EnvelopeState::Sent,
                }),
                None => set_latest_envelope(group, EnvelopeState::Sent),
            },
            // 撤回签署: 信封退回草稿
            SalesStatus::Pending => set_latest_envelope(group, EnvelopeState::Draft),
            SalesStatus::Signed => set_latest_envelope(group, EnvelopeState::Completed),
            SalesStatus::Approved => {
                group.construction_status = self.construction_on_approval(group);
            }
            SalesStatus::Rejected | SalesStatus::Withdrawn | SalesStatus::Resolved => {}
        }
        group.sales_status = status;
        Ok(())
    }

    /// 审批时的施工子状态: 无覆写备注且所有相关变更类型均可自动审批 → Approved
    fn construction_on_approval(&self, group: &ChangeOrderGroup) -> ConstructionStatus {
        let overridden = group.has_override_notes();
        let manual_types: Vec<_> = group
            .relevant_change_types()
            .into_iter()
            .filter(|t| !self.policy.is_auto_approvable(group.community_id, *t))
            .collect();

        if overridden || !manual_types.is_empty() {
            debug!(overridden, ?manual_types, "施工需人工审批");
            ConstructionStatus::Pending
        } else {
            ConstructionStatus::Approved
        }
    }
}

fn apply_construction(group: &mut ChangeOrderGroup, status: ConstructionStatus) -> EngineResult<()> {
    let allowed = group.sales_status == SalesStatus::Approved
        && group.construction_status == ConstructionStatus::Pending
        && status == ConstructionStatus::Approved;
    if !allowed {
        return Err(EngineError::InvalidTransition {
            from: group.sales_status,
            action: ChangeOrderAction::ApproveConstruction,
        });
    }
    group.construction_status = status;
    Ok(())
}

fn set_latest_envelope(group: &mut ChangeOrderGroup, state: EnvelopeState) {
    if let Some(envelope) = group.envelopes.last_mut() {
        envelope.state = state;
    }
}
