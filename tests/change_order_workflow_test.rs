// ==========================================
// ChangeOrderWorkflow 集成测试
// ==========================================
// 覆盖: 动作菜单全表 / 签署到审批的完整流程 / 序列排队 / 驳回重提
// ==========================================


use home_config_engine::config::ApprovalPolicyTable;
use home_config_engine::domain::{
    ChangeOrderAction, ChangeOrderChoice, ChangeOrderGroup, ChoiceId, SequencePosition,
    SubChangeOrder,
};
use home_config_engine::engine::{
    allowed_actions, sequence_position, AckOutcome, ActionMenuKey, ChangeOrderWorkflow,
    TransitionAck, TransitionTarget,
};
use home_config_engine::{ChangeType, ConstructionStatus, EnvelopeState, SalesStatus};
use test_helpers::ts;
use uuid::Uuid;

const COMMUNITY: i64 = 7;
const JOB: i64 = 5501;

fn policy() -> ApprovalPolicyTable {
    ApprovalPolicyTable::from_json_str(
        r#"[
            {"community_id": 7, "change_type": "SALES", "auto_approve": true},
            {"community_id": 7, "change_type": "CONSTRUCTION", "auto_approve": false}
        ]"#,
    )
    .unwrap()
}

fn group(sequence: u32, change_type: ChangeType) -> ChangeOrderGroup {
    let mut group = ChangeOrderGroup::new(Uuid::new_v4(), JOB, COMMUNITY, sequence);
    let mut sub = SubChangeOrder::new(change_type);
    sub.choices.push(ChangeOrderChoice {
        choice_id: ChoiceId(12),
        quantity: 1,
        override_note: None,
    });
    group.change_orders.push(sub);
    group
}

// ==========================================
// 动作菜单
// ==========================================

#[test]
fn test_menu_is_deterministic_and_targets_are_reachable() {
    let sales = [
        SalesStatus::Pending,
        SalesStatus::OutforSignature,
        SalesStatus::Signed,
        SalesStatus::Approved,
        SalesStatus::Rejected,
        SalesStatus::Withdrawn,
        SalesStatus::Resolved,
    ];
    let construction = [
        ConstructionStatus::NotApplicable,
        ConstructionStatus::Pending,
        ConstructionStatus::Approved,
    ];
    let positions = [SequencePosition::Head, SequencePosition::Queued];
    let envelopes = [
        EnvelopeState::None,
        EnvelopeState::Draft,
        EnvelopeState::Sent,
        EnvelopeState::Completed,
    ];

    for s in sales {
        for c in construction {
            for p in positions {
                for e in envelopes {
                    let key = ActionMenuKey {
                        sales_status: s,
                        construction_status: c,
                        position: p,
                        envelope: e,
                    };
                    let menu = allowed_actions(key);
                    assert_eq!(menu, allowed_actions(key));
                    for action in menu {
                        if let Some(target) = action.target_status() {
                            assert!(s.can_reach(target), "{:?} -> {}", key, action);
                        }
                    }
                    if s.is_terminal() && c != ConstructionStatus::Pending {
                        assert!(menu.is_empty(), "{:?}", key);
                    }
                }
            }
        }
    }
}

// ==========================================
// 完整流程
// ==========================================

#[test]
fn test_envelope_signature_through_auto_approval() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut g = group(1, ChangeType::Sales);
    let position = sequence_position(&g, std::slice::from_ref(&g));
    assert_eq!(position, SequencePosition::Head);

    let request = wf
        .request(&g, ChangeOrderAction::SendForSignature, position)
        .unwrap();
    assert_eq!(
        request.target,
        TransitionTarget::Sales(SalesStatus::OutforSignature)
    );
    let ack = TransitionAck::sales(SalesStatus::OutforSignature, ts(1), "sales.rep")
        .with_envelope("env-7781");
    assert_eq!(wf.acknowledge(&mut g, ack).unwrap(), AckOutcome::Applied);
    assert_eq!(g.envelope_state(), EnvelopeState::Sent);
    // 信封未完成前不可标记已签
    assert_eq!(
        wf.available_actions(&g, position),
        &[ChangeOrderAction::CancelSignature]
    );

    // 签署平台回调
    let ack = TransitionAck::sales(SalesStatus::Signed, ts(4), "esign-callback");
    assert_eq!(wf.acknowledge(&mut g, ack).unwrap(), AckOutcome::Applied);
    assert_eq!(g.envelope_state(), EnvelopeState::Completed);
    assert_eq!(
        wf.available_actions(&g, position),
        &[ChangeOrderAction::Approve, ChangeOrderAction::Reject]
    );

    wf.request(&g, ChangeOrderAction::Approve, position).unwrap();
    let ack = TransitionAck::sales(SalesStatus::Approved, ts(9), "sales.manager");
    assert_eq!(wf.acknowledge(&mut g, ack).unwrap(), AckOutcome::Applied);

    assert_eq!(g.sales_status, SalesStatus::Approved);
    assert_eq!(g.construction_status, ConstructionStatus::Approved);
    assert_eq!(g.status_history.len(), 3);
    assert!(wf.available_actions(&g, position).is_empty());
}

#[test]
fn test_construction_change_waits_for_manual_approval() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut g = group(1, ChangeType::Sales);
    g.change_orders.push(SubChangeOrder::new(ChangeType::Construction));

    for (minute, status) in [
        (1, SalesStatus::OutforSignature),
        (2, SalesStatus::Signed),
        (3, SalesStatus::Approved),
    ] {
        let ack = TransitionAck::sales(status, ts(minute), "agent");
        assert_eq!(wf.acknowledge(&mut g, ack).unwrap(), AckOutcome::Applied);
    }
    assert_eq!(g.construction_status, ConstructionStatus::Pending);

    let request = wf
        .request(
            &g,
            ChangeOrderAction::ApproveConstruction,
            SequencePosition::Head,
        )
        .unwrap();
    assert_eq!(
        request.target,
        TransitionTarget::Construction(ConstructionStatus::Approved)
    );
    let ack = TransitionAck::construction(ConstructionStatus::Approved, ts(20), "construction.pm")
        .with_note("reviewed framing impact");
    assert_eq!(wf.acknowledge(&mut g, ack).unwrap(), AckOutcome::Applied);
    assert_eq!(g.construction_status, ConstructionStatus::Approved);
    assert_eq!(
        g.status_history.last().unwrap().note.as_deref(),
        Some("reviewed framing impact")
    );
}

#[test]
fn test_community_without_policy_requires_manual_approval() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut g = ChangeOrderGroup::new(Uuid::new_v4(), JOB, 99, 1);
    g.change_orders.push(SubChangeOrder::new(ChangeType::Sales));
    for (minute, status) in [
        (1, SalesStatus::OutforSignature),
        (2, SalesStatus::Signed),
        (3, SalesStatus::Approved),
    ] {
        wf.acknowledge(&mut g, TransitionAck::sales(status, ts(minute), "agent"))
            .unwrap();
    }
    assert_eq!(g.construction_status, ConstructionStatus::Pending);
}

// ==========================================
// 序列
// ==========================================

#[test]
fn test_queued_group_waits_for_head() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut first = group(1, ChangeType::Sales);
    let mut second = group(2, ChangeType::Sales);
    second.sales_status = SalesStatus::Signed;

    let all = vec![first.clone(), second.clone()];
    let position = sequence_position(&second, &all);
    assert_eq!(position, SequencePosition::Queued);
    assert_eq!(
        wf.available_actions(&second, position),
        &[ChangeOrderAction::Reject]
    );
    assert!(wf
        .request(&second, ChangeOrderAction::Approve, position)
        .is_err());

    let ack = TransitionAck::sales(SalesStatus::Withdrawn, ts(5), "buyer");
    assert_eq!(wf.acknowledge(&mut first, ack).unwrap(), AckOutcome::Applied);

    let all = vec![first, second.clone()];
    let position = sequence_position(&second, &all);
    assert_eq!(position, SequencePosition::Head);
    assert!(wf
        .available_actions(&second, position)
        .contains(&ChangeOrderAction::Approve));
}

#[test]
fn test_late_acknowledgement_is_superseded() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut g = group(1, ChangeType::Sales);
    wf.acknowledge(
        &mut g,
        TransitionAck::sales(SalesStatus::OutforSignature, ts(10), "agent"),
    )
    .unwrap();

    // 取消签署的确认晚到, 时间戳早于已记录迁移
    let stale = TransitionAck::sales(SalesStatus::Pending, ts(8), "agent");
    assert_eq!(
        wf.acknowledge(&mut g, stale).unwrap(),
        AckOutcome::Superseded
    );
    assert_eq!(g.sales_status, SalesStatus::OutforSignature);
    assert_eq!(g.status_history.len(), 1);
}

// ==========================================
// 驳回与重提
// ==========================================

#[test]
fn test_rejected_sequence_three_is_resubmitted_as_3a() {
    let wf = ChangeOrderWorkflow::new(policy());
    let mut rejected = group(3, ChangeType::Sales);
    for (minute, status) in [
        (1, SalesStatus::OutforSignature),
        (2, SalesStatus::Signed),
        (3, SalesStatus::Rejected),
    ] {
        wf.acknowledge(&mut rejected, TransitionAck::sales(status, ts(minute), "agent"))
            .unwrap();
    }
    wf.request(
        &rejected,
        ChangeOrderAction::Resubmit,
        SequencePosition::Head,
    )
    .unwrap();

    let next = wf
        .resubmit(
            &mut rejected,
            TransitionAck::sales(SalesStatus::Resolved, ts(6), "agent"),
            TransitionAck::sales(SalesStatus::Pending, ts(6), "agent"),
        )
        .unwrap();

    assert_eq!(rejected.sales_status, SalesStatus::Resolved);
    assert_eq!(rejected.status_history.len(), 4);
    assert_eq!(next.sales_status, SalesStatus::Pending);
    assert_eq!(next.display_number(), "3a");
    assert_ne!(next.id, rejected.id);
    assert_eq!(next.predecessor_id, Some(rejected.id));
    assert_eq!(next.change_orders, rejected.change_orders);
    assert_eq!(next.status_history.len(), 1);

    let all = vec![rejected.clone(), next.clone()];
    assert_eq!(sequence_position(&next, &all), SequencePosition::Head);
    assert!(rejected.sort_key() < next.sort_key());
}
