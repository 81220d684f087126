// ==========================================
// 住宅选配规则引擎 - 变更单审批流程
// ==========================================
// 状态机: Pending → {OutforSignature, Withdrawn}
//         OutforSignature → {Signed, Pending}
//         Signed → {Approved, Rejected}
//         Rejected → {Resolved (重提), Withdrawn}
// 两阶段: request 只做校验; acknowledge 按服务端 (状态, 时间戳) 落地
// 红线: 每次被接受的迁移追加一条历史,时间戳只取自确认
// ==========================================

pub mod action_menu;
mod core;


pub use self::action_menu::{allowed_actions, ActionMenuKey};
pub use self::core::{
    next_suffix, sequence_position, AckOutcome, ChangeOrderWorkflow, TransitionAck,
    TransitionRequest, TransitionTarget,
};
