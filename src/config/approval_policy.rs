// ==========================================
// 住宅选配规则引擎 - 施工自动审批策略
// ==========================================
// 职责: 定义自动审批策略读取接口 (社区 × 变更类型)
// 红线: 只读,不含审批业务逻辑
// ==========================================

use crate::config::engine_config::ConfigError;
use crate::domain::types::ChangeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ApprovalPolicyReader Trait
// ==========================================
// 实现者: ApprovalPolicyTable (内存表) / 外部数据访问层
pub trait ApprovalPolicyReader: Send + Sync {
    /// 指定社区的某变更类型是否允许施工自动审批
    ///
    /// # 默认值
    /// - 未配置视为 false (需人工审批)
    fn is_auto_approvable(&self, community_id: i64, change_type: ChangeType) -> bool;
}

/// 策略表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicyEntry {
    pub community_id: i64,
    pub change_type: ChangeType,
    pub auto_approve: bool,
}

// ==========================================
// ApprovalPolicyTable - 内存策略表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ApprovalPolicyTable {
    entries: HashMap<(i64, ChangeType), bool>,
}

impl ApprovalPolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ApprovalPolicyEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.set(entry.community_id, entry.change_type, entry.auto_approve);
        }
        table
    }

    /// 从 JSON 数组解析 (`[{"community_id":1,"change_type":"SALES","auto_approve":true}]`)
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let entries: Vec<ApprovalPolicyEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(entries))
    }

    pub fn set(&mut self, community_id: i64, change_type: ChangeType, auto_approve: bool) {
        self.entries.insert((community_id, change_type), auto_approve);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ApprovalPolicyReader for ApprovalPolicyTable {
    fn is_auto_approvable(&self, community_id: i64, change_type: ChangeType) -> bool {
        self.entries
            .get(&(community_id, change_type))
            .copied()
            .unwrap_or(false)
    }
}
