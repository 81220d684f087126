// ==========================================
// 住宅选配规则引擎 - 领域类型定义
// ==========================================
// 红线: 状态/类型一律为封闭枚举,禁止字符串比较与默认分支兜底
// 序列化格式: SCREAMING_SNAKE_CASE (与外部数据一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 枚举字符串解析失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("无法解析 {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ==========================================
// 选择基数 (Pick Type)
// ==========================================
// 约束一个决策点下可同时选中的选项数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickType {
    Pick1,       // 恰好一个
    Pick0or1,    // 零个或一个
    Pick1ormore, // 至少一个
    Pick0ormore, // 任意
}

impl PickType {
    /// 最少选中数量
    pub fn min(&self) -> usize {
        match self {
            PickType::Pick1 | PickType::Pick1ormore => 1,
            PickType::Pick0or1 | PickType::Pick0ormore => 0,
        }
    }

    /// 最多选中数量 (None = 不限)
    pub fn max(&self) -> Option<usize> {
        match self {
            PickType::Pick1 | PickType::Pick0or1 => Some(1),
            PickType::Pick1ormore | PickType::Pick0ormore => None,
        }
    }

    /// 是否为单选 (选中一个会替换同点其它选中)
    pub fn is_single(&self) -> bool {
        self.max() == Some(1)
    }

    /// 给定选中数量是否满足基数约束
    pub fn is_satisfied_by(&self, selected: usize) -> bool {
        selected >= self.min() && self.max().map_or(true, |max| selected <= max)
    }

    /// 给定选中数量是否超出上限
    pub fn exceeds_max(&self, selected: usize) -> bool {
        self.max().map_or(false, |max| selected > max)
    }
}

impl fmt::Display for PickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickType::Pick1 => write!(f, "PICK1"),
            PickType::Pick0or1 => write!(f, "PICK0OR1"),
            PickType::Pick1ormore => write!(f, "PICK1ORMORE"),
            PickType::Pick0ormore => write!(f, "PICK0ORMORE"),
        }
    }
}

impl FromStr for PickType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PICK1" => Ok(PickType::Pick1),
            "PICK0OR1" => Ok(PickType::Pick0or1),
            "PICK1ORMORE" => Ok(PickType::Pick1ormore),
            "PICK0ORMORE" => Ok(PickType::Pick0ormore),
            _ => Err(ParseEnumError::new("PickType", s)),
        }
    }
}

// ==========================================
// 决策点类别 (Point Kind)
// ==========================================
// 立面 / 配色方案点参与单调性冲突检测
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointKind {
    #[default]
    Standard,
    Elevation,
    ColorScheme,
}

// ==========================================
// 完成状态 (Point / SubGroup / Group Status)
// ==========================================
// 顺序即优先级: Unviewed < Viewed < Completed < PartiallyCompleted < Required < Conflicted
// 上层状态取子节点中优先级最高 ("最差") 者
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointStatus {
    Unviewed,
    Viewed,
    Completed,
    PartiallyCompleted,
    Required,
    Conflicted,
}

impl PointStatus {
    /// 取两者中更差的状态
    pub fn worst(self, other: PointStatus) -> PointStatus {
        self.max(other)
    }
}

impl fmt::Display for PointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointStatus::Unviewed => write!(f, "UNVIEWED"),
            PointStatus::Viewed => write!(f, "VIEWED"),
            PointStatus::Completed => write!(f, "COMPLETED"),
            PointStatus::PartiallyCompleted => write!(f, "PARTIALLY_COMPLETED"),
            PointStatus::Required => write!(f, "REQUIRED"),
            PointStatus::Conflicted => write!(f, "CONFLICTED"),
        }
    }
}

// ==========================================
// 规则子句类型 (Rule Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    MustHave,
    MustNotHave,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::MustHave => write!(f, "MUST_HAVE"),
            RuleKind::MustNotHave => write!(f, "MUST_NOT_HAVE"),
        }
    }
}

// ==========================================
// 变更单销售状态 (Sales Status)
// ==========================================
// 终态: Approved / Withdrawn / Resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesStatus {
    Pending,
    OutforSignature,
    Signed,
    Approved,
    Rejected,
    Withdrawn,
    Resolved,
}

impl SalesStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SalesStatus::Approved | SalesStatus::Withdrawn | SalesStatus::Resolved
        )
    }

    /// 单步可达的后继状态
    pub fn successors(&self) -> &'static [SalesStatus] {
        match self {
            SalesStatus::Pending => &[SalesStatus::OutforSignature, SalesStatus::Withdrawn],
            SalesStatus::OutforSignature => &[SalesStatus::Signed, SalesStatus::Pending],
            SalesStatus::Signed => &[SalesStatus::Approved, SalesStatus::Rejected],
            SalesStatus::Rejected => &[SalesStatus::Resolved, SalesStatus::Withdrawn],
            SalesStatus::Approved | SalesStatus::Withdrawn | SalesStatus::Resolved => &[],
        }
    }

    /// 是否可经若干步到达 target (不含自身)
    pub fn can_reach(&self, target: SalesStatus) -> bool {
        let mut visited = vec![*self];
        let mut frontier = vec![*self];
        while let Some(current) = frontier.pop() {
            for next in current.successors() {
                if *next == target {
                    return true;
                }
                if !visited.contains(next) {
                    visited.push(*next);
                    frontier.push(*next);
                }
            }
        }
        false
    }
}

impl fmt::Display for SalesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalesStatus::Pending => write!(f, "PENDING"),
            SalesStatus::OutforSignature => write!(f, "OUTFOR_SIGNATURE"),
            SalesStatus::Signed => write!(f, "SIGNED"),
            SalesStatus::Approved => write!(f, "APPROVED"),
            SalesStatus::Rejected => write!(f, "REJECTED"),
            SalesStatus::Withdrawn => write!(f, "WITHDRAWN"),
            SalesStatus::Resolved => write!(f, "RESOLVED"),
        }
    }
}

impl FromStr for SalesStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(SalesStatus::Pending),
            "OUTFOR_SIGNATURE" | "OUTFORSIGNATURE" => Ok(SalesStatus::OutforSignature),
            "SIGNED" => Ok(SalesStatus::Signed),
            "APPROVED" => Ok(SalesStatus::Approved),
            "REJECTED" => Ok(SalesStatus::Rejected),
            "WITHDRAWN" => Ok(SalesStatus::Withdrawn),
            "RESOLVED" => Ok(SalesStatus::Resolved),
            _ => Err(ParseEnumError::new("SalesStatus", s)),
        }
    }
}

// ==========================================
// 施工审批状态 (Construction Status)
// ==========================================
// 独立于销售状态,仅在销售审批通过后生效
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstructionStatus {
    #[default]
    NotApplicable,
    Pending,
    Approved,
}

impl fmt::Display for ConstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionStatus::NotApplicable => write!(f, "NOT_APPLICABLE"),
            ConstructionStatus::Pending => write!(f, "PENDING"),
            ConstructionStatus::Approved => write!(f, "APPROVED"),
        }
    }
}

// ==========================================
// 电子签名信封状态 (E-Sign Envelope State)
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeState {
    #[default]
    None,      // 无信封 (纸质签署)
    Draft,     // 已创建未发送 / 已作废待重发
    Sent,      // 已发出等待签署
    Completed, // 签署完成
}

impl fmt::Display for EnvelopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeState::None => write!(f, "NONE"),
            EnvelopeState::Draft => write!(f, "DRAFT"),
            EnvelopeState::Sent => write!(f, "SENT"),
            EnvelopeState::Completed => write!(f, "COMPLETED"),
        }
    }
}

// ==========================================
// 变更类型 (Change Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Plan,
    NonStandard,
    Construction,
    Sales,
    LotTransfer,
    PriceAdjustment,
}

impl ChangeType {
    /// 是否参与施工自动审批判定 (纯价格调整不影响施工)
    pub fn affects_construction(&self) -> bool {
        !matches!(self, ChangeType::PriceAdjustment)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Plan => write!(f, "PLAN"),
            ChangeType::NonStandard => write!(f, "NON_STANDARD"),
            ChangeType::Construction => write!(f, "CONSTRUCTION"),
            ChangeType::Sales => write!(f, "SALES"),
            ChangeType::LotTransfer => write!(f, "LOT_TRANSFER"),
            ChangeType::PriceAdjustment => write!(f, "PRICE_ADJUSTMENT"),
        }
    }
}

impl FromStr for ChangeType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLAN" => Ok(ChangeType::Plan),
            "NON_STANDARD" | "NONSTANDARD" => Ok(ChangeType::NonStandard),
            "CONSTRUCTION" => Ok(ChangeType::Construction),
            "SALES" => Ok(ChangeType::Sales),
            "LOT_TRANSFER" | "LOTTRANSFER" => Ok(ChangeType::LotTransfer),
            "PRICE_ADJUSTMENT" | "PRICEADJUSTMENT" => Ok(ChangeType::PriceAdjustment),
            _ => Err(ParseEnumError::new("ChangeType", s)),
        }
    }
}
