// ==========================================
// 住宅选配规则引擎 - 价格区间枚举引擎
// ==========================================
// 职责: 对目标 Choice 的相关集合做选中/未选中全组合枚举,求可达的 [min, max] 价格
// 复杂度: O(2^n),n 为相关集合规模
// 红线: 必须受 max_permutations 上限约束,超限返回近似区间
// ==========================================

mod core;
mod relevant;


pub use self::core::{PriceRange, PriceRangeEnumerator, PriceRangeReport};
pub use self::relevant::relevant_set;
