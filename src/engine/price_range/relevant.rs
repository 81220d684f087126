use crate::domain::rules::{RuleClause, RuleStore};
use crate::domain::tree::{ChoiceId, ConfigTree};
use crate::engine::error::EngineResult;
use std::collections::BTreeSet;

/// 计算目标 Choice 的相关集合
///
/// # 规则
/// - 从目标出发反向遍历规则图: 目标的 ChoiceRule / 所属点的 PointRule / 计入目标价格的 OptionRule
/// - 子句引用的决策点展开为点下全部 Choice
/// - 对新发现的 Choice 递归, visited 集合防环
///
/// # 返回
/// - 按 id 升序、不含目标自身的 Choice 列表
pub fn relevant_set(
    tree: &ConfigTree,
    rules: &RuleStore,
    target: ChoiceId,
) -> EngineResult<Vec<ChoiceId>> {
    tree.choice(target)?;

    let mut visited: BTreeSet<ChoiceId> = BTreeSet::new();
    visited.insert(target);
    let mut stack = vec![target];

    while let Some(current) = stack.pop() {
        for dependency in direct_dependencies(tree, rules, current)? {
            if visited.insert(dependency) {
                stack.push(dependency);
            }
        }
    }

    visited.remove(&target);
    Ok(visited.into_iter().collect())
}

fn direct_dependencies(
    tree: &ConfigTree,
    rules: &RuleStore,
    choice_id: ChoiceId,
) -> EngineResult<Vec<ChoiceId>> {
    let mut deps = Vec::new();
    let point_id = tree.choice(choice_id)?.point_id;

    for (_, rule) in rules.rules_for_choice(choice_id) {
        for clause in &rule.clauses {
            clause_choices(tree, clause, &mut deps)?;
        }
    }
    for (_, rule) in rules.rules_for_point(point_id) {
        for clause in &rule.clauses {
            clause_choices(tree, clause, &mut deps)?;
        }
    }
    for rule in rules.option_rules_for_choice(choice_id) {
        deps.extend(rule.choices.iter().map(|entry| entry.choice));
    }
    Ok(deps)
}

fn clause_choices(
    tree: &ConfigTree,
    clause: &RuleClause,
    deps: &mut Vec<ChoiceId>,
) -> EngineResult<()> {
    deps.extend(clause.choices.iter().copied());
    for point_id in &clause.points {
        deps.extend(tree.point(*point_id)?.choice_ids.iter().copied());
    }
    Ok(())
}
