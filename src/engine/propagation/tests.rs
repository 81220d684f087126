use super::*;
use crate::domain::rules::{
    ChoiceRule, LotChoiceRule, OptionRule, OptionRuleChoice, PointRule, RuleClause, RuleStore,
};
use crate::domain::tree::{ChoiceId, ConfigTree, DisabledBy, PointId};
use crate::domain::types::{PickType, PointKind, RuleKind};
use crate::engine::error::EngineError;

// ==========================================
// 测试辅助函数
// ==========================================

/// 一个决策点, n 个 Choice
fn single_point_tree(pick: PickType, n: usize) -> (ConfigTree, PointId, Vec<ChoiceId>) {
    let mut tree = ConfigTree::new();
    let g = tree.add_group("Interior");
    let sg = tree.add_sub_group(g, "Kitchen").unwrap();
    let p = tree
        .add_point(sg, 10, "Countertop", pick, PointKind::Standard)
        .unwrap();
    let choices = (0..n)
        .map(|i| {
            tree.add_choice(p, 100 + i as i64, &format!("C{}", i), 100.0 * (i + 1) as f64)
                .unwrap()
        })
        .collect();
    (tree, p, choices)
}

/// n 个 Pick0or1 决策点, 每点一个 Choice
fn chain_tree(n: usize) -> (ConfigTree, Vec<PointId>, Vec<ChoiceId>) {
    let mut tree = ConfigTree::new();
    let g = tree.add_group("Structural");
    let sg = tree.add_sub_group(g, "Options").unwrap();
    let mut points = Vec::new();
    let mut choices = Vec::new();
    for i in 0..n {
        let p = tree
            .add_point(sg, i as i64, &format!("P{}", i), PickType::Pick0or1, PointKind::Standard)
            .unwrap();
        points.push(p);
        choices.push(tree.add_choice(p, 1000 + i as i64, &format!("C{}", i), 10.0).unwrap());
    }
    (tree, points, choices)
}

fn must_have(target: ChoiceId, choices: Vec<ChoiceId>) -> ChoiceRule {
    ChoiceRule {
        target,
        clauses: vec![RuleClause::must_have(choices, vec![])],
    }
}

fn select(tree: &mut ConfigTree, id: ChoiceId) {
    tree.choice_mut(id).unwrap().quantity = 1;
}

fn engine() -> RulePropagationEngine {
    RulePropagationEngine::default()
}

// ==========================================
// 基本规则语义
// ==========================================

#[test]
fn test_must_have_disables_until_dependency_selected() {
    let (mut tree, _, c) = chain_tree(2);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[1], vec![c[0]]));

    select(&mut tree, c[1]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(!out.tree.choices[c[1].index()].enabled);
    assert_eq!(
        out.tree.choices[c[1].index()].disabled_by,
        vec![DisabledBy::ChoiceRule {
            rule_index: 0,
            clause_index: 0
        }]
    );
    assert_eq!(out.delta.choices_disabled, vec![c[1]]);

    let mut tree = out.tree;
    select(&mut tree, c[0]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(out.tree.choices[c[1].index()].enabled);
    assert!(out.tree.choices[c[1].index()].disabled_by.is_empty());
    assert_eq!(out.delta.choices_enabled, vec![c[1]]);
}

#[test]
fn test_must_have_within_same_single_pick_point_never_satisfiable() {
    let (mut tree, _, c) = single_point_tree(PickType::Pick1, 2);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[1], vec![c[0]]));

    select(&mut tree, c[0]);
    select(&mut tree, c[1]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    // 归一化保留 c0, c1 被取消
    assert_eq!(out.delta.deselected, vec![c[1]]);
    assert_eq!(out.tree.choices[c[1].index()].quantity, 0);
    assert!(out.tree.choices[c[1].index()].enabled);
}

#[test]
fn test_must_not_have_disables_target() {
    let (mut tree, points, c) = chain_tree(3);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(ChoiceRule {
        target: c[0],
        clauses: vec![RuleClause::must_not_have(vec![c[1]], vec![points[2]])],
    });

    select(&mut tree, c[2]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(!out.tree.choices[c[0].index()].enabled);

    let mut tree = out.tree;
    tree.choice_mut(c[2]).unwrap().quantity = 0;
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(out.tree.choices[c[0].index()].enabled);
}

#[test]
fn test_point_rule_disables_point_and_its_choices() {
    let (mut tree, points, c) = chain_tree(2);
    let mut rules = RuleStore::default();
    rules.add_point_rule(PointRule {
        target: points[1],
        clauses: vec![RuleClause::must_have(vec![c[0]], vec![])],
    });

    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(!out.tree.points[points[1].index()].enabled);
    assert!(!out.tree.choices[c[1].index()].enabled);
    assert_eq!(
        out.tree.choices[c[1].index()].disabled_by,
        vec![DisabledBy::PointDisabled { point: points[1] }]
    );

    select(&mut tree, c[0]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(out.tree.points[points[1].index()].enabled);
    assert!(out.tree.choices[c[1].index()].enabled);
}

// ==========================================
// 不动点 / 收敛
// ==========================================

#[test]
fn test_transitive_chain_reaches_fixed_point() {
    let (mut tree, _, c) = chain_tree(3);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[0], vec![c[1]]));
    rules.add_choice_rule(must_have(c[1], vec![c[2]]));

    select(&mut tree, c[0]);
    select(&mut tree, c[1]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();

    assert!(out.converged());
    assert!(!out.tree.choices[c[1].index()].enabled);
    // c0 依赖的 c1 虽已选中但被禁用, 不视为生效选中
    assert!(!out.tree.choices[c[0].index()].enabled);
    assert_eq!(out.passes, 3);
}

#[test]
fn test_reapply_on_settled_tree_is_idempotent() {
    let (mut tree, _, c) = chain_tree(4);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[0], vec![c[1]]));
    rules.add_choice_rule(ChoiceRule {
        target: c[2],
        clauses: vec![RuleClause::must_not_have(vec![c[3]], vec![])],
    });
    select(&mut tree, c[0]);
    select(&mut tree, c[3]);

    let first = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    let second = engine()
        .apply(&first.tree, &rules, &PropagationOptions::default())
        .unwrap();

    assert!(second.delta.is_empty());
    assert_eq!(second.passes, 1);
    assert_eq!(
        serde_json::to_value(&first.tree).unwrap(),
        serde_json::to_value(&second.tree).unwrap()
    );
}

#[test]
fn test_self_exclusion_reports_rule_cycle() {
    let (mut tree, _, c) = chain_tree(1);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(ChoiceRule {
        target: c[0],
        clauses: vec![RuleClause::must_not_have(vec![c[0]], vec![])],
    });
    select(&mut tree, c[0]);

    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    let cycle = out.cycle.clone().expect("应检测到未收敛");
    assert_eq!(cycle.unstable_choices, vec![c[0]]);
    assert!(!out.tree.choices[c[0].index()].enabled);
    assert_eq!(
        out.tree.choices[c[0].index()].disabled_by,
        vec![DisabledBy::RuleCycle]
    );

    match out.ensure_converged() {
        Err(EngineError::RuleCycle {
            unstable_choices, ..
        }) => assert_eq!(unstable_choices, vec![c[0]]),
        other => panic!("期望 RuleCycle, 实际 {:?}", other.map(|o| o.passes)),
    }
}

#[test]
fn test_configured_max_passes_bounds_iteration() {
    let (mut tree, _, c) = chain_tree(3);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[0], vec![c[1]]));
    rules.add_choice_rule(must_have(c[1], vec![c[2]]));
    select(&mut tree, c[0]);
    select(&mut tree, c[1]);

    let options = PropagationOptions {
        lot_id: None,
        max_passes: Some(1),
    };
    let out = engine().apply(&tree, &rules, &options).unwrap();
    assert!(!out.converged());
    assert_eq!(out.passes, 1);
}

// ==========================================
// 地块规则 / 选件规则
// ==========================================

#[test]
fn test_lot_rules_apply_only_for_matching_lot() {
    let (tree, _, c) = single_point_tree(PickType::Pick1, 3);
    let mut rules = RuleStore::default();
    rules.add_lot_choice_rule(LotChoiceRule {
        lot_id: 42,
        choice: c[0],
        kind: RuleKind::MustNotHave,
    });
    rules.add_lot_choice_rule(LotChoiceRule {
        lot_id: 43,
        choice: c[1],
        kind: RuleKind::MustHave,
    });

    let none = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(none.tree.choices.iter().all(|ch| ch.enabled));

    let lot42 = engine()
        .apply(&tree, &rules, &PropagationOptions::for_lot(42))
        .unwrap();
    assert!(!lot42.tree.choices[c[0].index()].enabled);
    assert_eq!(
        lot42.tree.choices[c[0].index()].disabled_by,
        vec![DisabledBy::LotRule { lot_id: 42 }]
    );

    let lot43 = engine()
        .apply(&tree, &rules, &PropagationOptions::for_lot(43))
        .unwrap();
    assert!(!lot43.tree.choices[c[0].index()].enabled);
    assert!(lot43.tree.choices[c[1].index()].enabled);
    assert!(!lot43.tree.choices[c[2].index()].enabled);
}

#[test]
fn test_option_rule_adjusts_price_and_auto_selects() {
    let (mut tree, _, c) = chain_tree(2);
    let o = tree.add_option("Upgraded cabinets", 50.0, &[c[0]]).unwrap();
    let mut rules = RuleStore::default();
    rules.add_option_rule(OptionRule {
        option: o,
        target_choice: c[0],
        choices: vec![OptionRuleChoice {
            choice: c[1],
            must_have: true,
        }],
    });

    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert_eq!(out.tree.choices[c[0].index()].adjusted_price, 10.0);
    assert!(!out.tree.options[o.index()].selected);

    select(&mut tree, c[1]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert_eq!(out.tree.choices[c[0].index()].adjusted_price, 60.0);
    assert_eq!(out.delta.price_changed, vec![c[0]]);
    // 目标未选中, 选件不自动选中
    assert!(!out.tree.options[o.index()].selected);

    let mut tree = out.tree;
    select(&mut tree, c[0]);
    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(out.tree.options[o.index()].selected);
    assert_eq!(out.delta.options_selected, vec![o]);
}

// ==========================================
// 输入校验 / 纯函数性
// ==========================================

#[test]
fn test_unknown_rule_reference_is_error() {
    let (tree, _, c) = chain_tree(1);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[0], vec![ChoiceId(99)]));

    let result = engine().apply(&tree, &rules, &PropagationOptions::default());
    assert!(matches!(result, Err(EngineError::UnknownChoice(ChoiceId(99)))));
}

#[test]
fn test_input_tree_is_not_modified() {
    let (mut tree, _, c) = chain_tree(2);
    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(c[1], vec![c[0]]));
    select(&mut tree, c[1]);
    let snapshot = serde_json::to_value(&tree).unwrap();

    let out = engine()
        .apply(&tree, &rules, &PropagationOptions::default())
        .unwrap();
    assert!(!out.tree.choices[c[1].index()].enabled);
    assert_eq!(serde_json::to_value(&tree).unwrap(), snapshot);
}
