// ==========================================
// ConfigSession 集成测试
// ==========================================
// 覆盖: 选中 → 传播 → 状态汇总 / 原子提交 / 地块规则 / 配置文件
// ==========================================


use home_config_engine::config::EngineConfig;
use home_config_engine::domain::{DisabledBy, LotChoiceRule, RuleStore};
use home_config_engine::engine::{ConfigSession, EngineError};
use home_config_engine::{logging, ChoiceId, Lot, PickType, PointStatus, RuleKind};
use std::io::Write;
use test_helpers::{must_have, option_when, TreeBuilder};

struct Kitchen {
    session: ConfigSession,
    laminate: ChoiceId,
    quartz: ChoiceId,
    waterfall: ChoiceId,
    pendants: ChoiceId,
}

/// 台面 (Pick1) + 台面升级 (Pick0or1, 依赖石英) + 灯具 (Pick0ormore)
fn kitchen(config: EngineConfig) -> Kitchen {
    let mut b = TreeBuilder::new();
    let counters = b.point("Countertops", PickType::Pick1);
    let laminate = b.choice(counters, "Laminate", 0.0);
    let quartz = b.choice(counters, "Quartz", 4200.0);
    b.sub_group("Upgrades");
    let edge = b.point("Island edge", PickType::Pick0or1);
    let waterfall = b.choice(edge, "Waterfall edge", 2600.0);
    let lights = b.point("Lighting", PickType::Pick0ormore);
    let pendants = b.choice(lights, "Pendants", 650.0);
    let sealing = b.option("Stone sealing", 180.0, &[waterfall]);
    let tree = b.build();

    let mut rules = RuleStore::default();
    rules.add_choice_rule(must_have(waterfall, vec![quartz]));
    rules.add_option_rule(option_when(sealing, waterfall, quartz));

    Kitchen {
        session: ConfigSession::new(tree, rules, config).unwrap(),
        laminate,
        quartz,
        waterfall,
        pendants,
    }
}

#[test]
fn test_new_session_reports_required_points() {
    logging::init_test();
    let k = kitchen(EngineConfig::default());
    let tree = k.session.tree();
    let counters = tree.choices[k.quartz.index()].point_id;

    assert_eq!(tree.points[counters.index()].status, PointStatus::Required);
    // 无选中时石英依赖不满足, 升级被禁用
    assert!(!tree.choices[k.waterfall.index()].enabled);
    assert_eq!(tree.groups[0].status, PointStatus::Required);
}

#[test]
fn test_selection_pipeline_resolves_dependencies() {
    let mut k = kitchen(EngineConfig::default());

    // 先选升级: 依赖未满足, 所在点冲突
    let update = k.session.select(k.waterfall, 1).unwrap();
    assert_eq!(update.status.overall, PointStatus::Conflicted);
    let edge = k.session.tree().choices[k.waterfall.index()].point_id;
    assert!(update.status.conflicted_points.contains(&edge));

    k.session.select(k.laminate, 1).unwrap();
    let update = k.session.select(k.quartz, 1).unwrap();
    assert_eq!(update.selection.deselected_siblings, vec![k.laminate]);
    assert!(update.propagation.choices_enabled.contains(&k.waterfall));
    assert!(update.status.is_complete());
    assert!(update.cycle.is_none());

    let tree = k.session.tree();
    let waterfall = &tree.choices[k.waterfall.index()];
    assert!(waterfall.enabled && waterfall.completed);
    // 选件随石英生效
    assert_eq!(waterfall.adjusted_price, 2600.0 + 180.0);
    assert_eq!(tree.selections_total(), 4200.0 + 2780.0);

    let update = k.session.select(k.pendants, 1).unwrap();
    assert_eq!(update.status.overall, PointStatus::Completed);
}

#[test]
fn test_failed_selection_leaves_session_untouched() {
    let mut k = kitchen(EngineConfig::default());
    k.session.select(k.quartz, 1).unwrap();
    let before = serde_json::to_value(k.session.tree()).unwrap();

    let err = k.session.select(k.pendants, 3).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidQuantity { quantity: 3, max: 1, .. }
    ));
    assert!(matches!(
        k.session.select(ChoiceId(999), 1),
        Err(EngineError::UnknownChoice(ChoiceId(999)))
    ));
    assert_eq!(serde_json::to_value(k.session.tree()).unwrap(), before);
}

#[test]
fn test_deselecting_dependency_disables_dependent() {
    let mut k = kitchen(EngineConfig::default());
    k.session.select(k.quartz, 1).unwrap();
    k.session.select(k.waterfall, 1).unwrap();

    let update = k.session.deselect(k.quartz).unwrap();
    assert_eq!(update.propagation.choices_disabled, vec![k.waterfall]);
    let tree = k.session.tree();
    assert!(matches!(
        tree.choices[k.waterfall.index()].disabled_by.as_slice(),
        [DisabledBy::ChoiceRule { .. }]
    ));
    // 选中保留, 由状态汇总报告冲突
    assert!(tree.choices[k.waterfall.index()].is_selected());
    assert!(!update.status.conflicted_points.is_empty());
}

#[test]
fn test_lot_rule_applies_after_binding_lot() {
    let mut b = TreeBuilder::new();
    let p = b.point("Lot premium", PickType::Pick0or1);
    let walkout = b.choice(p, "Walkout basement", 15000.0);
    let tree = b.build();
    let mut rules = RuleStore::default();
    rules.add_lot_choice_rule(LotChoiceRule {
        lot_id: 314,
        choice: walkout,
        kind: RuleKind::MustNotHave,
    });

    let session = ConfigSession::new(tree, rules, EngineConfig::default()).unwrap();
    assert!(session.tree().choices[walkout.index()].enabled);

    let session = session.with_lot(Lot::new(314, 1), 2).unwrap();
    assert_eq!(
        session.tree().choices[walkout.index()].disabled_by,
        vec![DisabledBy::LotRule { lot_id: 314 }]
    );
    assert_eq!(session.price_range(walkout).unwrap(), None);
}

// ==========================================
// 配置文件
// ==========================================

#[test]
fn test_config_file_limits_price_enumeration() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"price_range": {{"max_relevant_set": 0}}}}"#).unwrap();
    let config = EngineConfig::load(file.path()).unwrap();

    let k = kitchen(config);
    // 无依赖的 Choice 仍可计算
    let range = k.session.price_range(k.pendants).unwrap().unwrap();
    assert_eq!((range.min, range.max), (650.0, 650.0));
    assert!(matches!(
        k.session.price_range(k.waterfall),
        Err(EngineError::EnumerationTooLarge { size: 1, limit: 0 })
    ));

    // 批量计算只跳过超限的 Choice
    let report = k.session.price_ranges().unwrap();
    assert_eq!(report.refused.into_iter().collect::<Vec<_>>(), vec![(k.waterfall, 1)]);
    assert_eq!(report.ranges[&k.pendants].max, 650.0);
    assert_eq!(report.ranges[&k.quartz].min, 4200.0);
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load_or_default(dir.path().join("engine.json")).unwrap();
    assert_eq!(config, EngineConfig::default());

    let k = kitchen(config);
    let range = k.session.price_range(k.waterfall).unwrap().unwrap();
    // 石英未选时依赖不满足, 只有石英选中的组合存活
    assert_eq!((range.min, range.max), (2780.0, 2780.0));
    assert_eq!(range.samples, 1);
}
