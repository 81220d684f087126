// ==========================================
// 住宅选配规则引擎 - 会话快照分析工具
// ==========================================
// 用法:
//   home-config-engine <session.json> [engine.json]
//
// 读取会话快照 (选配树 + 规则 + 地块), 执行 规则传播 → 状态汇总 →
// 价格区间 → 单调性检测, 以 JSON 报告输出到 stdout。日志输出到 stderr。
// ==========================================

use anyhow::{Context, Result};
use home_config_engine::config::EngineConfig;
use home_config_engine::domain::{ChoiceId, ConfigTree, DisabledBy, Lot, RuleStore};
use home_config_engine::engine::{
    ConfigSession, MonotonyConflict, PriceRange, PriceRangeReport, RuleCycle, StatusSummary,
};
use home_config_engine::logging;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 外部数据层导出的会话快照
#[derive(Debug, Deserialize)]
struct SessionSnapshot {
    tree: ConfigTree,
    #[serde(default)]
    rules: RuleStore,
    #[serde(default)]
    lot: Option<Lot>,
    #[serde(default)]
    plan_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SessionReport {
    version: &'static str,
    status: StatusSummary,
    passes: usize,
    cycle: Option<RuleCycle>,
    selections_total: f64,
    disabled_choices: BTreeMap<ChoiceId, Vec<DisabledBy>>,
    price_ranges: BTreeMap<ChoiceId, PriceRange>,
    /// 相关集合过大未计算区间的 Choice → 相关集合规模
    price_ranges_refused: BTreeMap<ChoiceId, usize>,
    /// 批量计算整体失败时的原因
    price_range_error: Option<String>,
    monotony: Option<MonotonyConflict>,
}

fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let snapshot_path = args
        .next()
        .context("用法: home-config-engine <session.json> [engine.json]")?;

    let config = match args.next() {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("加载引擎配置失败: {}", path))?,
        None => match EngineConfig::default_path() {
            Some(path) => EngineConfig::load_or_default(&path)
                .with_context(|| format!("加载引擎配置失败: {}", path.display()))?,
            None => EngineConfig::default(),
        },
    };

    let raw = std::fs::read_to_string(&snapshot_path)
        .with_context(|| format!("读取会话快照失败: {}", snapshot_path))?;
    let snapshot: SessionSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("解析会话快照失败: {}", snapshot_path))?;

    tracing::info!(
        version = home_config_engine::VERSION,
        points = snapshot.tree.points.len(),
        choices = snapshot.tree.choices.len(),
        "开始分析会话快照"
    );

    let mut session = ConfigSession::new(snapshot.tree, snapshot.rules, config)
        .context("初始化选配会话失败")?;
    if let (Some(lot), Some(plan_id)) = (snapshot.lot, snapshot.plan_id) {
        session = session.with_lot(lot, plan_id).context("绑定地块失败")?;
    }
    let update = session.refresh().context("规则传播失败")?;

    let (price_report, price_range_error) = match session.price_ranges() {
        Ok(report) => (report, None),
        Err(e) => {
            tracing::warn!(error = %e, "价格区间计算失败");
            (PriceRangeReport::default(), Some(e.to_string()))
        }
    };

    let disabled_choices = session
        .tree()
        .choices
        .iter()
        .filter(|c| !c.enabled)
        .map(|c| (c.id, c.disabled_by.clone()))
        .collect();

    let report = SessionReport {
        version: home_config_engine::VERSION,
        status: update.status,
        passes: update.passes,
        cycle: update.cycle,
        selections_total: session.tree().selections_total(),
        disabled_choices,
        price_ranges: price_report.ranges,
        price_ranges_refused: price_report.refused,
        price_range_error,
        monotony: session.monotony(),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("序列化报告失败")?
    );
    Ok(())
}
