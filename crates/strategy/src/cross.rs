//! 截面型策略。

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tessera_core::common::{count_to_f64, is_valid};
use tessera_core::market::entity::{Field, Universe};
use tessera_core::strategy::entity::{
    ChartConfig, Columns, CrossComputation, OutputConfig, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::port::{CrossBasedStrategy, StrategyMeta};

const OUTPUT: &str = "rank_percentage";

/// # Summary
/// 按日期对全市场做升序排名并归一化到 0-100。
///
/// # Invariants
/// - 并列取平均名次。
/// - 归一化分母按当日出现的全部标的计数，值无效的标的也计入。
/// - 当日只有一个标的时输出 0；当日值无效的标的输出 `None`。
pub struct RankPercentage;

impl StrategyMeta for RankPercentage {
    fn name(&self) -> &'static str {
        "rank_percentage"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("column", "close")
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        ChartConfig::new("rank_analysis", "Rank Percentage Analysis")
            .with_output(OUTPUT, OutputConfig::line("Rank Percentage", "#9370DB", 1))
    }
}

/// 同一日期的观测与出现的标的数
#[derive(Default)]
struct Day<'a> {
    observations: Vec<Observation<'a>>,
    present: usize,
}

/// 单个 (标的, 行号, 取值) 观测
struct Observation<'a> {
    entity_id: &'a str,
    row: usize,
    value: f64,
}

/// # Summary
/// 对同一日期的有效观测计算归一化排名。
///
/// # Logic
/// 1. 按值升序排序。
/// 2. 值相等的连续区间 `[start, end)` 共享平均名次 `(start + end + 1) / 2` (1 起算)。
/// 3. `pct = (rank - 1) / (present - 1) * 100`，`present` 为当日出现的标的数。
fn rank_day(observations: &mut [Observation<'_>], present: usize) -> Vec<f64> {
    observations.sort_by(|a, b| a.value.total_cmp(&b.value));
    let count = observations.len();
    let mut pct = vec![0.0; count];
    if present <= 1 {
        return pct;
    }
    let denominator = count_to_f64(present - 1);
    let mut start = 0;
    while start < count {
        let mut end = start + 1;
        while end < count && observations[end].value == observations[start].value {
            end += 1;
        }
        let rank = count_to_f64(start + end + 1) / 2.0;
        for slot in &mut pct[start..end] {
            *slot = (rank - 1.0) / denominator * 100.0;
        }
        start = end;
    }
    pct
}

impl CrossBasedStrategy for RankPercentage {
    fn compute(
        &self,
        universe: &Universe,
        params: &StrategyParams,
    ) -> Result<CrossComputation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let column = params.text("column")?;
        let field: Field = column
            .parse()
            .map_err(|_| StrategyError::MissingColumn(column.to_string()))?;
        if universe.is_empty() {
            return Err(StrategyError::EmptyInput);
        }

        let mut by_date: BTreeMap<NaiveDate, Day<'_>> = BTreeMap::new();
        let mut outputs: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
        for series in universe.iter() {
            outputs.insert(series.entity_id(), vec![None; series.len()]);
            for (row, bar) in series.bars().iter().enumerate() {
                let value = bar.get(field);
                let day = by_date.entry(bar.date).or_default();
                day.present += 1;
                if is_valid(value) {
                    day.observations.push(Observation {
                        entity_id: series.entity_id(),
                        row,
                        value,
                    });
                }
            }
        }

        for day in by_date.values_mut() {
            let pct = rank_day(&mut day.observations, day.present);
            for (obs, p) in day.observations.iter().zip(pct) {
                if let Some(slot) = outputs
                    .get_mut(obs.entity_id)
                    .and_then(|column| column.get_mut(obs.row))
                {
                    *slot = Some(p);
                }
            }
        }

        let mut result = CrossComputation::new(params.clone());
        for (entity_id, values) in outputs {
            let mut columns = Columns::new();
            columns.insert(OUTPUT.to_string(), values);
            result.insert(entity_id, columns);
        }
        Ok(result)
    }
}
