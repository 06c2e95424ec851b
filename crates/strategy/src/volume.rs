//! 成交量系列策略。

use crate::rolling::{Extreme, extreme_index, valid};
use tessera_core::common::count_to_f64;
use tessera_core::market::entity::{Field, TimeSeries};
use tessera_core::strategy::entity::{
    ChartConfig, Columns, Computation, OutputConfig, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::port::{SelfBasedStrategy, StrategyMeta};

fn volume_column(series: &TimeSeries) -> Result<Vec<f64>, StrategyError> {
    if series.is_empty() {
        return Err(StrategyError::EmptyInput);
    }
    Ok(series.column(Field::Volume))
}

fn single_output(name: &str, output: &str, config: OutputConfig) -> ChartConfig {
    ChartConfig::new(name, name).with_output(output, config)
}

/// # Summary
/// 成交量原样输出，无效值为 `None`。
pub struct Volume;

impl StrategyMeta for Volume {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("period", 20i64)
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        ChartConfig::new("volume_analysis", "Volume Analysis")
            .with_output("volume", OutputConfig::bar("Volume", Some("#FFA07A"), 1))
    }
}

impl SelfBasedStrategy for Volume {
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        params.positive_int("period")?;
        let volume = volume_column(series)?;
        let mut columns = Columns::new();
        columns.insert(
            "volume".to_string(),
            volume.into_iter().map(valid).collect(),
        );
        Ok(Computation { columns, params })
    }
}

/// # Summary
/// 当日成交量是否为窗口极值 (1/0)。
///
/// # Invariants
/// - 窗口含当日；窗口未填满或含无效值时输出 0。
pub struct VolumeExtremeToday {
    extreme: Extreme,
}

impl VolumeExtremeToday {
    pub fn highest() -> Self {
        Self {
            extreme: Extreme::Max,
        }
    }

    pub fn lowest() -> Self {
        Self {
            extreme: Extreme::Min,
        }
    }

    fn output(&self) -> &'static str {
        match self.extreme {
            Extreme::Max => "highest_vol_today",
            Extreme::Min => "lowest_vol_today",
        }
    }
}

impl StrategyMeta for VolumeExtremeToday {
    fn name(&self) -> &'static str {
        match self.extreme {
            Extreme::Max => "highest_volume_today",
            Extreme::Min => "lowest_volume_today",
        }
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("period", 20i64)
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        let config = match self.extreme {
            Extreme::Max => OutputConfig::line("Highest Volume Today", "#FF4500", 1),
            Extreme::Min => OutputConfig::line("Lowest Volume Today", "#FFB6C1", 1),
        };
        single_output(self.name(), self.output(), config)
    }
}

impl SelfBasedStrategy for VolumeExtremeToday {
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let period = params.positive_int("period")?;
        let volume = volume_column(series)?;
        // 当日即窗口内最近的极值位置
        let flags = extreme_index(&volume, period, self.extreme)
            .into_iter()
            .enumerate()
            .map(|(i, idx)| Some(if idx == Some(i) { 1.0 } else { 0.0 }))
            .collect();
        let mut columns = Columns::new();
        columns.insert(self.output().to_string(), flags);
        Ok(Computation { columns, params })
    }
}

/// # Summary
/// 距窗口内成交量极值的天数。
///
/// # Invariants
/// - 并列极值取最近一次；窗口未填满或含无效值时输出 0。
pub struct DaysSinceVolumeExtreme {
    extreme: Extreme,
}

impl DaysSinceVolumeExtreme {
    pub fn highest() -> Self {
        Self {
            extreme: Extreme::Max,
        }
    }

    pub fn lowest() -> Self {
        Self {
            extreme: Extreme::Min,
        }
    }

    fn output(&self) -> &'static str {
        match self.extreme {
            Extreme::Max => "days_since_highest_vol",
            Extreme::Min => "days_since_lowest_vol",
        }
    }
}

impl StrategyMeta for DaysSinceVolumeExtreme {
    fn name(&self) -> &'static str {
        match self.extreme {
            Extreme::Max => "days_since_last_high",
            Extreme::Min => "days_since_last_low",
        }
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("period", 7i64)
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        let config = match self.extreme {
            Extreme::Max => OutputConfig::line("Days Since Highest Volume", "#FF8C00", 1),
            Extreme::Min => OutputConfig::line("Days Since Lowest Volume", "#DEB887", 1),
        };
        single_output(self.name(), self.output(), config)
    }
}

impl SelfBasedStrategy for DaysSinceVolumeExtreme {
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let period = params.positive_int("period")?;
        let volume = volume_column(series)?;
        let days = extreme_index(&volume, period, self.extreme)
            .into_iter()
            .enumerate()
            .map(|(i, idx)| Some(idx.map_or(0.0, |j| count_to_f64(i - j))))
            .collect();
        let mut columns = Columns::new();
        columns.insert(self.output().to_string(), days);
        Ok(Computation { columns, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::test_utils::series_from_volumes;

    fn period(p: i64) -> StrategyParams {
        StrategyParams::new().with("period", p)
    }

    #[test]
    fn test_highest_and_lowest_flags() {
        let series = series_from_volumes("A", &[100.0, 300.0, 200.0, 50.0, 400.0]);
        let high = VolumeExtremeToday::highest()
            .compute(&series, &period(3))
            .unwrap();
        assert_eq!(
            high.columns["highest_vol_today"],
            vec![Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(1.0)]
        );
        let low = VolumeExtremeToday::lowest()
            .compute(&series, &period(3))
            .unwrap();
        assert_eq!(
            low.columns["lowest_vol_today"],
            vec![Some(0.0), Some(0.0), Some(0.0), Some(1.0), Some(0.0)]
        );
    }

    #[test]
    fn test_days_since_extreme_ties_use_most_recent() {
        let series = series_from_volumes("A", &[500.0, 500.0, 100.0, 200.0]);
        let out = DaysSinceVolumeExtreme::highest()
            .compute(&series, &period(3))
            .unwrap();
        assert_eq!(
            out.columns["days_since_highest_vol"],
            vec![Some(0.0), Some(0.0), Some(1.0), Some(2.0)]
        );
    }

    #[test]
    fn test_volume_passthrough_marks_invalid() {
        let series = series_from_volumes("A", &[1.0, f64::NAN]);
        let out = Volume.compute(&series, &StrategyParams::new()).unwrap();
        assert_eq!(out.columns["volume"], vec![Some(1.0), None]);
        assert_eq!(Volume.chart_config(&out.params).chart_group, "volume_analysis");
    }

    #[test]
    fn test_chart_group_defaults_to_strategy_name() {
        let config = DaysSinceVolumeExtreme::lowest().chart_config(&StrategyParams::new());
        assert_eq!(config.chart_group, "days_since_last_low");
        assert_eq!(config.chart_name, "days_since_last_low");
        assert!(config.outputs.contains_key("days_since_lowest_vol"));
    }
}
