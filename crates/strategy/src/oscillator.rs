use crate::rolling::{input_column, partial_mean, sma, zero_fill};
use tessera_core::common::is_valid;
use tessera_core::market::entity::{Field, TimeSeries};
use tessera_core::strategy::entity::{
    ChartConfig, Columns, Computation, DEFAULT_OUTPUT_COLOR, OutputConfig, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::port::{SelfBasedStrategy, StrategyMeta};

// 平均跌幅为零时的替代值
const RSI_LOSS_FLOOR: f64 = 1e-4;

/// # Summary
/// 相对强弱指标。
///
/// # Invariants
/// - 输出位于 `[0, 100]`；窗口未填满的位置补零。
pub struct Rsi;

impl StrategyMeta for Rsi {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("period", 5i64)
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        ChartConfig::new(self.name(), self.name())
            .with_output("rsi", OutputConfig::line("RSI", DEFAULT_OUTPUT_COLOR, 1))
    }
}

impl SelfBasedStrategy for Rsi {
    /// # Logic
    /// 1. `delta[i] = close[i] - close[i-1]`，首行及无效差值记为 0。
    /// 2. 涨幅、跌幅分别做 `period` 期简单平均。
    /// 3. `rsi = 100 - 100 / (1 + gain / loss)`，`loss == 0` 时以 1e-4 代替。
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let period = params.positive_int("period")?;
        if series.is_empty() {
            return Err(StrategyError::EmptyInput);
        }
        let close = series.column(Field::Close);

        let mut gains = Vec::with_capacity(close.len());
        let mut losses = Vec::with_capacity(close.len());
        gains.push(0.0);
        losses.push(0.0);
        for pair in close.windows(2) {
            let delta = pair[1] - pair[0];
            let delta = if is_valid(delta) { delta } else { 0.0 };
            gains.push(delta.max(0.0));
            losses.push((-delta).max(0.0));
        }

        let avg_gain = sma(&gains, period);
        let avg_loss = sma(&losses, period);
        let rsi = avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(g, l)| match (g, l) {
                (Some(g), Some(l)) => {
                    let loss = if *l == 0.0 { RSI_LOSS_FLOOR } else { *l };
                    let value = 100.0 - 100.0 / (1.0 + g / loss);
                    Some(zero_fill(Some(value)).clamp(0.0, 100.0))
                }
                _ => Some(0.0),
            })
            .collect();

        let mut columns = Columns::new();
        columns.insert("rsi".to_string(), rsi);
        Ok(Computation { columns, params })
    }
}

/// # Summary
/// 相对收益：当期值相对 M 期前的 N 期均值的涨跌幅。
///
/// # Invariants
/// - 输出列名与展示名都由生效参数 `N`、`M` 推导。
pub struct RelativeReturn;

impl RelativeReturn {
    fn output_name(n: usize, m: usize) -> String {
        format!("relative_return_{}_{}", n, m)
    }
}

impl StrategyMeta for RelativeReturn {
    fn name(&self) -> &'static str {
        "relative_return"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new()
            .with("N", 5i64)
            .with("M", 20i64)
            .with("column", "close")
    }

    fn chart_config(&self, params: &StrategyParams) -> ChartConfig {
        let params = params.merged_over(&self.default_parameters());
        let n = params.positive_int("N").unwrap_or(5);
        let m = params.non_negative_int("M").unwrap_or(20);
        ChartConfig::new("return_analysis", "Relative Return Analysis").with_output(
            Self::output_name(n, m),
            OutputConfig::line(format!("Relative Return ({},{})", n, m), "#4169E1", 1),
        )
    }
}

impl SelfBasedStrategy for RelativeReturn {
    /// # Logic
    /// 1. `avg` 为最近至多 N 个值的均值，无值补零。
    /// 2. `shifted[i] = avg[i - M]`，前 M 行补零。
    /// 3. `ratio = value / shifted - 1`，分母为零或结果无效时补零。
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let n = params.positive_int("N")?;
        let m = params.non_negative_int("M")?;
        let values = input_column(series, params.text("column")?)?;

        let avg: Vec<f64> = partial_mean(&values, n).into_iter().map(zero_fill).collect();
        let ratio = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let shifted = i.checked_sub(m).map(|j| avg[j]).unwrap_or(0.0);
                if shifted == 0.0 {
                    return Some(0.0);
                }
                Some(zero_fill(Some(value / shifted - 1.0)))
            })
            .collect();

        let mut columns = Columns::new();
        columns.insert(Self::output_name(n, m), ratio);
        Ok(Computation { columns, params })
    }
}
