use crate::rolling::{ema, sma, valid};
use tessera_core::market::entity::{Field, TimeSeries};
use tessera_core::strategy::entity::{
    ChartConfig, Columns, Computation, OutputConfig, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::port::{SelfBasedStrategy, StrategyMeta};

// 均线颜色按周期顺序轮换
const MA_COLORS: [&str; 3] = ["#ff4500", "#06a7a0", "#3c763d"];

/// # Summary
/// 多周期收盘价简单移动平均，每个周期输出一列 `ma{p}`。
pub struct MovingAverage;

impl MovingAverage {
    fn periods(params: &StrategyParams) -> Result<Vec<usize>, StrategyError> {
        params.positive_int_list("periods")
    }
}

impl StrategyMeta for MovingAverage {
    fn name(&self) -> &'static str {
        "ma"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new().with("periods", vec![5i64, 10, 20])
    }

    fn chart_config(&self, params: &StrategyParams) -> ChartConfig {
        let periods = Self::periods(params).unwrap_or_default();
        let mut config = ChartConfig::new("main_chart", "Moving Averages");
        for (i, period) in periods.iter().enumerate() {
            let order = i32::try_from(i + 1).unwrap_or(i32::MAX);
            config = config.with_output(
                format!("ma{}", period),
                OutputConfig::line(
                    format!("MA{}", period),
                    MA_COLORS[i % MA_COLORS.len()],
                    order,
                ),
            );
        }
        config
    }
}

impl SelfBasedStrategy for MovingAverage {
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let periods = Self::periods(&params)?;
        if series.is_empty() {
            return Err(StrategyError::EmptyInput);
        }
        let close = series.column(Field::Close);
        let columns: Columns = periods
            .iter()
            .map(|p| (format!("ma{}", p), sma(&close, *p)))
            .collect();
        Ok(Computation { columns, params })
    }
}

/// # Summary
/// MACD：快慢 EMA 之差、其信号线与柱状差值。
pub struct Macd;

impl StrategyMeta for Macd {
    fn name(&self) -> &'static str {
        "macd"
    }

    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new()
            .with("fast_period", 12i64)
            .with("slow_period", 26i64)
            .with("signal_period", 9i64)
    }

    fn chart_config(&self, _params: &StrategyParams) -> ChartConfig {
        let mut histogram = OutputConfig::bar("MACD Histogram", None, 0);
        histogram.use_color_from = Some("histogram".to_string());
        ChartConfig::new("macd_analysis", "MACD Analysis")
            .with_output("macd", OutputConfig::line("MACD Line", "#FF6B6B", 1))
            .with_output("signal", OutputConfig::line("Signal Line", "#FFD700", 2))
            .with_output("histogram", histogram)
    }
}

impl SelfBasedStrategy for Macd {
    /// # Logic
    /// 1. `macd = ema(close, fast) - ema(close, slow)`。
    /// 2. `signal = ema(macd, signal_period)`。
    /// 3. `histogram = 2 * (macd - signal)`。
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let params = params.merged_over(&self.default_parameters());
        let fast = params.positive_int("fast_period")?;
        let slow = params.positive_int("slow_period")?;
        let signal_period = params.positive_int("signal_period")?;
        if series.is_empty() {
            return Err(StrategyError::EmptyInput);
        }

        let close: Vec<Option<f64>> = series.column(Field::Close).into_iter().map(valid).collect();
        let fast_ema = ema(&close, fast);
        let slow_ema = ema(&close, slow);
        let macd: Vec<Option<f64>> = fast_ema
            .iter()
            .zip(&slow_ema)
            .map(|(f, s)| Some((*f)? - (*s)?))
            .collect();
        let signal = ema(&macd, signal_period);
        let histogram = macd
            .iter()
            .zip(&signal)
            .map(|(m, s)| Some(2.0 * ((*m)? - (*s)?)))
            .collect();

        let mut columns = Columns::new();
        columns.insert("macd".to_string(), macd);
        columns.insert("signal".to_string(), signal);
        columns.insert("histogram".to_string(), histogram);
        Ok(Computation { columns, params })
    }
}
