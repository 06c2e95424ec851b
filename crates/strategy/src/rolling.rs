//! 滚动窗口数值工具。
//!
//! 输入统一为 `&[f64]`，无效值为 NaN；输出与输入逐行对齐。

use tessera_core::common::{count_to_f64, is_valid};
use tessera_core::market::entity::{Field, TimeSeries};
use tessera_core::strategy::error::StrategyError;

/// 有效数值转为 `Some`，否则 `None`
pub fn valid(x: f64) -> Option<f64> {
    is_valid(x).then_some(x)
}

/// 无效值补零
pub fn zero_fill(x: Option<f64>) -> f64 {
    x.filter(|v| is_valid(*v)).unwrap_or(0.0)
}

/// # Summary
/// 按列名读取输入列。
///
/// # Returns
/// 列名无法识别返回 `StrategyError::MissingColumn`，序列为空返回 `StrategyError::EmptyInput`。
pub fn input_column(series: &TimeSeries, column: &str) -> Result<Vec<f64>, StrategyError> {
    let field: Field = column
        .parse()
        .map_err(|_| StrategyError::MissingColumn(column.to_string()))?;
    if series.is_empty() {
        return Err(StrategyError::EmptyInput);
    }
    Ok(series.column(field))
}

/// # Summary
/// 简单移动平均。
///
/// # Logic
/// 1. 维护窗口内的有效值累加和与无效值计数。
/// 2. 窗口未填满或窗口内含无效值时输出 `None`。
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut invalid = 0usize;
    let divisor = count_to_f64(period);
    for (i, &x) in values.iter().enumerate() {
        if is_valid(x) {
            sum += x;
        } else {
            invalid += 1;
        }
        if i >= period {
            let dropped = values[i - period];
            if is_valid(dropped) {
                sum -= dropped;
            } else {
                invalid -= 1;
            }
        }
        if i + 1 >= period && invalid == 0 {
            out.push(Some(sum / divisor));
        } else {
            out.push(None);
        }
    }
    out
}

/// # Summary
/// 允许不完整窗口的移动平均：取最近至多 `period` 个有效值的均值。
///
/// # Returns
/// 窗口内没有任何有效值时为 `None`。
pub fn partial_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, &x) in values.iter().enumerate() {
        if is_valid(x) {
            sum += x;
            count += 1;
        }
        if i >= period {
            let dropped = values[i - period];
            if is_valid(dropped) {
                sum -= dropped;
                count -= 1;
            }
        }
        out.push((count > 0).then(|| sum / count_to_f64(count)));
    }
    out
}

/// # Summary
/// 指数移动平均，`alpha = 2 / (span + 1)`。
///
/// # Logic
/// 1. 首个有效值作为初值。
/// 2. `ema[i] = alpha * x[i] + (1 - alpha) * ema[i-1]`。
/// 3. 无效输入沿用上一期的值；首个有效值之前输出 `None`。
pub fn ema(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (count_to_f64(span) + 1.0);
    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|x| {
            prev = match (prev, x.filter(|v| is_valid(*v))) {
                (None, Some(v)) => Some(v),
                (Some(p), Some(v)) => Some(alpha * v + (1.0 - alpha) * p),
                (p, None) => p,
            };
            prev
        })
        .collect()
}

/// 滚动极值方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

/// # Summary
/// 尾随窗口 (含当期) 内极值所在的下标。
///
/// # Logic
/// 1. 窗口未填满或窗口内含无效值时为 `None`。
/// 2. 多个位置并列极值时取最近的一个。
pub fn extreme_index(values: &[f64], period: usize, extreme: Extreme) -> Vec<Option<usize>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let start = i + 1 - period;
            let window = &values[start..=i];
            if window.iter().any(|v| !is_valid(*v)) {
                return None;
            }
            let mut best = start;
            for (offset, &v) in window.iter().enumerate() {
                let better = match extreme {
                    Extreme::Max => v >= values[best],
                    Extreme::Min => v <= values[best],
                };
                if better {
                    best = start + offset;
                }
            }
            Some(best)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_warmup_and_values() {
        let out = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0], 5);
        assert_eq!(out, vec![None, None, None, None, Some(12.0), Some(13.0)]);
    }

    #[test]
    fn test_sma_invalid_window() {
        let out = sma(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, None, None, Some(3.5)]);
    }

    #[test]
    fn test_partial_mean() {
        let out = partial_mean(&[2.0, 4.0, f64::NAN, 8.0], 2);
        assert_eq!(out, vec![Some(2.0), Some(3.0), Some(4.0), Some(8.0)]);
        assert_eq!(partial_mean(&[f64::NAN], 3), vec![None]);
    }

    #[test]
    fn test_ema_carries_forward() {
        let out = ema(&[None, Some(10.0), None, Some(20.0)], 3);
        assert_eq!(out, vec![None, Some(10.0), Some(10.0), Some(15.0)]);
    }

    #[test]
    fn test_extreme_index_prefers_most_recent() {
        let values = [5.0, 9.0, 9.0, 1.0, 1.0];
        let max = extreme_index(&values, 3, Extreme::Max);
        assert_eq!(max, vec![None, None, Some(2), Some(2), Some(2)]);
        let min = extreme_index(&values, 3, Extreme::Min);
        assert_eq!(min, vec![None, None, Some(0), Some(3), Some(4)]);
    }
}
