pub mod time;

/// # Summary
/// 将窗口长度、计数等 `usize` 转换为 `f64` 参与数值计算。
///
/// # Invariants
/// - 输入来自序列长度或窗口参数，远小于 2^52，不存在精度损失。
#[allow(clippy::cast_precision_loss)]
pub fn count_to_f64(n: usize) -> f64 {
    n as f64
}

/// # Summary
/// 将 `f64` 视为有效数值的判定：非 NaN 且有限。
pub fn is_valid(x: f64) -> bool {
    x.is_finite()
}
