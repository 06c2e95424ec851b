use thiserror::Error;

/// # Summary
/// 策略计算错误枚举，对应参数非法、列缺失及空输入等计算失败场景。
///
/// # Invariants
/// - 计算失败以错误值返回，策略实现内部不得 panic。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    // 参数缺失或取值不被支持
    #[error("Unsupported parameter `{name}`: {reason}")]
    UnsupportedParameter { name: String, reason: String },
    // 输入数据中不存在指定列
    #[error("Column not found: {0}")]
    MissingColumn(String),
    // 输入序列为空
    #[error("Empty input")]
    EmptyInput,
    // 其它输入错误
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StrategyError {
    pub fn unsupported(name: &str, reason: &str) -> Self {
        StrategyError::UnsupportedParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
