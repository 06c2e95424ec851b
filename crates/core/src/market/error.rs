use thiserror::Error;

/// # Summary
/// 行情数据域错误枚举，处理行情库读取、解析及数据缺失等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum MarketError {
    // 底层存储读取失败
    #[error("Storage error: {0}")]
    Storage(String),
    // 数据解析错误
    #[error("Parse error: {0}")]
    Parse(String),
    // 请求的数据未找到
    #[error("Data not found: {0}")]
    NotFound(String),
}
