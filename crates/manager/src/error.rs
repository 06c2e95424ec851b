use tessera_core::cache::error::CacheError;
use thiserror::Error;

/// # Summary
/// Manager 层的统一错误类型。
///
/// # Invariants
/// - 只有整轮无法继续的故障才会以错误返回，单个条目与单个批次的失败只计数。
#[derive(Error, Debug)]
pub enum ManagerError {
    // 全市场快照加载失败，本轮中止
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
    // 读取已缓存组合失败
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}
