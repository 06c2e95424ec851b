use crate::cache::error::CacheError;
use crate::market::error::MarketError;
use crate::strategy::error::StrategyError;
use crate::strategy::registry::RegistryError;
use thiserror::Error;

/// # Summary
/// 计算引擎域错误枚举。
///
/// # Invariants
/// - 单个 `(entity, strategy)` 的错误只在该条目内上报，不中断批处理。
#[derive(Error, Debug)]
pub enum EngineError {
    // 策略名称未注册
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),
    // 计算失败：列缺失、参数非法、空输入等
    #[error("Computation error: {0}")]
    Computation(#[from] StrategyError),
    // 结果写入缓存失败
    #[error("Cache write error: {0}")]
    CacheWrite(String),
    // 标的数据缺失或不足
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
    // 标的不存在
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    // 请求缺少必要字段
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => EngineError::StrategyNotFound(name),
            RegistryError::Duplicate(name) => {
                EngineError::BadRequest(format!("duplicate strategy: {}", name))
            }
        }
    }
}

impl From<MarketError> for EngineError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::NotFound(id) => EngineError::EntityNotFound(id),
            other => EngineError::DataUnavailable(other.to_string()),
        }
    }
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        EngineError::CacheWrite(err.to_string())
    }
}
