use crate::strategy::entity::StrategyOutput;
use crate::strategy::params::ParamsHash;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 结果缓存的复合主键。
///
/// # Invariants
/// - `(entity_id, strategy_name, params_hash)` 在缓存中唯一。
/// - `strategy_name` 为注册表中的规范小写名称。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub entity_id: String,
    pub strategy_name: String,
    pub params_hash: ParamsHash,
}

impl CacheKey {
    pub fn new(
        entity_id: impl Into<String>,
        strategy_name: impl Into<String>,
        params_hash: impl Into<ParamsHash>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            strategy_name: strategy_name.into(),
            params_hash: params_hash.into(),
        }
    }
}

/// # Summary
/// 一条已缓存的策略结果。
///
/// # Invariants
/// - `created_at` 首次写入后不再变化，`updated_at` 每次写入都刷新。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub key: CacheKey,
    pub output: StrategyOutput,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CachedResult {
    /// `now - updated_at < ttl` 时视为新鲜
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at < ttl
    }
}

/// # Summary
/// 批量写入的单条记录。
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub key: CacheKey,
    pub output: StrategyOutput,
}
