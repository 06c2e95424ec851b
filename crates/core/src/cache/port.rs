use crate::cache::entity::{CacheKey, CachedResult, ResultEntry};
use crate::cache::error::CacheError;
use crate::strategy::entity::StrategyOutput;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// # Summary
/// 策略结果缓存接口 (Port)，底层为关系型存储的单张逻辑表。
///
/// # Invariants
/// - 复合键 `(entity_id, strategy_name, params_hash)` 唯一。
/// - 并发控制 (锁、事务) 由实现负责，调用方不做额外同步。
/// - 过期记录不会被隐式删除，只会被覆盖或由 `clear` 统一清除。
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// # Summary
    /// 按复合键读取缓存记录。
    ///
    /// # Returns
    /// 存在返回 `Some(CachedResult)`，不判断新鲜度。
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>, CacheError>;

    /// # Summary
    /// 写入或覆盖单条记录。
    ///
    /// # Logic
    /// 1. 不存在时插入，`created_at = updated_at = now`。
    /// 2. 已存在时覆盖数据并将 `updated_at` 刷新为 `now`，保留 `created_at`。
    ///
    /// # Returns
    /// 写入后的记录。
    async fn upsert(
        &self,
        key: &CacheKey,
        output: &StrategyOutput,
        now: DateTime<Utc>,
    ) -> Result<CachedResult, CacheError>;

    /// # Summary
    /// 在单个事务中批量写入。
    ///
    /// # Logic
    /// 1. 开启事务，逐条执行与 `upsert` 相同的写入语义。
    /// 2. 任意一条失败则整体回滚并返回 `CacheError::Write`。
    ///
    /// # Returns
    /// 成功写入的条数。
    async fn upsert_batch(
        &self,
        entries: &[ResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, CacheError>;

    /// # Summary
    /// 列出已有结果的 `(entity_id, strategy_name)` 组合，不区分参数摘要。
    async fn cached_pairs(&self) -> Result<HashSet<(String, String)>, CacheError>;

    /// # Summary
    /// 清空全部缓存记录。
    ///
    /// # Returns
    /// 被删除的记录数。
    async fn clear(&self) -> Result<u64, CacheError>;
}
