use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use tessera_core::cache::entity::{CacheKey, CachedResult, ResultEntry};
use tessera_core::cache::error::CacheError;
use tessera_core::cache::port::ResultStore;
use tessera_core::strategy::entity::StrategyOutput;
use tokio::sync::RwLock;
use tracing::debug;

/// 内存中的一行：结果文档以 JSON 字节保存，与持久化实现的 `result_data` 列一致
struct StoredRow {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// # Summary
/// 基于 DashMap 的内存结果缓存实现。
///
/// # Invariants
/// - 单条读写直接通过并发哈希表 `DashMap` 执行，保证多线程安全。
/// - 批量写入持有 `batch_lock` 写锁，读取持有读锁，读方看不到写了一半的批次。
/// - 不提供自动过期，新鲜度由调用方依据 `updated_at` 判断。
pub struct MemResultStore {
    // 线程安全的 KV 存储容器
    storage: DashMap<CacheKey, StoredRow>,
    batch_lock: RwLock<()>,
}

impl MemResultStore {
    /// # Summary
    /// 创建一个新的 MemResultStore 实例。
    ///
    /// # Returns
    /// * `Self` - 空的缓存实例。
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
            batch_lock: RwLock::new(()),
        }
    }

    /// 当前记录数
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn encode(output: &StrategyOutput) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(output).map_err(|e| CacheError::Serialize(e.to_string()))
    }

    fn decode(key: &CacheKey, row: &StoredRow) -> Result<CachedResult, CacheError> {
        let output = serde_json::from_slice(&row.data)
            .map_err(|e| CacheError::Deserialize(e.to_string()))?;
        Ok(CachedResult {
            key: key.clone(),
            output,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// 覆盖写入已编码的数据，保留首次写入时间
    fn write_row(&self, key: &CacheKey, data: Vec<u8>, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.storage.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let row = occupied.get_mut();
                row.data = data;
                row.updated_at = now;
                row.created_at
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredRow {
                    data,
                    created_at: now,
                    updated_at: now,
                });
                now
            }
        }
    }
}

impl Default for MemResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemResultStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>, CacheError> {
        let _guard = self.batch_lock.read().await;
        match self.storage.get(key) {
            Some(row) => Self::decode(key, row.value()).map(Some),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        output: &StrategyOutput,
        now: DateTime<Utc>,
    ) -> Result<CachedResult, CacheError> {
        let data = Self::encode(output)?;
        let _guard = self.batch_lock.write().await;
        let created_at = self.write_row(key, data, now);
        Ok(CachedResult {
            key: key.clone(),
            output: output.clone(),
            created_at,
            updated_at: now,
        })
    }

    /// # Summary
    /// 批量写入。
    ///
    /// # Logic
    /// 1. 先完成全部序列化，任意一条失败则不写入任何数据。
    /// 2. 持有写锁后逐条写入。
    async fn upsert_batch(
        &self,
        entries: &[ResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, CacheError> {
        let encoded = entries
            .iter()
            .map(|entry| Ok((&entry.key, Self::encode(&entry.output)?)))
            .collect::<Result<Vec<_>, CacheError>>()
            .map_err(|e| CacheError::Write(e.to_string()))?;

        let _guard = self.batch_lock.write().await;
        for (key, data) in encoded {
            self.write_row(key, data, now);
        }
        debug!("Memory cache batch of {} rows applied", entries.len());
        Ok(entries.len())
    }

    async fn cached_pairs(&self) -> Result<HashSet<(String, String)>, CacheError> {
        let _guard = self.batch_lock.read().await;
        Ok(self
            .storage
            .iter()
            .map(|e| (e.key().entity_id.clone(), e.key().strategy_name.clone()))
            .collect())
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let _guard = self.batch_lock.write().await;
        let removed = self.storage.len();
        self.storage.clear();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}
