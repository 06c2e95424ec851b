use crate::pool::{StoreError, open_pool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tessera_core::cache::entity::{CacheKey, CachedResult, ResultEntry};
use tessera_core::cache::error::CacheError;
use tessera_core::cache::port::ResultStore;
use tessera_core::strategy::entity::StrategyOutput;
use tracing::{debug, error};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS strategy_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    strategy_name TEXT NOT NULL,
    params_hash TEXT NOT NULL,
    result_data TEXT NOT NULL,
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL,
    UNIQUE (entity_id, strategy_name, params_hash)
);

CREATE INDEX IF NOT EXISTS idx_strategy_results_pair
    ON strategy_results (entity_id, strategy_name);
"#;

const UPSERT: &str = r#"
INSERT INTO strategy_results
    (entity_id, strategy_name, params_hash, result_data, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (entity_id, strategy_name, params_hash) DO UPDATE SET
    result_data = excluded.result_data,
    updated_at = excluded.updated_at
RETURNING created_at
"#;

/// ResultStore 的 SQLite 实现。
///
/// # Summary
/// 所有策略结果保存在单表 `strategy_results` 中，`result_data` 列为结果文档的 JSON 文本。
///
/// # Invariants
/// * `(entity_id, strategy_name, params_hash)` 由唯一约束保证不重复。
/// * 批量写入在单个事务内完成，失败时整体回滚。
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    /// 打开 (必要时创建) 指定路径的结果库。
    ///
    /// # Logic
    /// 1. 开启 WAL 与忙等待的连接池。
    /// 2. 初始化 `strategy_results` 表与组合索引。
    ///
    /// # Arguments
    /// * `path` - 数据库文件路径。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或错误。
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = open_pool(path.as_ref(), 4, SCHEMA).await?;
        Ok(Self { pool })
    }

    fn encode(output: &StrategyOutput) -> Result<String, CacheError> {
        serde_json::to_string(output).map_err(|e| CacheError::Serialize(e.to_string()))
    }

    async fn upsert_one<'e, E>(
        executor: E,
        key: &CacheKey,
        data: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_scalar::<_, DateTime<Utc>>(UPSERT)
            .bind(&key.entity_id)
            .bind(&key.strategy_name)
            .bind(&key.params_hash)
            .bind(data)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    /// # Summary
    /// 按复合键读取。
    ///
    /// # Logic
    /// 查询 `strategy_results` 并把 `result_data` 反序列化为结果文档。
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>, CacheError> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            SELECT result_data, created_at, updated_at
            FROM strategy_results
            WHERE entity_id = ? AND strategy_name = ? AND params_hash = ?
            "#,
        )
        .bind(&key.entity_id)
        .bind(&key.strategy_name)
        .bind(&key.params_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(e.to_string()))?;

        row.map(|(data, created_at, updated_at)| {
            let output = serde_json::from_str(&data)
                .map_err(|e| CacheError::Deserialize(e.to_string()))?;
            Ok(CachedResult {
                key: key.clone(),
                output,
                created_at,
                updated_at,
            })
        })
        .transpose()
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        output: &StrategyOutput,
        now: DateTime<Utc>,
    ) -> Result<CachedResult, CacheError> {
        let data = Self::encode(output)?;
        let created_at = Self::upsert_one(&self.pool, key, &data, now)
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;
        Ok(CachedResult {
            key: key.clone(),
            output: output.clone(),
            created_at,
            updated_at: now,
        })
    }

    /// # Summary
    /// 单事务批量写入。
    ///
    /// # Logic
    /// 1. 先完成全部序列化。
    /// 2. 开启事务逐条 upsert，任意一条失败时事务随 `tx` 析构回滚。
    /// 3. 提交事务。
    async fn upsert_batch(
        &self,
        entries: &[ResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, CacheError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let encoded = entries
            .iter()
            .map(|entry| Ok((&entry.key, Self::encode(&entry.output)?)))
            .collect::<Result<Vec<_>, CacheError>>()
            .map_err(|e| CacheError::Write(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;
        for (key, data) in &encoded {
            if let Err(e) = Self::upsert_one(&mut *tx, key, data, now).await {
                error!(
                    "Batch write failed at {}/{}, rolling back: {}",
                    key.entity_id, key.strategy_name, e
                );
                return Err(CacheError::Write(e.to_string()));
            }
        }
        tx.commit()
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;

        debug!("Committed batch of {} results", encoded.len());
        Ok(encoded.len())
    }

    async fn cached_pairs(&self) -> Result<HashSet<(String, String)>, CacheError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT DISTINCT entity_id, strategy_name FROM strategy_results",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CacheError::Storage(e.to_string()))?;
        Ok(rows.into_iter().collect())
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM strategy_results")
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Write(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
