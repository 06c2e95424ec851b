use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tessera_core::cache::error::CacheError;
use tessera_core::market::error::MarketError;
use thiserror::Error;

/// # Summary
/// 连接与建表阶段的错误。
#[derive(Error, Debug)]
pub enum StoreError {
    // 目录创建失败
    #[error("IO error: {0}")]
    Io(String),
    // 数据库连接或 DDL 失败
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        CacheError::Storage(err.to_string())
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        MarketError::Storage(err.to_string())
    }
}

/// # Summary
/// 打开 SQLite 连接池并执行初始化 DDL。
///
/// # Logic
/// 1. 确保数据库文件所在目录存在。
/// 2. 开启 `create_if_missing`、WAL 日志与忙等待，允许读写并发。
/// 3. 执行 `schema` 建表语句。
pub(crate) async fn open_pool(
    path: &Path,
    max_connections: u32,
    schema: &str,
) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    sqlx::query(schema)
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(pool)
}
