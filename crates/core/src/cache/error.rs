use thiserror::Error;

/// # Summary
/// 结果缓存域错误枚举，处理序列化及底层存储故障。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum CacheError {
    // 结果文档序列化失败
    #[error("Serialize error: {0}")]
    Serialize(String),
    // 结果文档反序列化失败
    #[error("Deserialize error: {0}")]
    Deserialize(String),
    // 底层存储读取故障
    #[error("Storage error: {0}")]
    Storage(String),
    // 写入失败，所在事务已回滚
    #[error("Cache write error: {0}")]
    Write(String),
}
