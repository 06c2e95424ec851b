use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub monitor: MonitorSettings,
    pub cache: CacheSettings,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    // 数据根目录，结果库与行情库均位于其下
    pub data_dir: String,
    // 结果缓存库文件名
    pub results_db: String,
    // 日线行情库文件名
    pub market_db: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            results_db: "results.db".to_string(),
            market_db: "market.db".to_string(),
        }
    }
}

/// # Summary
/// 对账调度与巡检循环的运行参数。
///
/// # Invariants
/// - `max_concurrency` 与 `entity_chunk` 至少为 1，使用方需自行兜底。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    // 两次对账之间的休眠秒数
    pub interval_secs: u64,
    // 首轮对账前是否清空全部缓存
    pub clear_on_start: bool,
    // 自身型策略并发计算上限
    pub max_concurrency: usize,
    // 每批次并行处理的标的数
    pub entity_chunk: usize,
    // 参与计算所需的最少行数
    pub min_rows: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            clear_on_start: false,
            max_concurrency: 4,
            entity_chunk: 32,
            min_rows: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    // 结果新鲜度窗口 (秒)
    pub ttl_secs: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: String,
    // EnvFilter 语法，例如 "info,tessera_manager=debug"
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.monitor.max_concurrency, 4);
        assert_eq!(config.monitor.min_rows, 2);
        assert_eq!(config.cache.ttl_secs, 86_400);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"monitor": {"interval_secs": 60}}"#).unwrap();
        assert_eq!(config.monitor.interval_secs, 60);
        assert_eq!(config.monitor.max_concurrency, 4);
        assert_eq!(config.server.port, 8080);
    }
}
