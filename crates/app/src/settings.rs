use config::{Config, ConfigError, Environment, File};
use tessera_core::config::AppConfig;

/// 默认配置文件 (不含扩展名，支持 toml / yaml / json)
pub const DEFAULT_CONFIG_PATH: &str = "config/tessera";

/// # Summary
/// 加载应用配置。
///
/// # Logic
/// 1. 以 `AppConfig::default()` 为底。
/// 2. 叠加配置文件，文件不存在时跳过。
/// 3. 叠加环境变量 `TESSERA__SECTION__KEY`，例如 `TESSERA__SERVER__PORT=9000`。
pub fn load(path: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("TESSERA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load("does/not/exist").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.monitor.entity_chunk, 32);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[monitor]\ninterval_secs = 60\nclear_on_start = true").unwrap();
        writeln!(file, "[cache]\nttl_secs = 120").unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.monitor.interval_secs, 60);
        assert!(config.monitor.clear_on_start);
        assert_eq!(config.monitor.max_concurrency, 4);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.log.filter, "info");
    }
}
