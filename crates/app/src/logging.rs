use tessera_core::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// # Summary
/// 初始化全局日志：标准输出加按天滚动的文件 `{dir}/tessera.log`。
///
/// # Logic
/// 1. `RUST_LOG` 存在时优先，否则使用配置中的过滤表达式。
/// 2. 文件写入经 `non_blocking` 异步落盘。
///
/// # Returns
/// 文件写入线程的守卫，需持有到进程退出，否则尾部日志丢失。
pub fn init(config: &LogConfig) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("tessera.log")
        .build(&config.dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;
    Ok(guard)
}
