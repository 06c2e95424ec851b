mod logging;
mod settings;

use std::path::Path;
use std::sync::Arc;

use tessera_api::server::{AppState, start_server};
use tessera_core::cache::port::ResultStore;
use tessera_core::common::time::RealTimeProvider;
use tessera_engine::chart::ChartService;
use tessera_engine::compute::ComputationEngine;
use tessera_manager::monitor::{Monitor, MonitorConfig};
use tessera_manager::reconcile::ReconciliationScheduler;
use tessera_store::results::SqliteResultStore;
use tessera_store::universe::SqliteUniverseSource;
use tessera_strategy::builtin_registry;
use tokio::sync::watch;
use tracing::{error, info};

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入到引擎与调度器。
///
/// # Logic
/// 1. 加载配置并初始化全局日志。
/// 2. 实例化基础设施层（结果库、行情库）。
/// 3. 构造计算引擎、对账调度器与监控循环。
/// 4. 启动监控循环与 HTTP 服务。
/// 5. 收到 Ctrl-C 或服务异常退出后广播关闭信号，等待监控循环结束当前轮次。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = settings::load(settings::DEFAULT_CONFIG_PATH)?;
    let _log_guard = logging::init(&config.log)?;
    info!("Tessera starting...");

    // 2. 基础设施层
    let data_dir = Path::new(&config.database.data_dir);
    let results_path = data_dir.join(&config.database.results_db);
    let market_path = data_dir.join(&config.database.market_db);
    let store: Arc<dyn ResultStore> = Arc::new(SqliteResultStore::open(&results_path).await?);
    let source = Arc::new(SqliteUniverseSource::open(&market_path).await?);
    info!(
        "Opened result cache {} and market data {}",
        results_path.display(),
        market_path.display()
    );

    // 3. 领域服务
    let registry = Arc::new(builtin_registry()?);
    let (monitor_config, scheduler_config) = MonitorConfig::from_settings(&config.monitor);
    let engine = Arc::new(
        ComputationEngine::new(
            registry,
            store.clone(),
            source,
            Arc::new(RealTimeProvider),
            chrono::Duration::seconds(config.cache.ttl_secs),
        )
        .with_min_rows(scheduler_config.min_rows),
    );
    let scheduler = Arc::new(ReconciliationScheduler::new(engine.clone(), scheduler_config));
    let monitor = Monitor::new(scheduler, store, monitor_config);

    // 4. 后台任务
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { monitor.run(shutdown).await }
    });

    let state = AppState::new(Arc::new(ChartService::new(engine)));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let mut server_task =
        tokio::spawn(async move { start_server(state, &bind_addr, shutdown_rx).await });

    // 5. 等待退出
    let server_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, waiting for the current cycle...");
            None
        }
        result = &mut server_task => {
            error!("API server exited unexpectedly");
            Some(result)
        }
    };
    shutdown_tx.send_replace(true);

    let server_result = match server_exit {
        Some(result) => result,
        None => server_task.await,
    };
    monitor_task.await?;
    server_result??;

    info!("Tessera stopped");
    Ok(())
}
