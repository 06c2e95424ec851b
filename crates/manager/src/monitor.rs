use crate::error::ManagerError;
use crate::reconcile::{CycleReport, ReconciliationScheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::cache::port::ResultStore;
use tessera_core::config::MonitorSettings;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// # Summary
/// 监控循环配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    // 两轮对账之间的休眠时长
    pub interval: Duration,
    // 首轮之前清空全部缓存
    pub clear_on_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            clear_on_start: false,
        }
    }
}

impl MonitorConfig {
    /// 由配置文件中的 `[monitor]` 段拆出循环与调度两部分参数
    pub fn from_settings(settings: &MonitorSettings) -> (Self, SchedulerConfig) {
        (
            Self {
                interval: Duration::from_secs(settings.interval_secs),
                clear_on_start: settings.clear_on_start,
            },
            SchedulerConfig {
                max_concurrency: settings.max_concurrency.max(1),
                entity_chunk: settings.entity_chunk.max(1),
                min_rows: settings.min_rows,
            },
        )
    }
}

/// # Summary
/// 周期性运行对账调度器的后台循环。
///
/// # Invariants
/// - 任何单轮失败都只记录日志，循环继续。
/// - 关闭信号在休眠期间也能立即生效。
pub struct Monitor {
    scheduler: Arc<ReconciliationScheduler>,
    store: Arc<dyn ResultStore>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        scheduler: Arc<ReconciliationScheduler>,
        store: Arc<dyn ResultStore>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            scheduler,
            store,
            config,
        }
    }

    pub fn scheduler(&self) -> &Arc<ReconciliationScheduler> {
        &self.scheduler
    }

    async fn clear_if_configured(&self) {
        if !self.config.clear_on_start {
            return;
        }
        match self.store.clear().await {
            Ok(n) => info!("Cleared {} cached results before first cycle", n),
            Err(e) => warn!("Failed to clear cache on start: {}", e),
        }
    }

    fn log_cycle(result: &Result<CycleReport, ManagerError>) {
        match result {
            Ok(report) => info!(
                "Reconciliation finished in {:?}: {} written ({} cross, {} self), {} failed items, {} failed batches",
                report.elapsed,
                report.written(),
                report.cross_written,
                report.self_written,
                report.failed_items,
                report.failed_batches
            ),
            Err(e) => error!("Reconciliation cycle failed: {}", e),
        }
    }

    /// # Summary
    /// 运行监控循环直到收到关闭信号。
    ///
    /// # Logic
    /// 1. 按配置清空缓存，失败仅告警。
    /// 2. 循环：检查关闭信号，执行一轮对账，然后休眠 `interval`。
    /// 3. 休眠期间关闭信号变为 `true` 或发送端被丢弃时退出。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Monitor started, interval {:?}, clear_on_start {}",
            self.config.interval, self.config.clear_on_start
        );
        self.clear_if_configured().await;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let result = self.scheduler.run_cycle().await;
            Self::log_cycle(&result);

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Monitor stopped");
    }

    /// # Summary
    /// 连续执行 `n` 轮对账，不休眠，用于一次性补算与测试。
    pub async fn run_cycles(&self, n: usize) -> Vec<Result<CycleReport, ManagerError>> {
        self.clear_if_configured().await;
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            let result = self.scheduler.run_cycle().await;
            Self::log_cycle(&result);
            reports.push(result);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_clamps_concurrency() {
        let settings = MonitorSettings {
            interval_secs: 60,
            clear_on_start: true,
            max_concurrency: 0,
            entity_chunk: 0,
            min_rows: 3,
        };
        let (monitor, scheduler) = MonitorConfig::from_settings(&settings);
        assert_eq!(monitor.interval, Duration::from_secs(60));
        assert!(monitor.clear_on_start);
        assert_eq!(scheduler.max_concurrency, 1);
        assert_eq!(scheduler.entity_chunk, 1);
        assert_eq!(scheduler.min_rows, 3);
    }
}
