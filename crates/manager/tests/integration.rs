use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tessera_cache::mem::MemResultStore;
use tessera_core::cache::entity::{CacheKey, CachedResult, ResultEntry};
use tessera_core::cache::error::CacheError;
use tessera_core::cache::port::ResultStore;
use tessera_core::common::time::FakeClockProvider;
use tessera_core::market::entity::{TimeSeries, Universe};
use tessera_core::market::entity::Field;
use tessera_core::strategy::entity::{
    ChartConfig, Columns, Computation, StrategyOutput, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::port::{SelfBasedStrategy, Strategy, StrategyMeta};
use tessera_core::strategy::registry::StrategyRegistry;
use tessera_core::test_utils::{StaticUniverseSource, series_from_closes};
use tessera_engine::compute::ComputationEngine;
use tessera_manager::error::ManagerError;
use tessera_manager::monitor::{Monitor, MonitorConfig};
use tessera_manager::reconcile::{
    CycleState, ReconciliationScheduler, SchedulerConfig, missing_combinations,
};
use tessera_store::results::SqliteResultStore;
use tessera_strategy::builtin_registry;
use tokio::sync::watch;

/// 写入包含指定标的的批次时失败的存储
struct FlakyStore {
    inner: MemResultStore,
    poisoned: String,
}

#[async_trait]
impl ResultStore for FlakyStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>, CacheError> {
        self.inner.get(key).await
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        output: &StrategyOutput,
        now: DateTime<Utc>,
    ) -> Result<CachedResult, CacheError> {
        self.inner.upsert(key, output, now).await
    }

    async fn upsert_batch(
        &self,
        entries: &[ResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, CacheError> {
        if entries.iter().any(|e| e.key.entity_id == self.poisoned) {
            return Err(CacheError::Write("simulated batch failure".to_string()));
        }
        self.inner.upsert_batch(entries, now).await
    }

    async fn cached_pairs(&self) -> Result<HashSet<(String, String)>, CacheError> {
        self.inner.cached_pairs().await
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        self.inner.clear().await
    }
}

/// 总是失败的自身型策略
struct Broken;

impl StrategyMeta for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }
    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new()
    }
    fn chart_config(&self, _: &StrategyParams) -> ChartConfig {
        ChartConfig::new("broken", "broken")
    }
}

impl SelfBasedStrategy for Broken {
    fn compute(&self, _: &TimeSeries, _: &StrategyParams) -> Result<Computation, StrategyError> {
        Err(StrategyError::InvalidInput("always fails".to_string()))
    }
}

/// 写入时记录调度器当前阶段的存储
#[derive(Default)]
struct StateRecordingStore {
    inner: MemResultStore,
    states: OnceLock<watch::Receiver<CycleState>>,
    seen: Mutex<Vec<CycleState>>,
}

#[async_trait]
impl ResultStore for StateRecordingStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResult>, CacheError> {
        self.inner.get(key).await
    }

    async fn upsert(
        &self,
        key: &CacheKey,
        output: &StrategyOutput,
        now: DateTime<Utc>,
    ) -> Result<CachedResult, CacheError> {
        self.inner.upsert(key, output, now).await
    }

    async fn upsert_batch(
        &self,
        entries: &[ResultEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, CacheError> {
        if let Some(states) = self.states.get() {
            self.seen.lock().unwrap().push(*states.borrow());
        }
        self.inner.upsert_batch(entries, now).await
    }

    async fn cached_pairs(&self) -> Result<HashSet<(String, String)>, CacheError> {
        self.inner.cached_pairs().await
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        self.inner.clear().await
    }
}

/// 记录同时执行中的 `compute` 调用峰值的策略
struct Gauge {
    name: &'static str,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl StrategyMeta for Gauge {
    fn name(&self) -> &'static str {
        self.name
    }
    fn default_parameters(&self) -> StrategyParams {
        StrategyParams::new()
    }
    fn chart_config(&self, _: &StrategyParams) -> ChartConfig {
        ChartConfig::new("gauge", "gauge")
    }
}

impl SelfBasedStrategy for Gauge {
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        // 占住阻塞线程一段时间，让并发任务有机会重叠
        let started = Instant::now();
        while started.elapsed() < std::time::Duration::from_millis(20) {
            std::hint::spin_loop();
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let mut columns = Columns::new();
        columns.insert(
            "close".to_string(),
            series.column(Field::Close).into_iter().map(Some).collect(),
        );
        Ok(Computation {
            columns,
            params: params.clone(),
        })
    }
}

fn rising(entity_id: &str, start: f64) -> TimeSeries {
    let closes: Vec<f64> = (0..30u32).map(|i| start + f64::from(i) * 0.5).collect();
    series_from_closes(entity_id, &closes)
}

fn source() -> Arc<StaticUniverseSource> {
    Arc::new(StaticUniverseSource::from_series(vec![
        rising("A", 10.0),
        rising("B", 20.0),
        series_from_closes("SHORT", &[5.0]),
    ]))
}

fn engine(
    registry: StrategyRegistry,
    store: Arc<dyn ResultStore>,
    source: Arc<StaticUniverseSource>,
) -> Arc<ComputationEngine> {
    let clock = Arc::new(FakeClockProvider::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ));
    Arc::new(ComputationEngine::new(
        Arc::new(registry),
        store,
        source,
        clock,
        Duration::hours(24),
    ))
}

fn scheduler(engine: Arc<ComputationEngine>) -> ReconciliationScheduler {
    ReconciliationScheduler::new(
        engine,
        SchedulerConfig {
            max_concurrency: 2,
            entity_chunk: 1,
            min_rows: 2,
        },
    )
}

#[test]
fn test_missing_combinations() {
    let universe: Universe = vec![
        series_from_closes("A", &[1.0, 2.0]),
        series_from_closes("B", &[1.0, 2.0]),
    ]
    .into_iter()
    .collect();
    let registry = builtin_registry().unwrap();
    let mut cached = HashSet::new();
    for name in registry.list() {
        cached.insert(("A".to_string(), name.to_string()));
    }
    cached.remove(&("A".to_string(), "ma".to_string()));

    let missing = missing_combinations(&universe, &registry, &cached);
    assert_eq!(missing["A"], vec!["ma".to_string()]);
    assert_eq!(missing["B"].len(), registry.len());
    assert_eq!(missing["B"][0], "volume");

    for name in registry.list() {
        cached.insert(("B".to_string(), name.to_string()));
    }
    cached.insert(("A".to_string(), "ma".to_string()));
    assert!(missing_combinations(&universe, &registry, &cached).is_empty());
}

#[tokio::test]
async fn test_full_cycle_fills_every_gap() {
    let store = Arc::new(MemResultStore::new());
    let registry = builtin_registry().unwrap();
    let total = registry.len();
    let scheduler = scheduler(engine(registry, store.clone(), source()));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.entities, 2);
    assert_eq!(report.skipped_entities, 1);
    assert_eq!(report.missing_pairs, 2 * total);
    assert_eq!(report.cross_written, 2);
    assert_eq!(report.self_written, 2 * (total - 1));
    assert_eq!(report.failed_items, 0);
    assert_eq!(report.failed_batches, 0);
    assert_eq!(scheduler.state(), CycleState::Idle);

    let pairs = store.cached_pairs().await.unwrap();
    assert_eq!(pairs.len(), 2 * total);
    assert!(pairs.iter().all(|(entity, _)| entity != "SHORT"));

    // 第二轮没有缺口
    let again = scheduler.run_cycle().await.unwrap();
    assert_eq!(again.missing_pairs, 0);
    assert_eq!(again.written(), 0);
    assert_eq!(store.len(), 2 * total);
}

#[tokio::test]
async fn test_failed_batch_does_not_abort_cycle() {
    let store = Arc::new(FlakyStore {
        inner: MemResultStore::new(),
        poisoned: "B".to_string(),
    });
    let registry = builtin_registry().unwrap();
    let total = registry.len();
    let scheduler = scheduler(engine(registry, store.clone(), source()));

    let report = scheduler.run_cycle().await.unwrap();
    // 截面批次与 B 的自身批次各失败一次
    assert_eq!(report.failed_batches, 2);
    assert_eq!(report.cross_written, 0);
    assert_eq!(report.self_written, total - 1);

    let pairs = store.cached_pairs().await.unwrap();
    assert!(pairs.contains(&("A".to_string(), "ma".to_string())));
    assert!(!pairs.iter().any(|(entity, _)| entity == "B"));
}

#[tokio::test]
async fn test_failed_item_is_counted() {
    let store = Arc::new(MemResultStore::new());
    let mut registry = builtin_registry().unwrap();
    registry.register(Strategy::self_based(Broken)).unwrap();
    let total = registry.len();
    let scheduler = scheduler(engine(registry, store.clone(), source()));

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.failed_items, 2);
    assert_eq!(report.written(), 2 * (total - 1));

    // 失败的组合在下一轮仍被视为缺失
    let again = scheduler.run_cycle().await.unwrap();
    assert_eq!(again.missing_pairs, 2);
    assert_eq!(again.failed_items, 2);
}

#[tokio::test]
async fn test_self_pass_respects_concurrency_cap() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = StrategyRegistry::new();
    for name in ["gauge_a", "gauge_b", "gauge_c"] {
        registry
            .register(Strategy::self_based(Gauge {
                name,
                active: active.clone(),
                peak: peak.clone(),
            }))
            .unwrap();
    }
    let entities: Vec<TimeSeries> = (0..6u32)
        .map(|i| rising(&format!("E{}", i), 10.0 + f64::from(i)))
        .collect();
    let source = Arc::new(StaticUniverseSource::from_series(entities));
    let store = Arc::new(MemResultStore::new());
    let scheduler = ReconciliationScheduler::new(
        engine(registry, store.clone(), source),
        SchedulerConfig {
            max_concurrency: 2,
            entity_chunk: 6,
            min_rows: 2,
        },
    );

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.self_written, 18);
    assert_eq!(report.failed_items, 0);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency {} exceeds the cap", peak);
    assert!(peak > 1, "self pass never ran tasks in parallel");
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_every_batch_write_happens_in_persist_state() {
    let store = Arc::new(StateRecordingStore::default());
    let registry = builtin_registry().unwrap();
    let scheduler = scheduler(engine(registry, store.clone(), source()));
    store.states.set(scheduler.subscribe()).unwrap();

    let report = scheduler.run_cycle().await.unwrap();
    assert_eq!(report.cross_written, 2);

    // 一个截面批次加 A、B 各一个自身批次
    let seen = store.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|state| *state == CycleState::Persist));
    assert_eq!(scheduler.state(), CycleState::Idle);
}

#[tokio::test]
async fn test_snapshot_failure_returns_to_idle() {
    let source = source();
    source.set_fail_loads(true);
    let store = Arc::new(MemResultStore::new());
    let scheduler = scheduler(engine(builtin_registry().unwrap(), store.clone(), source));
    let mut states = scheduler.subscribe();

    let err = scheduler.run_cycle().await.unwrap_err();
    assert!(matches!(err, ManagerError::DataUnavailable(_)));
    assert_eq!(scheduler.state(), CycleState::Idle);
    assert_eq!(*states.borrow_and_update(), CycleState::Idle);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_monitor_clears_stale_results_on_start() {
    let store = Arc::new(MemResultStore::new());
    let stale = CacheKey::new("GONE", "ma", "deadbeef");
    let output = StrategyOutput {
        data: Default::default(),
        config: ChartConfig::new("main_chart", "Moving Averages"),
    };
    store
        .upsert(&stale, &output, Utc::now())
        .await
        .unwrap();

    let registry = builtin_registry().unwrap();
    let total = registry.len();
    let scheduler = Arc::new(scheduler(engine(registry, store.clone(), source())));
    let monitor = Monitor::new(
        scheduler,
        store.clone(),
        MonitorConfig {
            interval: std::time::Duration::from_millis(10),
            clear_on_start: true,
        },
    );

    let reports = monitor.run_cycles(2).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].as_ref().unwrap().written(), 2 * total);
    assert_eq!(reports[1].as_ref().unwrap().written(), 0);
    assert!(store.get(&stale).await.unwrap().is_none());
}

#[tokio::test]
async fn test_monitor_stops_on_shutdown() {
    let source = source();
    let store = Arc::new(MemResultStore::new());
    let registry = builtin_registry().unwrap();
    let total = registry.len();
    let scheduler = Arc::new(scheduler(engine(registry, store.clone(), source.clone())));
    let monitor = Arc::new(Monitor::new(
        scheduler,
        store.clone(),
        MonitorConfig {
            interval: std::time::Duration::from_secs(3600),
            clear_on_start: false,
        },
    ));

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(rx).await }
    });

    // 等待首轮写满后发出关闭信号
    tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while store.len() < 2 * total {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.universe_loads(), 1);
}

#[tokio::test]
async fn test_cycle_against_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteResultStore::open(dir.path().join("results.db"))
            .await
            .unwrap(),
    );
    let registry = builtin_registry().unwrap();
    let total = registry.len();
    let scheduler = scheduler(engine(registry, store.clone(), source()));

    let first = scheduler.run_cycle().await.unwrap();
    assert_eq!(first.written(), 2 * total);
    let second = scheduler.run_cycle().await.unwrap();
    assert_eq!(second.missing_pairs, 0);
    assert_eq!(store.cached_pairs().await.unwrap().len(), 2 * total);
}
