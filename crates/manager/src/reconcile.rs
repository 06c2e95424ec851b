use crate::error::ManagerError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::cache::entity::{CacheKey, ResultEntry};
use tessera_core::engine::error::EngineError;
use tessera_core::market::entity::Universe;
use tessera_core::strategy::entity::{StrategyOutput, StrategyParams, Topology};
use tessera_core::strategy::params::params_hash;
use tessera_core::strategy::port::Strategy;
use tessera_core::strategy::registry::StrategyRegistry;
use tessera_engine::compute::{ComputationEngine, cache_key, evaluate_cross, evaluate_self, package};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// # Summary
/// 对账周期的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Snapshot,
    CrossPass,
    SelfPass,
    Persist,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Idle => write!(f, "idle"),
            CycleState::Snapshot => write!(f, "snapshot"),
            CycleState::CrossPass => write!(f, "cross_pass"),
            CycleState::SelfPass => write!(f, "self_pass"),
            CycleState::Persist => write!(f, "persist"),
        }
    }
}

/// # Summary
/// 调度器配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    // 自身型计算的最大并发数
    pub max_concurrency: usize,
    // 每批处理的标的数
    pub entity_chunk: usize,
    // 参与对账的最少行数
    pub min_rows: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            entity_chunk: 32,
            min_rows: 2,
        }
    }
}

/// # Summary
/// 单轮对账的统计报告。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    // 参与对账的标的数
    pub entities: usize,
    // 行数不足被跳过的标的数
    pub skipped_entities: usize,
    // 缺失的 (标的, 策略) 组合数
    pub missing_pairs: usize,
    pub cross_written: usize,
    pub self_written: usize,
    // 计算失败的条目数
    pub failed_items: usize,
    // 写入失败的批次数
    pub failed_batches: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn written(&self) -> usize {
        self.cross_written + self.self_written
    }
}

/// # Summary
/// 计算缺失的组合：全部标的 x 全部策略，减去已有任意结果的组合。
///
/// # Invariants
/// - 不区分参数摘要，只要某个组合存在任意一条结果即视为已覆盖。
/// - 每个标的下的策略名保持注册顺序。
///
/// # Returns
/// 标的代码到缺失策略名列表的映射，不含没有缺失的标的。
pub fn missing_combinations(
    universe: &Universe,
    registry: &StrategyRegistry,
    cached: &HashSet<(String, String)>,
) -> BTreeMap<String, Vec<String>> {
    let mut missing = BTreeMap::new();
    for entity_id in universe.entity_ids() {
        let names: Vec<String> = registry
            .list()
            .into_iter()
            .filter(|name| !cached.contains(&(entity_id.to_string(), name.to_string())))
            .map(str::to_string)
            .collect();
        if !names.is_empty() {
            missing.insert(entity_id.to_string(), names);
        }
    }
    missing
}

/// 自身型计算任务的返回值
type SelfTaskResult = (String, String, Result<(StrategyParams, StrategyOutput), EngineError>);

/// # Summary
/// 全市场对账调度器。
///
/// # Invariants
/// - 截面型策略先于自身型策略执行。
/// - 截面阶段按策略写入，自身阶段按标的写入，任意两个批次不会写同一个键。
/// - 单个条目或批次失败只记录并计数，不中断本轮。
pub struct ReconciliationScheduler {
    engine: Arc<ComputationEngine>,
    config: SchedulerConfig,
    state: watch::Sender<CycleState>,
}

impl ReconciliationScheduler {
    /// # Summary
    /// 创建调度器。
    ///
    /// # Arguments
    /// * `engine` - 计算引擎，提供注册表、存储、数据源、时钟与打包逻辑。
    /// * `config` - 并发与分批配置。
    pub fn new(engine: Arc<ComputationEngine>, config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            engine,
            config,
            state,
        }
    }

    /// 订阅阶段变化
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    fn enter(&self, state: CycleState) {
        debug!("Reconciliation entering {}", state);
        self.state.send_replace(state);
    }

    /// # Summary
    /// 执行一轮完整对账。
    ///
    /// # Logic
    /// 1. SNAPSHOT：加载全市场，过滤行数不足的标的，计算缺失组合。
    /// 2. CROSS_PASS：每个截面型策略对全市场计算一次，按标的切片后在 PERSIST 中整批写入。
    /// 3. SELF_PASS / PERSIST：按标的分批并发计算，每个标的一个事务写入。
    /// 4. 无论成功与否，结束时回到 Idle。
    ///
    /// # Returns
    /// 本轮统计；快照或已缓存组合读取失败时返回错误。
    pub async fn run_cycle(&self) -> Result<CycleReport, ManagerError> {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let result = self.cycle(&mut report).await;
        self.enter(CycleState::Idle);
        report.elapsed = started.elapsed();
        result.map(|_| report)
    }

    async fn cycle(&self, report: &mut CycleReport) -> Result<(), ManagerError> {
        self.enter(CycleState::Snapshot);
        let snapshot = self
            .engine
            .source()
            .load_universe()
            .await
            .map_err(|e| ManagerError::DataUnavailable(e.to_string()))?;
        let universe = Arc::new(snapshot.eligible(self.config.min_rows));
        report.entities = universe.len();
        report.skipped_entities = snapshot.len() - universe.len();

        let cached = self.engine.store().cached_pairs().await?;
        let missing = missing_combinations(&universe, self.engine.registry(), &cached);
        report.missing_pairs = missing.values().map(Vec::len).sum();
        info!(
            "Reconciliation snapshot: {} entities, {} skipped, {} missing pairs",
            report.entities, report.skipped_entities, report.missing_pairs
        );
        if missing.is_empty() {
            return Ok(());
        }

        self.enter(CycleState::CrossPass);
        self.cross_pass(&universe, &missing, report).await;

        self.enter(CycleState::SelfPass);
        self.self_pass(&universe, &missing, report).await;
        Ok(())
    }

    /// 缺失某个策略的标的列表
    fn entities_missing<'a>(
        missing: &'a BTreeMap<String, Vec<String>>,
        name: &str,
    ) -> Vec<&'a str> {
        missing
            .iter()
            .filter(|(_, names)| names.iter().any(|n| n == name))
            .map(|(entity_id, _)| entity_id.as_str())
            .collect()
    }

    async fn cross_pass(
        &self,
        universe: &Arc<Universe>,
        missing: &BTreeMap<String, Vec<String>>,
        report: &mut CycleReport,
    ) {
        let strategies: Vec<Strategy> = self
            .engine
            .registry()
            .strategies()
            .filter(|s| s.topology() == Topology::CrossBased)
            .cloned()
            .collect();

        for strategy in strategies {
            let targets = Self::entities_missing(missing, strategy.name());
            if targets.is_empty() {
                continue;
            }

            let task_strategy = strategy.clone();
            let task_universe = Arc::clone(universe);
            let joined = tokio::task::spawn_blocking(move || {
                evaluate_cross(&task_strategy, &task_universe, &StrategyParams::new())
            })
            .await;

            let computation = match joined {
                Ok(Ok(computation)) => computation,
                Ok(Err(e)) => {
                    warn!("Cross strategy {} failed: {}", strategy.name(), e);
                    report.failed_items += targets.len();
                    continue;
                }
                Err(e) => {
                    error!("Cross strategy {} task aborted: {}", strategy.name(), e);
                    report.failed_items += targets.len();
                    continue;
                }
            };

            let mut entries = Vec::with_capacity(targets.len());
            for entity_id in targets {
                match computation.slice(entity_id) {
                    Some(columns) => entries.push(ResultEntry {
                        key: cache_key(entity_id, &strategy, &computation.params),
                        output: package(&strategy, columns, &computation.params),
                    }),
                    None => {
                        warn!(
                            "Cross strategy {} produced no slice for {}",
                            strategy.name(),
                            entity_id
                        );
                        report.failed_items += 1;
                    }
                }
            }

            self.enter(CycleState::Persist);
            match self
                .engine
                .store()
                .upsert_batch(&entries, self.engine.clock().now())
                .await
            {
                Ok(n) => report.cross_written += n,
                Err(e) => {
                    error!("Cross batch for {} failed: {}", strategy.name(), e);
                    report.failed_batches += 1;
                }
            }
            self.enter(CycleState::CrossPass);
        }
    }

    /// # Summary
    /// 自身型阶段。
    ///
    /// # Logic
    /// 1. 标的按 `entity_chunk` 分批。
    /// 2. 每个 `(标的, 策略)` 先取得信号量许可，再以 `spawn_blocking` 提交到 `JoinSet`。
    /// 3. 收齐一批后进入 PERSIST，每个标的的结果在一个事务中写入。
    async fn self_pass(
        &self,
        universe: &Arc<Universe>,
        missing: &BTreeMap<String, Vec<String>>,
        report: &mut CycleReport,
    ) {
        let registry = self.engine.registry();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let work: Vec<(&String, Vec<Strategy>)> = missing
            .iter()
            .map(|(entity_id, names)| {
                let strategies: Vec<Strategy> = names
                    .iter()
                    .filter_map(|name| registry.get(name).ok())
                    .filter(|s| s.topology() == Topology::SelfBased)
                    .collect();
                (entity_id, strategies)
            })
            .filter(|(_, strategies)| !strategies.is_empty())
            .collect();

        for chunk in work.chunks(self.config.entity_chunk.max(1)) {
            let mut tasks: JoinSet<SelfTaskResult> = JoinSet::new();
            for (entity_id, strategies) in chunk {
                for strategy in strategies {
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        error!("Concurrency limiter closed, stopping self pass");
                        return;
                    };
                    let strategy = strategy.clone();
                    let entity_id = (*entity_id).clone();
                    let universe = Arc::clone(universe);
                    tasks.spawn_blocking(move || {
                        let _permit = permit;
                        let result = match universe.get(&entity_id) {
                            Some(series) => {
                                evaluate_self(&strategy, series, &StrategyParams::new())
                            }
                            None => Err(EngineError::EntityNotFound(entity_id.clone())),
                        };
                        (entity_id, strategy.name().to_string(), result)
                    });
                }
            }

            let mut by_entity: BTreeMap<String, Vec<ResultEntry>> = BTreeMap::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((entity_id, name, Ok((params, output)))) => {
                        let key = CacheKey::new(entity_id.clone(), name, params_hash(&params));
                        by_entity
                            .entry(entity_id)
                            .or_default()
                            .push(ResultEntry { key, output });
                    }
                    Ok((entity_id, name, Err(e))) => {
                        warn!("Strategy {} failed for {}: {}", name, entity_id, e);
                        report.failed_items += 1;
                    }
                    Err(e) => {
                        error!("Self-based task aborted: {}", e);
                        report.failed_items += 1;
                    }
                }
            }

            self.enter(CycleState::Persist);
            let now = self.engine.clock().now();
            for (entity_id, entries) in by_entity {
                match self.engine.store().upsert_batch(&entries, now).await {
                    Ok(n) => report.self_written += n,
                    Err(e) => {
                        error!("Batch for {} failed: {}", entity_id, e);
                        report.failed_batches += 1;
                    }
                }
            }
            self.enter(CycleState::SelfPass);
        }
    }
}
