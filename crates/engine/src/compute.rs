use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::cache::entity::CacheKey;
use tessera_core::cache::port::ResultStore;
use tessera_core::common::time::TimeProvider;
use tessera_core::engine::error::EngineError;
use tessera_core::market::entity::{TimeSeries, Universe};
use tessera_core::market::port::UniverseSource;
use tessera_core::strategy::entity::{
    Columns, CrossComputation, OutputConfig, StrategyOutput, StrategyParams,
};
use tessera_core::strategy::error::StrategyError;
use tessera_core::strategy::params::params_hash;
use tessera_core::strategy::port::Strategy;
use tessera_core::strategy::registry::StrategyRegistry;
use tracing::{debug, warn};

/// 默认的最少行数，低于该行数的标的不参与计算
pub const DEFAULT_MIN_ROWS: usize = 2;

/// # Summary
/// 单个 `(标的, 策略)` 的计算结果：成功时为结果文档，失败时为内联错误。
///
/// # Invariants
/// - JSON 无标签表示：成功为 `{data, config}`，失败为 `{"error": "..."}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategyOutcome {
    Computed(StrategyOutput),
    Failed { error: String },
}

impl StrategyOutcome {
    pub fn is_computed(&self) -> bool {
        matches!(self, StrategyOutcome::Computed(_))
    }

    pub fn output(&self) -> Option<&StrategyOutput> {
        match self {
            StrategyOutcome::Computed(output) => Some(output),
            StrategyOutcome::Failed { .. } => None,
        }
    }
}

/// # Summary
/// 由生效参数构造缓存键。
pub fn cache_key(entity_id: &str, strategy: &Strategy, effective: &StrategyParams) -> CacheKey {
    CacheKey::new(entity_id, strategy.name(), params_hash(effective))
}

/// # Summary
/// 将输出列与可视化配置打包为结果文档。
///
/// # Logic
/// 1. 由生效参数推导图表配置。
/// 2. 没有显式配置的输出列补充兜底配置。
/// 3. 去掉没有对应输出列的配置项，保证两侧键集合一致。
pub fn package(strategy: &Strategy, columns: Columns, effective: &StrategyParams) -> StrategyOutput {
    let mut config = strategy.chart_config(effective);
    for name in columns.keys() {
        config
            .outputs
            .entry(name.clone())
            .or_insert_with(|| OutputConfig::fallback(name));
    }
    config.outputs.retain(|name, _| columns.contains_key(name));
    StrategyOutput {
        data: columns,
        config,
    }
}

/// # Summary
/// 对单个标的执行自身型策略并打包。
///
/// # Returns
/// `(生效参数, 结果文档)`；策略为截面型时返回计算错误。
pub fn evaluate_self(
    strategy: &Strategy,
    series: &TimeSeries,
    params: &StrategyParams,
) -> Result<(StrategyParams, StrategyOutput), EngineError> {
    let Strategy::SelfBased(inner) = strategy else {
        return Err(EngineError::Computation(StrategyError::InvalidInput(
            format!("{} requires the whole universe", strategy.name()),
        )));
    };
    let computation = inner.compute(series, params)?;
    let output = package(strategy, computation.columns, &computation.params);
    Ok((computation.params, output))
}

/// # Summary
/// 对全市场执行一次截面型策略。
pub fn evaluate_cross(
    strategy: &Strategy,
    universe: &Universe,
    params: &StrategyParams,
) -> Result<CrossComputation, EngineError> {
    let Strategy::CrossBased(inner) = strategy else {
        return Err(EngineError::Computation(StrategyError::InvalidInput(
            format!("{} is not a cross-based strategy", strategy.name()),
        )));
    };
    inner.compute(universe, params).map_err(EngineError::from)
}

/// # Summary
/// 计算引擎：带缓存的策略求值。
///
/// # Invariants
/// - 注册表、存储、数据源与时钟均在构造时注入，引擎本身不持有可变状态。
/// - 新鲜的缓存命中不会触发任何计算。
pub struct ComputationEngine {
    registry: Arc<StrategyRegistry>,
    store: Arc<dyn ResultStore>,
    source: Arc<dyn UniverseSource>,
    clock: Arc<dyn TimeProvider>,
    ttl: Duration,
    min_rows: usize,
}

impl ComputationEngine {
    /// # Summary
    /// 创建引擎实例。
    ///
    /// # Arguments
    /// * `registry` - 策略注册表。
    /// * `store` - 结果缓存。
    /// * `source` - 行情数据源。
    /// * `clock` - 时间供给器，决定新鲜度与写入时间。
    /// * `ttl` - 缓存有效期。
    pub fn new(
        registry: Arc<StrategyRegistry>,
        store: Arc<dyn ResultStore>,
        source: Arc<dyn UniverseSource>,
        clock: Arc<dyn TimeProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            source,
            clock,
            ttl,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }

    /// 设置参与计算的最少行数
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn UniverseSource> {
        &self.source
    }

    pub fn clock(&self) -> &Arc<dyn TimeProvider> {
        &self.clock
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }

    /// # Summary
    /// 计算并缓存，失败以内联错误返回，不向调用方抛出。
    pub async fn compute_and_cache(
        &self,
        entity_id: &str,
        strategy: &Strategy,
        params: &StrategyParams,
    ) -> StrategyOutcome {
        match self.try_compute_and_cache(entity_id, strategy, params).await {
            Ok(output) => StrategyOutcome::Computed(output),
            Err(e) => {
                warn!("Strategy {} failed for {}: {}", strategy.name(), entity_id, e);
                StrategyOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// # Summary
    /// 计算并缓存。
    ///
    /// # Logic
    /// 1. 显式参数覆盖默认参数，得到生效参数并计算摘要。
    /// 2. 缓存中存在新鲜结果时直接返回。
    /// 3. 否则加载数据：自身型读取单个标的，截面型读取全市场后切片。
    /// 4. 打包结果文档并写回缓存。
    ///
    /// # Returns
    /// 结果文档；任一步失败返回 `EngineError`。缓存读取失败视为未命中。
    pub async fn try_compute_and_cache(
        &self,
        entity_id: &str,
        strategy: &Strategy,
        params: &StrategyParams,
    ) -> Result<StrategyOutput, EngineError> {
        let effective = strategy.resolve_params(params);
        let key = cache_key(entity_id, strategy, &effective);
        let now = self.clock.now();

        match self.store.get(&key).await {
            Ok(Some(hit)) if hit.is_fresh(now, self.ttl) => {
                debug!("Cache hit for {}/{}", entity_id, strategy.name());
                return Ok(hit.output);
            }
            Ok(_) => {}
            Err(e) => warn!(
                "Cache read failed for {}/{}, recomputing: {}",
                entity_id,
                strategy.name(),
                e
            ),
        }

        let output = match strategy {
            Strategy::SelfBased(_) => {
                let series = self
                    .source
                    .load_series(entity_id)
                    .await?
                    .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
                self.ensure_rows(&series)?;
                evaluate_self(strategy, &series, &effective)?.1
            }
            Strategy::CrossBased(_) => {
                let snapshot = self.source.load_universe().await?;
                let series = snapshot
                    .get(entity_id)
                    .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
                self.ensure_rows(series)?;
                let universe = snapshot.eligible(self.min_rows);
                let computation = evaluate_cross(strategy, &universe, &effective)?;
                let columns = computation.slice(entity_id).ok_or_else(|| {
                    EngineError::DataUnavailable(format!("no result for {}", entity_id))
                })?;
                package(strategy, columns, &computation.params)
            }
        };

        self.store.upsert(&key, &output, now).await?;
        Ok(output)
    }

    fn ensure_rows(&self, series: &TimeSeries) -> Result<(), EngineError> {
        if series.len() < self.min_rows {
            return Err(EngineError::DataUnavailable(format!(
                "{} has {} rows, at least {} required",
                series.entity_id(),
                series.len(),
                self.min_rows
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::strategy::entity::{ChartConfig, Computation};
    use tessera_core::strategy::port::{SelfBasedStrategy, StrategyMeta};

    struct TwoColumns;

    impl StrategyMeta for TwoColumns {
        fn name(&self) -> &'static str {
            "two"
        }
        fn default_parameters(&self) -> StrategyParams {
            StrategyParams::new()
        }
        fn chart_config(&self, _: &StrategyParams) -> ChartConfig {
            ChartConfig::new("two", "Two")
                .with_output("a", OutputConfig::line("A", "#000000", 2))
                .with_output("stale", OutputConfig::line("S", "#000000", 3))
        }
    }

    impl SelfBasedStrategy for TwoColumns {
        fn compute(
            &self,
            _: &TimeSeries,
            params: &StrategyParams,
        ) -> Result<Computation, StrategyError> {
            Ok(Computation {
                columns: Columns::new(),
                params: params.clone(),
            })
        }
    }

    #[test]
    fn test_package_fills_fallback_and_drops_orphans() {
        let strategy = Strategy::self_based(TwoColumns);
        let mut columns = Columns::new();
        columns.insert("a".to_string(), vec![Some(1.0)]);
        columns.insert("b".to_string(), vec![None]);
        let output = package(&strategy, columns, &StrategyParams::new());

        assert_eq!(output.config.outputs.len(), 2);
        assert_eq!(output.config.outputs["a"].order, 2);
        assert_eq!(output.config.outputs["b"], OutputConfig::fallback("b"));
        assert!(!output.config.outputs.contains_key("stale"));
    }

    #[test]
    fn test_outcome_serialization() {
        let failed = StrategyOutcome::Failed {
            error: "Strategy not found: kdj".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"error": "Strategy not found: kdj"})
        );
        assert!(!failed.is_computed());
    }
}
