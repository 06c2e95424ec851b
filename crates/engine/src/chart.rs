use crate::compute::{ComputationEngine, StrategyOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::common::is_valid;
use tessera_core::engine::error::EngineError;
use tessera_core::market::entity::TimeSeries;
use tessera_core::strategy::entity::StrategyParams;
use tracing::info;

/// # Summary
/// 请求中的单个策略：名称与显式参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRequest {
    pub name: String,
    #[serde(default)]
    pub params: StrategyParams,
}

impl StrategyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: StrategyParams::new(),
        }
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }
}

/// # Summary
/// 图表读取请求。
///
/// # Invariants
/// - `strategies` 缺省时代表全部已注册策略，均使用默认参数。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub strategies: Option<Vec<StrategyRequest>>,
}

/// # Summary
/// 主图数据：日期轴、K 线与收盘价。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainChart {
    // YYYY-MM-DD
    pub x_data: Vec<String>,
    // [open, close, low, high]
    pub candle_data: Vec<[Option<f64>; 4]>,
    pub close_prices: Vec<Option<f64>>,
}

impl MainChart {
    fn from_series(series: &TimeSeries) -> Self {
        let value = |x: f64| is_valid(x).then_some(x);
        let bars = series.bars();
        Self {
            x_data: bars
                .iter()
                .map(|b| b.date.format("%Y-%m-%d").to_string())
                .collect(),
            candle_data: bars
                .iter()
                .map(|b| [value(b.open), value(b.close), value(b.low), value(b.high)])
                .collect(),
            close_prices: bars.iter().map(|b| value(b.close)).collect(),
        }
    }
}

/// # Summary
/// 图表文档：主图加每个策略的结果或内联错误。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub main: MainChart,
    pub strategies: BTreeMap<String, StrategyOutcome>,
}

/// # Summary
/// 图表读取服务，所有策略结果都经由计算引擎的缓存路径获得。
pub struct ChartService {
    engine: Arc<ComputationEngine>,
}

impl ChartService {
    pub fn new(engine: Arc<ComputationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ComputationEngine> {
        &self.engine
    }

    /// # Summary
    /// 构建单个标的的图表文档。
    ///
    /// # Logic
    /// 1. 校验标的代码非空并加载其序列，生成主图。
    /// 2. 依次对请求的每个策略调用 `compute_and_cache`。
    /// 3. 未注册的策略名与单个策略的失败都以 `{error}` 内联返回。
    ///
    /// # Returns
    /// 标的代码缺失返回 `BadRequest`，标的不存在返回 `EntityNotFound`。
    pub async fn build(&self, request: ChartRequest) -> Result<ChartDocument, EngineError> {
        let entity_id = request
            .entity_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EngineError::BadRequest("entity_id is required".to_string()))?;

        let series = self
            .engine
            .source()
            .load_series(entity_id)
            .await?
            .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;

        let registry = self.engine.registry();
        let requests = request.strategies.unwrap_or_else(|| {
            registry.list().into_iter().map(StrategyRequest::new).collect()
        });

        let mut strategies = BTreeMap::new();
        for req in requests {
            let outcome = match registry.get(&req.name) {
                Ok(strategy) => {
                    self.engine
                        .compute_and_cache(entity_id, &strategy, &req.params)
                        .await
                }
                Err(e) => StrategyOutcome::Failed {
                    error: EngineError::from(e).to_string(),
                },
            };
            strategies.insert(req.name, outcome);
        }

        info!(
            "Built chart for {} with {} strategies",
            entity_id,
            strategies.len()
        );
        Ok(ChartDocument {
            main: MainChart::from_series(&series),
            strategies,
        })
    }
}
