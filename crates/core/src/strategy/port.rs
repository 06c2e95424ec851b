use crate::market::entity::{TimeSeries, Universe};
use crate::strategy::entity::{
    ChartConfig, Computation, CrossComputation, StrategyParams, Topology,
};
use crate::strategy::error::StrategyError;
use std::sync::Arc;

/// # Summary
/// 策略的元数据能力：名称、默认参数与可视化配置。
///
/// # Invariants
/// - 实现必须是无状态的纯计算逻辑，实例在进程启动时构造后不再修改。
/// - 可视化配置只由调用方传入的生效参数推导，不读取任何上一次调用遗留的状态。
pub trait StrategyMeta: Send + Sync {
    /// 规范名称 (小写)
    fn name(&self) -> &'static str;

    /// 默认参数
    fn default_parameters(&self) -> StrategyParams;

    /// # Summary
    /// 根据生效参数推导图表配置。
    ///
    /// # Arguments
    /// * `params`: 本次计算实际使用的参数 (已合并默认值)。
    fn chart_config(&self, params: &StrategyParams) -> ChartConfig;
}

/// # Summary
/// 自身型策略：只依赖单个标的的序列。
pub trait SelfBasedStrategy: StrategyMeta {
    /// # Summary
    /// 对单个标的序列执行计算。
    ///
    /// # Logic
    /// 1. 以默认参数补齐缺失参数。
    /// 2. 计算输出列，每列与输入序列逐行对齐。
    ///
    /// # Returns
    /// 返回输出列与生效参数；参数非法或输入为空时返回 `StrategyError`。
    fn compute(
        &self,
        series: &TimeSeries,
        params: &StrategyParams,
    ) -> Result<Computation, StrategyError>;
}

/// # Summary
/// 截面型策略：需要全市场同一日期的数据联合计算。
pub trait CrossBasedStrategy: StrategyMeta {
    /// # Summary
    /// 对全市场执行一次计算并按标的拆分结果。
    fn compute(
        &self,
        universe: &Universe,
        params: &StrategyParams,
    ) -> Result<CrossComputation, StrategyError>;
}

/// # Summary
/// 注册表中保存的策略句柄，按拓扑区分两类实现。
///
/// # Invariants
/// - 克隆只复制 `Arc`，共享同一份无状态实现。
#[derive(Clone)]
pub enum Strategy {
    SelfBased(Arc<dyn SelfBasedStrategy>),
    CrossBased(Arc<dyn CrossBasedStrategy>),
}

impl Strategy {
    pub fn self_based(strategy: impl SelfBasedStrategy + 'static) -> Self {
        Strategy::SelfBased(Arc::new(strategy))
    }

    pub fn cross_based(strategy: impl CrossBasedStrategy + 'static) -> Self {
        Strategy::CrossBased(Arc::new(strategy))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SelfBased(s) => s.name(),
            Strategy::CrossBased(s) => s.name(),
        }
    }

    pub fn topology(&self) -> Topology {
        match self {
            Strategy::SelfBased(_) => Topology::SelfBased,
            Strategy::CrossBased(_) => Topology::CrossBased,
        }
    }

    pub fn default_parameters(&self) -> StrategyParams {
        match self {
            Strategy::SelfBased(s) => s.default_parameters(),
            Strategy::CrossBased(s) => s.default_parameters(),
        }
    }

    pub fn chart_config(&self, params: &StrategyParams) -> ChartConfig {
        match self {
            Strategy::SelfBased(s) => s.chart_config(params),
            Strategy::CrossBased(s) => s.chart_config(params),
        }
    }

    /// 显式参数覆盖默认参数
    pub fn resolve_params(&self, explicit: &StrategyParams) -> StrategyParams {
        explicit.merged_over(&self.default_parameters())
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name())
            .field("topology", &self.topology())
            .finish()
    }
}
