use crate::cross::RankPercentage;
use crate::oscillator::{RelativeReturn, Rsi};
use crate::trend::{Macd, MovingAverage};
use crate::volume::{DaysSinceVolumeExtreme, Volume, VolumeExtremeToday};
use tessera_core::strategy::port::Strategy;
use tessera_core::strategy::registry::{RegistryError, StrategyRegistry};
use tracing::info;

/// # Summary
/// 内置策略的显式注册表。
///
/// # Logic
/// 1. 按固定顺序构造全部内置策略实例。
/// 2. 交给 `StrategyRegistry::from_strategies` 校验名称唯一。
///
/// # Returns
/// 注册表在进程启动时构建一次，由调用方以 `Arc` 共享。
pub fn builtin_registry() -> Result<StrategyRegistry, RegistryError> {
    let registry = StrategyRegistry::from_strategies(vec![
        Strategy::self_based(Volume),
        Strategy::self_based(Macd),
        Strategy::self_based(Rsi),
        Strategy::self_based(VolumeExtremeToday::highest()),
        Strategy::self_based(VolumeExtremeToday::lowest()),
        Strategy::self_based(DaysSinceVolumeExtreme::highest()),
        Strategy::self_based(DaysSinceVolumeExtreme::lowest()),
        Strategy::self_based(MovingAverage),
        Strategy::self_based(RelativeReturn),
        Strategy::cross_based(RankPercentage),
    ])?;
    info!("Registered {} builtin strategies", registry.len());
    Ok(registry)
}
