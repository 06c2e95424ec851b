use crate::market::entity::{TimeSeries, Universe};
use crate::market::error::MarketError;
use async_trait::async_trait;

/// # Summary
/// 全市场历史序列的数据源接口 (Port)。
///
/// # Invariants
/// - 返回的序列已完成归一化：日期升序唯一，无效数值为 NaN。
/// - 实现类必须保证线程安全 (`Send` + `Sync`)。
#[async_trait]
pub trait UniverseSource: Send + Sync {
    /// # Summary
    /// 加载全市场快照。
    ///
    /// # Logic
    /// 1. 读取所有标的的全部日线。
    /// 2. 归一化数值与日期后按标的分组。
    ///
    /// # Returns
    /// 成功返回 `Universe`，失败返回 `MarketError`。
    async fn load_universe(&self) -> Result<Universe, MarketError>;

    /// # Summary
    /// 加载单个标的的序列。
    ///
    /// # Arguments
    /// * `entity_id`: 标的代码。
    ///
    /// # Returns
    /// 标的存在返回 `Some(TimeSeries)`，否则返回 `None`。
    async fn load_series(&self, entity_id: &str) -> Result<Option<TimeSeries>, MarketError>;
}
