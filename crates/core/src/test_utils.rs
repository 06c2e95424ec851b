//! 测试辅助：内存数据源与序列构造器，仅在 `test-utils` feature 下编译。

use crate::market::entity::{Bar, TimeSeries, Universe};
use crate::market::error::MarketError;
use crate::market::port::UniverseSource;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 序列起始日期
pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default()
}

/// 构造第 `offset` 个交易日的日线，开高低收均取 `close`
pub fn bar(offset: u64, close: f64, volume: f64) -> Bar {
    Bar {
        date: base_date()
            .checked_add_days(Days::new(offset))
            .unwrap_or_else(base_date),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        amount: close * volume,
    }
}

/// 由收盘价序列构造，成交量恒为 1000
pub fn series_from_closes(entity_id: &str, closes: &[f64]) -> TimeSeries {
    TimeSeries::new(
        entity_id,
        closes
            .iter()
            .zip(0u64..)
            .map(|(c, i)| bar(i, *c, 1000.0))
            .collect(),
    )
}

/// 由成交量序列构造，收盘价恒为 10
pub fn series_from_volumes(entity_id: &str, volumes: &[f64]) -> TimeSeries {
    TimeSeries::new(
        entity_id,
        volumes
            .iter()
            .zip(0u64..)
            .map(|(v, i)| bar(i, 10.0, *v))
            .collect(),
    )
}

/// # Summary
/// 基于 DashMap 的内存数据源。
///
/// # Invariants
/// - `fail_loads` 打开后 `load_universe` 始终返回存储错误，用于模拟快照失败。
#[derive(Default)]
pub struct StaticUniverseSource {
    series: DashMap<String, TimeSeries>,
    universe_loads: AtomicUsize,
    fail_loads: AtomicBool,
}

impl StaticUniverseSource {
    pub fn new(universe: Universe) -> Self {
        let source = Self::default();
        for s in universe.iter() {
            source.series.insert(s.entity_id().to_string(), s.clone());
        }
        source
    }

    pub fn from_series(series: impl IntoIterator<Item = TimeSeries>) -> Self {
        Self::new(series.into_iter().collect())
    }

    pub fn insert(&self, series: TimeSeries) {
        self.series.insert(series.entity_id().to_string(), series);
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// `load_universe` 被调用的次数
    pub fn universe_loads(&self) -> usize {
        self.universe_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UniverseSource for StaticUniverseSource {
    async fn load_universe(&self) -> Result<Universe, MarketError> {
        self.universe_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(MarketError::Storage("simulated load failure".to_string()));
        }
        Ok(self.series.iter().map(|e| e.value().clone()).collect())
    }

    async fn load_series(&self, entity_id: &str) -> Result<Option<TimeSeries>, MarketError> {
        Ok(self.series.get(entity_id).map(|e| e.value().clone()))
    }
}
