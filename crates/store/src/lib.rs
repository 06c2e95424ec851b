//! # `tessera-store` - SQLite 适配器
//!
//! - [`results::SqliteResultStore`]: 策略结果缓存表 `strategy_results`。
//! - [`universe::SqliteUniverseSource`]: 日线表 `daily_bars` 的全市场数据源。

mod pool;
pub mod results;
pub mod universe;

pub use pool::StoreError;
