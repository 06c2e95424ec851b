//! # `tessera-manager` - 调度层
//!
//! 全市场对账调度器 (补齐缺失的策略结果) 与周期性运行它的监控循环。

pub mod error;
pub mod monitor;
pub mod reconcile;
