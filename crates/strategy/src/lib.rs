//! # `tessera-strategy` - 内置策略
//!
//! 自身型指标 (均线、MACD、RSI、成交量系列、相对收益) 与截面型排名策略，
//! 以及进程启动时一次性构建的内置注册表。

pub mod builtin;
pub mod cross;
pub mod oscillator;
pub mod rolling;
pub mod trend;
pub mod volume;

pub use builtin::builtin_registry;
