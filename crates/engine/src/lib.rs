//! # `tessera-engine` - 计算引擎
//!
//! 唯一的 "计算并缓存" 路径，以及基于它的图表读取契约。

pub mod chart;
pub mod compute;
