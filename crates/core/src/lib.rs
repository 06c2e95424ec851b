//! # `tessera-core` - 领域核心
//!
//! 定义策略结果缓存系统的领域实体、端口 (Port) 与错误类型。
//! 本 crate 不依赖任何具体的存储或运行时实现，
//! 上层 crate 通过 `Arc<dyn Trait>` 注入具体适配器。

pub mod common;
pub mod config;

pub mod market {
    pub mod entity;
    pub mod error;
    pub mod port;
}

pub mod strategy {
    pub mod entity;
    pub mod error;
    pub mod params;
    pub mod port;
    pub mod registry;
}

pub mod cache {
    pub mod entity;
    pub mod error;
    pub mod port;
}

pub mod engine {
    pub mod error;
}

#[cfg(feature = "test-utils")]
pub mod test_utils;
