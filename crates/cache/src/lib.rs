//! # `tessera-cache` - 内存结果缓存
//!
//! `ResultStore` 的 DashMap 实现，用于测试与单进程嵌入场景。

pub mod mem;
