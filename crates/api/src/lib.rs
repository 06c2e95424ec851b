//! # `tessera-api` - HTTP 读取接口
//!
//! 本 crate 是策略结果缓存的 HTTP/REST 服务入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收来自前端或脚本的图表读取请求
//! - 调用下层 `ChartService`，所有策略结果都经由计算引擎的缓存路径获得
//! - 将领域模型转换为 DTO 返回给前端

pub mod error;
pub mod routes;
pub mod server;
pub mod types;
