//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。
//! 策略结果文档结构随策略变化，统一以 `Object` 出现在文档中。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_core::strategy::entity::StrategyParams;
use tessera_core::strategy::port::Strategy;
use tessera_engine::chart::{ChartDocument, ChartRequest, MainChart, StrategyRequest};
use tessera_engine::compute::StrategyOutcome;
use utoipa::ToSchema;

// ============================================================
//  策略目录 DTO
// ============================================================

/// 已注册策略的描述
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StrategyInfo {
    /// 策略名 (小写)
    #[schema(example = "ma")]
    pub name: String,
    /// 计算拓扑 (self_based / cross_based)
    #[schema(example = "self_based")]
    pub topology: String,
    /// 默认参数
    #[schema(value_type = Object)]
    pub default_parameters: StrategyParams,
}

impl From<&Strategy> for StrategyInfo {
    fn from(strategy: &Strategy) -> Self {
        Self {
            name: strategy.name().to_string(),
            topology: strategy.topology().to_string(),
            default_parameters: strategy.default_parameters(),
        }
    }
}

// ============================================================
//  图表 DTO
// ============================================================

/// 请求体中的单个策略
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StrategyQuery {
    #[schema(example = "ma")]
    pub name: String,
    /// 显式参数，缺省项使用策略默认值
    #[serde(default)]
    #[schema(value_type = Object)]
    pub params: StrategyParams,
}

/// 图表读取请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChartQuery {
    /// 标的代码
    #[schema(example = "000001.SZ")]
    #[serde(default)]
    pub entity_id: Option<String>,
    /// 缺省时返回全部已注册策略
    #[serde(default)]
    pub strategies: Option<Vec<StrategyQuery>>,
}

impl From<ChartQuery> for ChartRequest {
    fn from(query: ChartQuery) -> Self {
        ChartRequest {
            entity_id: query.entity_id,
            strategies: query.strategies.map(|list| {
                list.into_iter()
                    .map(|s| StrategyRequest::new(s.name).with_params(s.params))
                    .collect()
            }),
        }
    }
}

/// 图表文档 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChartResponse {
    /// 主图：`x_data` / `candle_data` ([open, close, low, high]) / `close_prices`
    #[schema(value_type = Object)]
    pub main: MainChart,
    /// 策略名到 `{data, config}` 或 `{error}` 的映射
    #[schema(value_type = Object)]
    pub strategies: BTreeMap<String, StrategyOutcome>,
}

impl From<ChartDocument> for ChartResponse {
    fn from(doc: ChartDocument) -> Self {
        Self {
            main: doc.main,
            strategies: doc.strategies,
        }
    }
}

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub message: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_query_defaults() {
        let query: ChartQuery = serde_json::from_str(
            r#"{"entity_id": "A", "strategies": [{"name": "ma", "params": {"periods": [5]}}, {"name": "rsi"}]}"#,
        )
        .unwrap();
        let request = ChartRequest::from(query);
        let strategies = request.strategies.unwrap();
        assert_eq!(strategies.len(), 2);
        assert!(strategies[1].params.iter().next().is_none());
        assert_eq!(
            strategies[0].params,
            StrategyParams::new().with("periods", vec![5i64])
        );

        let empty: ChartQuery = serde_json::from_str("{}").unwrap();
        assert!(ChartRequest::from(empty).entity_id.is_none());
    }
}
