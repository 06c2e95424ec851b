//! # 策略目录路由控制器
//!
//! 实现 `/api/v1/strategies` 路径下的 REST 接口。

use axum::Json;
use axum::extract::State;

use crate::server::AppState;
use crate::types::{ApiResponse, StrategyInfo};

/// 列出全部已注册策略
///
/// 按注册顺序返回策略名、计算拓扑与默认参数。
#[utoipa::path(
    get,
    path = "/api/v1/strategies",
    tag = "策略 (Strategy)",
    responses(
        (status = 200, description = "策略目录获取成功", body = ApiResponse<Vec<StrategyInfo>>)
    )
)]
pub async fn list_strategies(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<StrategyInfo>>> {
    let infos: Vec<StrategyInfo> = state
        .registry
        .strategies()
        .map(StrategyInfo::from)
        .collect();
    Json(ApiResponse::ok(infos))
}
