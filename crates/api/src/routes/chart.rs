//! # 图表路由控制器
//!
//! 实现 `/api/v1/chart` 路径下的 REST 接口。
//! 单个策略的失败以 `{error}` 内联在文档中，不影响整体状态码。

use axum::Json;
use axum::extract::{Path, State};
use tessera_engine::chart::ChartRequest;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, ApiResponse, ChartQuery, ChartResponse};

/// 获取标的的完整图表
///
/// 对全部已注册策略使用默认参数，新鲜的缓存结果直接返回。
#[utoipa::path(
    get,
    path = "/api/v1/chart/{entity_id}",
    tag = "图表 (Chart)",
    params(
        ("entity_id" = String, Path, description = "标的代码")
    ),
    responses(
        (status = 200, description = "图表获取成功", body = ApiResponse<ChartResponse>),
        (status = 404, description = "标的不存在", body = ApiErrorResponse)
    )
)]
pub async fn get_chart(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<ApiResponse<ChartResponse>>, ApiError> {
    let request = ChartRequest {
        entity_id: Some(entity_id),
        strategies: None,
    };
    let doc = state.chart_service.build(request).await?;
    Ok(Json(ApiResponse::ok(doc.into())))
}

/// 按请求体读取图表
///
/// 可指定策略子集与显式参数；未注册的策略名以内联错误返回。
#[utoipa::path(
    post,
    path = "/api/v1/chart",
    tag = "图表 (Chart)",
    request_body = ChartQuery,
    responses(
        (status = 200, description = "图表获取成功", body = ApiResponse<ChartResponse>),
        (status = 400, description = "缺少标的代码", body = ApiErrorResponse),
        (status = 404, description = "标的不存在", body = ApiErrorResponse)
    )
)]
pub async fn query_chart(
    State(state): State<AppState>,
    Json(query): Json<ChartQuery>,
) -> Result<Json<ApiResponse<ChartResponse>>, ApiError> {
    let doc = state.chart_service.build(query.into()).await?;
    Ok(Json(ApiResponse::ok(doc.into())))
}
