//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 持有并调用。

use std::sync::Arc;

use axum::Router;
use tessera_core::strategy::registry::StrategyRegistry;
use tessera_engine::chart::ChartService;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes::{chart, strategy};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - `chart_service` 与 `registry` 在服务启动前注入，生命周期与进程等同。
#[derive(Clone)]
pub struct AppState {
    /// 图表读取服务
    pub chart_service: Arc<ChartService>,
    /// 策略注册表 (用于目录查询)
    pub registry: Arc<StrategyRegistry>,
}

impl AppState {
    pub fn new(chart_service: Arc<ChartService>) -> Self {
        let registry = chart_service.engine().registry().clone();
        Self {
            chart_service,
            registry,
        }
    }
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tessera 策略结果 API",
        version = "0.1.0",
        description = "策略结果缓存的只读 RESTful API。提供策略目录与按标的的图表文档。",
        license(name = "MIT")
    ),
    tags(
        (name = "图表 (Chart)", description = "按标的读取主图与策略结果"),
        (name = "策略 (Strategy)", description = "已注册策略目录")
    )
)]
pub struct ApiDoc;

// ============================================================
//  服务构建与启动
// ============================================================

/// 构建完整的 axum 应用路由树 (含 Swagger UI 与 CORS)。
pub fn build_router(state: AppState) -> Router {
    let api_router = OpenApiRouter::new()
        .routes(routes!(strategy::list_strategies))
        .routes(routes!(chart::get_chart))
        .routes(routes!(chart::query_chart));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(api_router)
        .with_state(state)
        .split_for_parts();

    // 允许所有来源
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// 在已绑定的监听器上提供服务，`shutdown` 变为 `true` 时优雅退出。
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

/// 绑定地址并启动 HTTP 监听。
///
/// # Arguments
/// * `state` - 由外部注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
/// * `shutdown` - 关闭信号
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Tessera API listening on {}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);
    serve(listener, state, shutdown).await
}
