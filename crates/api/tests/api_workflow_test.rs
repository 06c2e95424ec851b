use reqwest::StatusCode;
use std::sync::Arc;
use tessera_api::server::{AppState, serve};
use tessera_api::types::{ApiErrorResponse, ApiResponse, ChartResponse, StrategyInfo};
use tessera_cache::mem::MemResultStore;
use tessera_core::common::time::RealTimeProvider;
use tessera_core::test_utils::{StaticUniverseSource, series_from_closes};
use tessera_engine::chart::ChartService;
use tessera_engine::compute::{ComputationEngine, StrategyOutcome};
use tessera_strategy::builtin_registry;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct TestServer {
    base_url: String,
    store: Arc<MemResultStore>,
    // 持有发送端，丢弃时服务器退出
    _shutdown: watch::Sender<bool>,
}

// 帮助函数：在随机端口启动测试服务器
async fn spawn_test_server() -> TestServer {
    let closes: Vec<f64> = (0..30u32).map(|i| 10.0 + f64::from(i)).collect();
    let source = Arc::new(StaticUniverseSource::from_series(vec![
        series_from_closes("A", &closes),
        series_from_closes("B", &[20.0, 19.0, 18.0, 17.0, 16.0, 15.0]),
    ]));
    let store = Arc::new(MemResultStore::new());
    let engine = Arc::new(ComputationEngine::new(
        Arc::new(builtin_registry().unwrap()),
        store.clone(),
        source,
        Arc::new(RealTimeProvider),
        chrono::Duration::hours(24),
    ));
    let state = AppState::new(Arc::new(ChartService::new(engine)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        serve(listener, state, rx).await.unwrap();
    });

    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        store,
        _shutdown: tx,
    }
}

#[tokio::test]
async fn test_strategy_catalog() {
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/strategies", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: ApiResponse<Vec<StrategyInfo>> = res.json().await.unwrap();
    let infos = body.data.unwrap();
    assert_eq!(infos.len(), 10);
    assert_eq!(infos[0].name, "volume");
    let rank = infos.iter().find(|i| i.name == "rank_percentage").unwrap();
    assert_eq!(rank.topology, "cross_based");
    let ma = infos.iter().find(|i| i.name == "ma").unwrap();
    assert_eq!(ma.topology, "self_based");
    assert!(ma.default_parameters.get("periods").is_some());
}

#[tokio::test]
async fn test_chart_workflow() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
    let server = spawn_test_server().await;
    let client = reqwest::Client::new();

    // ============================================
    // Case 1: 全部策略
    // ============================================
    let res = client
        .get(format!("{}/api/v1/chart/A", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: ApiResponse<ChartResponse> = res.json().await?;
    assert!(body.success);
    let chart = body.data.unwrap();
    assert_eq!(chart.main.x_data.len(), 30);
    assert_eq!(chart.main.close_prices[0], Some(10.0));
    assert_eq!(chart.strategies.len(), 10);
    assert!(chart.strategies.values().all(StrategyOutcome::is_computed));
    let cached = server.store.len();
    assert_eq!(cached, 10);

    // 再次读取命中缓存，不新增记录
    let res = client
        .get(format!("{}/api/v1/chart/A", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.store.len(), cached);

    // ============================================
    // Case 2: 指定策略与参数，未知策略内联报错
    // ============================================
    let res = client
        .post(format!("{}/api/v1/chart", server.base_url))
        .json(&serde_json::json!({
            "entity_id": "B",
            "strategies": [
                {"name": "ma", "params": {"periods": [5]}},
                {"name": "kdj"}
            ]
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let value: serde_json::Value = res.json().await?;
    let strategies = &value["data"]["strategies"];
    assert_eq!(strategies["kdj"]["error"], "Strategy not found: kdj");
    assert!(strategies["ma"]["data"]["ma5"][3].is_null());
    assert_eq!(strategies["ma"]["data"]["ma5"][4], 18.0);
    assert_eq!(strategies["ma"]["config"]["outputs"]["ma5"]["name"], "MA5");

    // ============================================
    // Case 3: 缺少标的代码
    // ============================================
    let res = client
        .post(format!("{}/api/v1/chart", server.base_url))
        .json(&serde_json::json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: ApiErrorResponse = res.json().await?;
    assert!(!err.success);

    // ============================================
    // Case 4: 标的不存在
    // ============================================
    let res = client
        .get(format!("{}/api/v1/chart/NOPE", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: ApiErrorResponse = res.json().await?;
    assert!(err.message.contains("NOPE"));
    Ok(())
}

#[tokio::test]
async fn test_openapi_document() {
    let server = spawn_test_server().await;
    let res = reqwest::get(format!("{}/api-docs/openapi.json", server.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let doc: serde_json::Value = res.json().await.unwrap();
    assert!(doc["paths"]["/api/v1/chart/{entity_id}"]["get"].is_object());
    assert!(doc["paths"]["/api/v1/chart"]["post"].is_object());
    assert!(doc["paths"]["/api/v1/strategies"]["get"].is_object());
}
