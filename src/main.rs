use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use backend::{
    AppState,
    config::Config,
    geo::{GeofenceEvaluator, LocationIqResolver},
    ingest::RealtimeIngestionCore,
    middleware::{CodeAttemptLimiter, RateLimiter, auth_middleware, log_errors, rate_limit},
    realtime::{SessionRegistry, ws_handler},
    routes,
    safety::GeminiAnalyzer,
    store::PgChildStateStore,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'guardian_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    // 组装摄入管道：存储 + 地理编码 + 安全分析 + 围栏 + 会话注册表
    let store = Arc::new(PgChildStateStore::new(pool.clone(), redis_arc.clone()));
    let resolver = Arc::new(LocationIqResolver::new(
        config.location_iq_api_key.clone(),
        config.location_iq_base_url.clone(),
        config.geo_timeout(),
    ));
    let analyzer = Arc::new(GeminiAnalyzer::new(
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        config.safety_timeout(),
    ));
    let registry = Arc::new(SessionRegistry::new());
    let core = Arc::new(RealtimeIngestionCore::new(
        store.clone(),
        resolver,
        analyzer,
        GeofenceEvaluator::with_default_rules(),
        registry.clone(),
        config.geo_timeout(),
        config.safety_timeout(),
    ));
    let code_limiter = Arc::new(CodeAttemptLimiter::new(
        config.code_attempt_window(),
        config.code_attempt_quota,
    ));

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
        store,
        core,
        registry,
        code_limiter,
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    // 将路由分为公开路由和受保护路由
    let public_routes = Router::new()
        // 家长账户公开路由
        .route("/auth/signup", post(routes::auth::handler::signup))
        .route("/auth/login", post(routes::auth::handler::login))
        // 儿童设备绑定与上报
        .route(
            "/code/verify-child-code",
            post(routes::code::handler::verify_child_code),
        )
        .route(
            "/location/update",
            post(routes::location::handler::update_location),
        )
        // 实时通道，角色在握手阶段确定
        .route("/ws", get(ws_handler));

    let protected_routes = Router::new()
        .route("/auth/check-auth", get(routes::auth::handler::check_auth))
        .route(
            "/code/generate-child-code",
            post(routes::code::handler::generate_child_code),
        )
        .route(
            "/location/child",
            get(routes::location::handler::get_child_location),
        )
        .route("/alerts/child", get(routes::alert::handler::get_child_alerts))
        .route(
            "/data/parent-dashboard",
            get(routes::parent::handler::parent_dashboard),
        )
        .route(
            "/config/settings",
            get(routes::settings::handler::get_settings)
                .post(routes::settings::handler::update_settings),
        )
        // 应用认证中间件
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new().merge(public_routes).merge(protected_routes);

    // 添加日志中间件和限流中间件
    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
