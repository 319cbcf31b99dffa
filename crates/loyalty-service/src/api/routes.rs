//! 路由配置

use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::routing::{get, post};
use axum::{Router, middleware};
use loyalty_shared::observability::middleware as obs_middleware;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::auth::auth_middleware;
use super::handlers;
use super::state::AppState;

/// 用户接口（挂载在 /api/user 下）
///
/// 注册和登录公开，其余路由需要 Bearer Token
pub fn user_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(handlers::user::register))
        .route("/login", post(handlers::user::login));

    let protected = Router::new()
        .route(
            "/orders",
            post(handlers::orders::upload_order).get(handlers::orders::list_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route("/withdrawals", get(handlers::balance::list_withdrawals))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

/// 完整应用路由，含健康检查和可观测性中间件
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/user", user_routes(state.clone()))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

/// 跨域配置
///
/// `origins` 为 "*" 时允许任意来源，否则按逗号分隔的来源列表放行。
/// 登录响应的 Authorization 头需要显式暴露给浏览器端脚本。
pub fn cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([AUTHORIZATION]);

    if origins.trim() == "*" {
        info!("CORS allowed_origins: * (all origins)");
        layer.allow_origin(Any)
    } else {
        info!("CORS allowed_origins: {}", origins);
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
