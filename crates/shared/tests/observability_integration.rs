//! 可观测性模块集成测试
//!
//! 测试 metrics 记录函数和 HTTP 中间件的核心行为。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use loyalty_shared::observability::metrics::{
        record_http_request, record_order_submission, record_points_credited,
        record_reconciliation_attempt, record_reconciliation_give_up,
        record_reconciliation_queue_rejection, record_withdrawal, set_reconciliation_in_flight,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/api/user/register", 200, 0.05);
        record_http_request("POST", "/api/user/orders", 202, 0.02);
        record_http_request("POST", "/api/user/orders", 409, 0.01);
        record_http_request("GET", "/api/user/withdrawals", 204, 0.01);
        record_http_request("POST", "/api/user/balance/withdraw", 402, 0.03);
    }

    #[test]
    fn test_record_business_outcomes() {
        record_order_submission("accepted");
        record_order_submission("owned_by_other");
        record_withdrawal("ok");
        record_withdrawal("insufficient_funds");
        record_points_credited(72_998);
    }

    #[test]
    fn test_record_reconciliation_metrics() {
        record_reconciliation_attempt("processed");
        record_reconciliation_attempt("not_registered");
        record_reconciliation_attempt("rate_limited");
        set_reconciliation_in_flight(0);
        set_reconciliation_in_flight(42);
        record_reconciliation_queue_rejection();
        record_reconciliation_give_up();
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        // 空字符串
        record_http_request("", "", 0, 0.0);

        // 超长路径
        let long_path = "/api/".to_string() + &"x".repeat(1000);
        record_http_request("GET", &long_path, 200, 0.01);

        // 极端数值
        record_http_request("GET", "/api/slow", 200, 999.99);
        record_points_credited(u64::MAX);
    }
}

// ============================================================================
// 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use http_body_util::BodyExt;
    use loyalty_shared::observability::middleware::{RequestId, http_tracing, request_id};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let resp = app()
            .oneshot(Request::get("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let header = resp
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(!header.is_empty());

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, header.as_bytes());
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_kept() {
        let resp = app()
            .oneshot(
                Request::get("/echo")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-123");
    }

    #[tokio::test]
    async fn test_tracing_passes_through_status() {
        let resp = app()
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().contains_key("x-request-id"));
    }
}
