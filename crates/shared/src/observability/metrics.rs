//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时，记录函数均为空操作。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("orders_submitted_total", "Order submissions by outcome");
    metrics::describe_counter!("withdrawals_total", "Withdrawal attempts by outcome");

    metrics::describe_counter!(
        "reconciliation_attempts_total",
        "Accrual reconciliation attempts by outcome"
    );
    metrics::describe_gauge!(
        "reconciliation_in_flight",
        "Orders currently owned by the reconciliation pool"
    );
    metrics::describe_counter!(
        "reconciliation_queue_rejections_total",
        "Dispatches dropped because the reconciliation queue was full"
    );
    metrics::describe_counter!(
        "reconciliation_give_ups_total",
        "Reconciliations abandoned after exhausting the attempt budget"
    );
    metrics::describe_counter!("accrual_points_credited_total", "Points credited, in cents");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单提交结果
#[inline]
pub fn record_order_submission(outcome: &str) {
    metrics::counter!("orders_submitted_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录提现结果
#[inline]
pub fn record_withdrawal(outcome: &str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录一次对账尝试
#[inline]
pub fn record_reconciliation_attempt(outcome: &str) {
    metrics::counter!("reconciliation_attempts_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// 更新在途对账数量
#[inline]
pub fn set_reconciliation_in_flight(count: usize) {
    metrics::gauge!("reconciliation_in_flight").set(count as f64);
}

/// 记录队列已满导致的派发丢弃
#[inline]
pub fn record_reconciliation_queue_rejection() {
    metrics::counter!("reconciliation_queue_rejections_total").increment(1);
}

/// 记录放弃对账
#[inline]
pub fn record_reconciliation_give_up() {
    metrics::counter!("reconciliation_give_ups_total").increment(1);
}

/// 记录入账积分（以分为单位，避免浮点计数）
#[inline]
pub fn record_points_credited(cents: u64) {
    metrics::counter!("accrual_points_credited_total").increment(cents);
}
