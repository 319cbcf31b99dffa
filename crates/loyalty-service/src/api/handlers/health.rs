//! 健康检查

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Value, json};

use crate::api::state::AppState;

/// 存活探针：服务进程正常即返回 ok
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "gophermart"
    }))
}

/// 就绪响应中列出的在途订单上限
const IN_FLIGHT_PREVIEW: usize = 20;

/// 就绪探针：检查数据库连接，同时报告在途对账数量和最早登记的订单
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };
    let oldest: Vec<_> = state
        .in_flight
        .snapshot()
        .into_iter()
        .take(IN_FLIGHT_PREVIEW)
        .collect();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "service": "gophermart",
            "checks": {
                "database": if db_ok { "ok" } else { "fail" }
            },
            "reconciliation_in_flight": state.in_flight.len(),
            "reconciliation_oldest": oldest
        })),
    )
}
