//! 应用状态定义

use std::sync::Arc;

use loyalty_shared::database::Database;

use crate::auth::JwtManager;
use crate::reconciliation::InFlightRegistry;
use crate::service::{AuthService, BalanceService, OrderService};

/// Axum 应用共享状态
///
/// 服务通过 Arc 在 handler 间共享；`database` 为 None 时使用内存仓储，就绪检查直接通过
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub balances: Arc<BalanceService>,
    pub auth: Arc<AuthService>,
    pub jwt: JwtManager,
    pub in_flight: Arc<InFlightRegistry>,
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        orders: Arc<OrderService>,
        balances: Arc<BalanceService>,
        auth: Arc<AuthService>,
        in_flight: Arc<InFlightRegistry>,
        database: Option<Database>,
    ) -> Self {
        let jwt = auth.jwt().clone();
        Self {
            orders,
            balances,
            auth,
            jwt,
            in_flight,
            database,
        }
    }
}
