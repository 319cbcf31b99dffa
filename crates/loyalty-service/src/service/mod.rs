//! 服务层
//!
//! 协调订单号校验、仓储和对账派发，实现订单、余额和用户业务逻辑。

pub mod auth_service;
pub mod balance_service;
pub mod order_service;

pub use auth_service::{AuthService, AuthToken};
pub use balance_service::BalanceService;
pub use order_service::{OrderService, SubmitOutcome};
