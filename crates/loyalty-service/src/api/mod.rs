//! HTTP API
//!
//! 在服务层之上的薄适配层：解析请求、认证、把结果映射为状态码

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};
pub use routes::{build_router, cors_layer};
pub use state::AppState;
