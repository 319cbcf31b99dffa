//! 积分订单服务
//!
//! 用户上传订单号，服务校验后异步向积分计算服务查询积分，
//! 并在同一事务中更新订单状态和用户积分余额；用户可用积分抵扣订单。
//!
//! ## 模块结构
//!
//! - `order_number`: Luhn 订单号校验
//! - `models`: 领域模型
//! - `repository`: 仓储接口及 PostgreSQL / 内存实现
//! - `accrual`: 积分计算服务客户端
//! - `service`: 订单、余额、用户服务
//! - `reconciliation`: 对账 Worker 池
//! - `api`: HTTP 接口

pub mod accrual;
pub mod api;
pub mod app;
pub mod auth;
pub mod error;
pub mod models;
pub mod order_number;
pub mod reconciliation;
pub mod repository;
pub mod service;

pub use error::{LoyaltyError, Result};
pub use order_number::{OrderNumber, is_valid_order_number};

/// 编译进二进制的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
