//! 仓储 Trait 定义
//!
//! 服务层和对账 Worker 只依赖这些接口；PostgreSQL 与内存实现各自保证事务语义。

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{
    AccrualResult, Balance, Listing, Order, OrderStatus, SweepCursor, User, Withdrawal,
};

/// 积分结果写入的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// 订单状态已更新；只有流转到 PROCESSED 时 credited 才大于 0
    Applied {
        status: OrderStatus,
        credited: Decimal,
    },
    /// 当前状态不允许该流转（终态或回退），未做任何修改
    Unchanged { current: Option<OrderStatus> },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// 创建用户并初始化零余额（同一事务）
    ///
    /// 登录名已存在时返回 `LoginTaken`
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User>;
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
}

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 查询订单的持有者
    async fn find_order_owner(&self, number: &str) -> Result<Option<i64>>;

    /// 插入新订单（NEW，积分 0）
    ///
    /// 单条带约束的插入；订单号已存在时返回 `OrderConflict`
    async fn insert_order(&self, user_id: i64, number: &str) -> Result<Order>;

    /// 原子地写入积分结果：更新订单状态和积分，PROCESSED 时同时增加用户余额
    ///
    /// 只从合法的前置状态更新，重复投递的终态结果不会重复入账
    async fn apply_accrual(&self, user_id: i64, result: &AccrualResult) -> Result<ApplyOutcome>;

    /// 用户订单列表，按上传时间升序
    async fn list_orders(&self, user_id: i64) -> Result<Listing<Order>>;

    /// 未完成（NEW / PROCESSING）的订单，按 (上传时间, 订单号) 升序，最多 limit 条
    ///
    /// 给定游标时只返回排在游标之后的订单
    async fn list_unfinished(&self, after: Option<SweepCursor>, limit: i64)
    -> Result<Vec<Order>>;
}

/// 余额仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceRepositoryTrait: Send + Sync {
    async fn get_balance(&self, user_id: i64) -> Result<Balance>;

    /// 扣减余额并追加提现记录（同一事务）
    ///
    /// 余额在事务内复核，不足时返回 `InsufficientFunds` 且不做修改
    async fn withdraw(&self, user_id: i64, order_number: &str, amount: Decimal)
    -> Result<Withdrawal>;

    /// 提现记录，按处理时间升序
    async fn list_withdrawals(&self, user_id: i64) -> Result<Listing<Withdrawal>>;
}
