//! 内存仓储
//!
//! 在进程内实现全部仓储接口，用于测试和本地运行。
//! 每个操作持有同一把锁完成，一次加锁即一个事务：要么全部生效，要么不生效。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::traits::{
    ApplyOutcome, BalanceRepositoryTrait, OrderRepositoryTrait, UserRepositoryTrait,
};
use crate::error::{LoyaltyError, Result};
use crate::models::{
    AccrualResult, Balance, Listing, MAX_POINTS, Order, OrderStatus, SweepCursor, User,
    Withdrawal,
};

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    logins: HashMap<String, i64>,
    balances: HashMap<i64, Balance>,
    orders: HashMap<String, Order>,
    /// 订单号按插入顺序排列，用于稳定的升序输出
    order_seq: Vec<String>,
    withdrawals: Vec<Withdrawal>,
    next_user_id: i64,
    next_withdrawal_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取订单快照
    pub fn order(&self, number: &str) -> Option<Order> {
        self.inner.lock().orders.get(number).cloned()
    }
}

#[async_trait]
impl UserRepositoryTrait for MemoryStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User> {
        let mut inner = self.inner.lock();
        if inner.logins.contains_key(login) {
            return Err(LoyaltyError::LoginTaken(login.to_string()));
        }

        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.logins.insert(user.login.clone(), user.id);
        inner.balances.insert(user.id, Balance::default());
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let inner = self.inner.lock();
        Ok(inner
            .logins
            .get(login)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryStore {
    async fn find_order_owner(&self, number: &str) -> Result<Option<i64>> {
        Ok(self.inner.lock().orders.get(number).map(|o| o.user_id))
    }

    async fn insert_order(&self, user_id: i64, number: &str) -> Result<Order> {
        let mut inner = self.inner.lock();
        if inner.orders.contains_key(number) {
            return Err(LoyaltyError::OrderConflict(number.to_string()));
        }

        let order = Order::new(number, user_id, Utc::now());
        inner.orders.insert(number.to_string(), order.clone());
        inner.order_seq.push(number.to_string());
        Ok(order)
    }

    async fn apply_accrual(&self, user_id: i64, result: &AccrualResult) -> Result<ApplyOutcome> {
        let accrual = result.effective_accrual();
        let mut inner = self.inner.lock();
        let current = inner
            .balances
            .get(&user_id)
            .map(|b| b.current)
            .unwrap_or_default();

        let Some(order) = inner
            .orders
            .get_mut(&result.order)
            .filter(|o| o.user_id == user_id)
        else {
            return Ok(ApplyOutcome::Unchanged { current: None });
        };

        if !result.status.predecessors().contains(&order.status) {
            return Ok(ApplyOutcome::Unchanged {
                current: Some(order.status),
            });
        }

        if result.status == OrderStatus::Processed
            && (accrual > MAX_POINTS || current + accrual > MAX_POINTS)
        {
            return Err(LoyaltyError::AmountOutOfRange(accrual.to_string()));
        }

        order.status = result.status;
        order.accrual = accrual;
        order.updated_at = Utc::now();

        let credited = if result.status == OrderStatus::Processed && accrual > Decimal::ZERO {
            inner.balances.entry(user_id).or_default().current += accrual;
            accrual
        } else {
            Decimal::ZERO
        };

        Ok(ApplyOutcome::Applied {
            status: result.status,
            credited,
        })
    }

    async fn list_orders(&self, user_id: i64) -> Result<Listing<Order>> {
        let inner = self.inner.lock();
        let orders = inner
            .order_seq
            .iter()
            .filter_map(|n| inner.orders.get(n))
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(Listing::from_vec(orders))
    }

    async fn list_unfinished(
        &self,
        after: Option<SweepCursor>,
        limit: i64,
    ) -> Result<Vec<Order>> {
        let inner = self.inner.lock();
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .filter(|o| after.as_ref().is_none_or(|c| c.is_before(o)))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            (a.uploaded_at, a.number.as_str()).cmp(&(b.uploaded_at, b.number.as_str()))
        });
        orders.truncate(limit);
        Ok(orders)
    }
}

#[async_trait]
impl BalanceRepositoryTrait for MemoryStore {
    async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        Ok(self
            .inner
            .lock()
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        let mut inner = self.inner.lock();
        let balance = inner.balances.entry(user_id).or_default();
        if !balance.can_afford(amount) {
            return Err(LoyaltyError::InsufficientFunds {
                requested: amount,
                available: balance.current,
            });
        }
        balance.current -= amount;
        balance.withdrawn += amount;

        inner.next_withdrawal_id += 1;
        let withdrawal = Withdrawal {
            id: inner.next_withdrawal_id,
            user_id,
            order_number: order_number.to_string(),
            sum: amount,
            processed_at: Utc::now(),
        };
        inner.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Listing<Withdrawal>> {
        let inner = self.inner.lock();
        let withdrawals = inner
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        Ok(Listing::from_vec(withdrawals))
    }
}
