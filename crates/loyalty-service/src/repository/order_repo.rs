//! 订单仓储
//!
//! 订单号主键是防止重复持有的唯一机制：插入只有一条带约束的 INSERT，
//! 不做先查后写。积分写入使用按前置状态过滤的条件 UPDATE，
//! 并发或重复投递时只有一次能命中。

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::timeout::bounded;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::traits::{ApplyOutcome, OrderRepositoryTrait};
use crate::error::{LoyaltyError, Result, is_unique_violation};
use crate::models::{AccrualResult, Listing, Order, OrderStatus, SweepCursor};

pub struct OrderRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl OrderRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }

    /// 在事务中增加用户余额
    ///
    /// 余额行缺失时补建，正常情况下注册时已创建
    async fn credit_in_tx(conn: &mut PgConnection, user_id: i64, amount: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, current)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET current = balances.current + EXCLUDED.current,
                          updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn find_order_owner(&self, number: &str) -> Result<Option<i64>> {
        bounded(self.call_timeout, "find_order_owner", async {
            let owner = sqlx::query_scalar::<_, i64>("SELECT user_id FROM orders WHERE number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;

            Ok(owner)
        })
        .await
    }

    async fn insert_order(&self, user_id: i64, number: &str) -> Result<Order> {
        bounded(self.call_timeout, "insert_order", async {
            sqlx::query_as::<_, Order>(
                r#"
                INSERT INTO orders (number, user_id, status, accrual)
                VALUES ($1, $2, $3, 0)
                RETURNING number, user_id, status, accrual, uploaded_at, updated_at
                "#,
            )
            .bind(number)
            .bind(user_id)
            .bind(OrderStatus::New)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LoyaltyError::OrderConflict(number.to_string())
                } else {
                    LoyaltyError::from(e)
                }
            })
        })
        .await
    }

    async fn apply_accrual(&self, user_id: i64, result: &AccrualResult) -> Result<ApplyOutcome> {
        let accrual = result.effective_accrual();
        let predecessors: Vec<&str> = result
            .status
            .predecessors()
            .iter()
            .map(OrderStatus::as_str)
            .collect();

        bounded(self.call_timeout, "apply_accrual", async {
            let mut tx = self.pool.begin().await?;

            // 条件更新持有行锁，并发的同一订单写入在此串行化
            let updated = sqlx::query_scalar::<_, String>(
                r#"
                UPDATE orders
                SET status = $3, accrual = $4, updated_at = NOW()
                WHERE number = $1 AND user_id = $2 AND status = ANY($5)
                RETURNING number
                "#,
            )
            .bind(&result.order)
            .bind(user_id)
            .bind(result.status)
            .bind(accrual)
            .bind(&predecessors)
            .fetch_optional(&mut *tx)
            .await?;

            if updated.is_none() {
                let current = sqlx::query_scalar::<_, OrderStatus>(
                    "SELECT status FROM orders WHERE number = $1 AND user_id = $2",
                )
                .bind(&result.order)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
                tx.rollback().await?;
                return Ok(ApplyOutcome::Unchanged { current });
            }

            let credited = if result.status == OrderStatus::Processed && accrual > Decimal::ZERO {
                Self::credit_in_tx(&mut *tx, user_id, accrual).await?;
                accrual
            } else {
                Decimal::ZERO
            };

            tx.commit().await?;
            Ok(ApplyOutcome::Applied {
                status: result.status,
                credited,
            })
        })
        .await
    }

    async fn list_orders(&self, user_id: i64) -> Result<Listing<Order>> {
        bounded(self.call_timeout, "list_orders", async {
            let orders = sqlx::query_as::<_, Order>(
                r#"
                SELECT number, user_id, status, accrual, uploaded_at, updated_at
                FROM orders
                WHERE user_id = $1
                ORDER BY uploaded_at ASC, number ASC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(Listing::from_vec(orders))
        })
        .await
    }

    async fn list_unfinished(
        &self,
        after: Option<SweepCursor>,
        limit: i64,
    ) -> Result<Vec<Order>> {
        let (after_time, after_number) = match after {
            Some(cursor) => (Some(cursor.uploaded_at), Some(cursor.number)),
            None => (None, None),
        };

        bounded(self.call_timeout, "list_unfinished", async {
            let orders = sqlx::query_as::<_, Order>(
                r#"
                SELECT number, user_id, status, accrual, uploaded_at, updated_at
                FROM orders
                WHERE status IN ('NEW', 'PROCESSING')
                  AND ($1::timestamptz IS NULL OR (uploaded_at, number) > ($1, $2::text))
                ORDER BY uploaded_at ASC, number ASC
                LIMIT $3
                "#,
            )
            .bind(after_time)
            .bind(after_number)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

            Ok(orders)
        })
        .await
    }
}
