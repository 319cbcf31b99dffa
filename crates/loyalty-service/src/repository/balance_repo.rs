//! 余额仓储
//!
//! 扣款使用 `current >= amount` 条件更新在事务内复核余额，
//! 并发提现不会把余额扣成负数。

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::timeout::bounded;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::traits::BalanceRepositoryTrait;
use crate::error::{LoyaltyError, Result, is_check_violation};
use crate::models::{Balance, Listing, Withdrawal};

pub struct BalanceRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl BalanceRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl BalanceRepositoryTrait for BalanceRepository {
    async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        bounded(self.call_timeout, "get_balance", async {
            let balance = sqlx::query_as::<_, Balance>(
                "SELECT current, withdrawn FROM balances WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(balance.unwrap_or_default())
        })
        .await
    }

    async fn withdraw(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        bounded(self.call_timeout, "withdraw", async {
            let mut tx = self.pool.begin().await?;

            let debited = sqlx::query_scalar::<_, Decimal>(
                r#"
                UPDATE balances
                SET current = current - $2,
                    withdrawn = withdrawn + $2,
                    updated_at = NOW()
                WHERE user_id = $1 AND current >= $2
                RETURNING current
                "#,
            )
            .bind(user_id)
            .bind(amount)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                if is_check_violation(&e) {
                    LoyaltyError::Validation(format!("提现金额非法: {amount}"))
                } else {
                    LoyaltyError::from(e)
                }
            })?;

            if debited.is_none() {
                let available = sqlx::query_scalar::<_, Decimal>(
                    "SELECT current FROM balances WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(Decimal::ZERO);
                tx.rollback().await?;
                return Err(LoyaltyError::InsufficientFunds {
                    requested: amount,
                    available,
                });
            }

            let withdrawal = sqlx::query_as::<_, Withdrawal>(
                r#"
                INSERT INTO withdrawals (user_id, order_number, sum)
                VALUES ($1, $2, $3)
                RETURNING id, user_id, order_number, sum, processed_at
                "#,
            )
            .bind(user_id)
            .bind(order_number)
            .bind(amount)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(withdrawal)
        })
        .await
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Listing<Withdrawal>> {
        bounded(self.call_timeout, "list_withdrawals", async {
            let withdrawals = sqlx::query_as::<_, Withdrawal>(
                r#"
                SELECT id, user_id, order_number, sum, processed_at
                FROM withdrawals
                WHERE user_id = $1
                ORDER BY processed_at ASC, id ASC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(Listing::from_vec(withdrawals))
        })
        .await
    }
}
