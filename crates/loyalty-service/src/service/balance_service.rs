//! 积分余额服务
//!
//! 查询余额、提现扣款和提现记录。扣款在仓储事务内再次复核余额，
//! 服务层的预检查只用于快速拒绝。

use std::sync::Arc;

use loyalty_shared::observability::metrics;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::error::{LoyaltyError, Result};
use crate::models::{Balance, Listing, MAX_POINTS, Withdrawal};
use crate::order_number::OrderNumber;
use crate::repository::BalanceRepositoryTrait;

/// 金额最多两位小数
const AMOUNT_SCALE: u32 = 2;

pub struct BalanceService {
    balance_repo: Arc<dyn BalanceRepositoryTrait>,
}

impl BalanceService {
    pub fn new(balance_repo: Arc<dyn BalanceRepositoryTrait>) -> Self {
        Self { balance_repo }
    }

    #[instrument(skip(self))]
    pub async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        self.balance_repo.get_balance(user_id).await
    }

    /// 提现
    ///
    /// 订单号格式错误返回 `InvalidOrderNumber`，余额不足返回 `InsufficientFunds`，
    /// 两种情况都不修改余额。
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        user_id: i64,
        raw_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        let number = OrderNumber::parse(raw_number).inspect_err(|_| {
            metrics::record_withdrawal("invalid");
            warn!("提现订单号格式错误");
        })?;
        validate_amount(amount).inspect_err(|_| metrics::record_withdrawal("invalid"))?;

        let balance = self.balance_repo.get_balance(user_id).await?;
        if !balance.can_afford(amount) {
            metrics::record_withdrawal("insufficient_funds");
            warn!(current = %balance.current, "余额不足");
            return Err(LoyaltyError::InsufficientFunds {
                requested: amount,
                available: balance.current,
            });
        }

        match self
            .balance_repo
            .withdraw(user_id, number.as_str(), amount)
            .await
        {
            Ok(withdrawal) => {
                metrics::record_withdrawal("ok");
                info!(order = %number, "提现成功");
                Ok(withdrawal)
            }
            Err(e @ LoyaltyError::InsufficientFunds { .. }) => {
                // 并发扣款，事务内复核失败
                metrics::record_withdrawal("insufficient_funds");
                warn!(order = %number, error = %e, "提现时余额已不足");
                Err(e)
            }
            Err(e) => {
                metrics::record_withdrawal("error");
                error!(order = %number, error = %e, "提现失败");
                Err(e)
            }
        }
    }

    /// 提现记录，按处理时间升序
    #[instrument(skip(self))]
    pub async fn withdrawal_history(&self, user_id: i64) -> Result<Listing<Withdrawal>> {
        self.balance_repo.list_withdrawals(user_id).await
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LoyaltyError::Validation(format!(
            "提现金额必须大于 0: {amount}"
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LoyaltyError::Validation(format!(
            "提现金额最多两位小数: {amount}"
        )));
    }
    if amount > MAX_POINTS {
        return Err(LoyaltyError::AmountOutOfRange(amount.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockBalanceRepositoryTrait;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn balance(current: i64, withdrawn: i64) -> Balance {
        Balance {
            current: Decimal::new(current, 0),
            withdrawn: Decimal::new(withdrawn, 0),
        }
    }

    #[tokio::test]
    async fn test_insufficient_funds_does_not_mutate() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_get_balance().returning(|_| Ok(balance(100, 0)));
        repo.expect_withdraw().never();

        let service = BalanceService::new(Arc::new(repo));
        let err = service
            .withdraw(1, "2377225624", Decimal::new(150, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InsufficientFunds { requested, available }
                if requested == Decimal::new(150, 0) && available == Decimal::new(100, 0)
        ));
    }

    #[tokio::test]
    async fn test_withdraw_within_balance() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_get_balance().returning(|_| Ok(balance(100, 0)));
        repo.expect_withdraw()
            .with(eq(1_i64), eq("2377225624"), eq(Decimal::new(40, 0)))
            .times(1)
            .returning(|user_id, number, sum| {
                Ok(Withdrawal {
                    id: 1,
                    user_id,
                    order_number: number.to_string(),
                    sum,
                    processed_at: Utc::now(),
                })
            });

        let service = BalanceService::new(Arc::new(repo));
        let withdrawal = service
            .withdraw(1, "2377225624", Decimal::new(40, 0))
            .await
            .unwrap();
        assert_eq!(withdrawal.sum, Decimal::new(40, 0));
        assert_eq!(withdrawal.order_number, "2377225624");
    }

    #[tokio::test]
    async fn test_withdraw_entire_balance() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_get_balance().returning(|_| Ok(balance(100, 0)));
        repo.expect_withdraw().times(1).returning(|user_id, number, sum| {
            Ok(Withdrawal {
                id: 1,
                user_id,
                order_number: number.to_string(),
                sum,
                processed_at: Utc::now(),
            })
        });

        let service = BalanceService::new(Arc::new(repo));
        assert!(
            service
                .withdraw(1, "2377225624", Decimal::new(100, 0))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_order_number() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_get_balance().never();
        repo.expect_withdraw().never();

        let service = BalanceService::new(Arc::new(repo));
        let err = service
            .withdraw(1, "1234", Decimal::new(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidOrderNumber(_)));
    }

    #[tokio::test]
    async fn test_concurrent_debit_is_reported() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_get_balance().returning(|_| Ok(balance(100, 0)));
        repo.expect_withdraw().returning(|_, _, sum| {
            Err(LoyaltyError::InsufficientFunds {
                requested: sum,
                available: Decimal::new(20, 0),
            })
        });

        let service = BalanceService::new(Arc::new(repo));
        let err = service
            .withdraw(1, "2377225624", Decimal::new(80, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_amount(Decimal::new(1000, 3)).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-5, 0)).is_err());
        assert!(validate_amount(Decimal::new(1005, 3)).is_err());
        assert!(validate_amount(MAX_POINTS).is_ok());
        assert!(matches!(
            validate_amount(MAX_POINTS + Decimal::new(1, 2)),
            Err(LoyaltyError::AmountOutOfRange(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_history_is_distinct() {
        let mut repo = MockBalanceRepositoryTrait::new();
        repo.expect_list_withdrawals()
            .returning(|_| Ok(Listing::Empty));

        let service = BalanceService::new(Arc::new(repo));
        assert_eq!(service.withdrawal_history(1).await.unwrap(), Listing::Empty);
    }
}
