//! 余额与提现实体

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 积分字段上限，与表结构 NUMERIC(14, 2) 一致
pub const MAX_POINTS: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2); // 999_999_999_999.99

/// 用户积分余额
///
/// 每个用户一条，注册时以 0 初始化。
/// current 永不为负，withdrawn 只增不减。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn can_afford(&self, amount: Decimal) -> bool {
        amount <= self.current
    }
}

/// 提现记录
///
/// 只在扣款成功的事务中创建，之后不可修改。
/// 订单号是消费目标，不要求先上传过。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}
