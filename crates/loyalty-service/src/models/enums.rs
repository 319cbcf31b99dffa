//! 订单状态枚举
//!
//! 同时支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 订单状态
///
/// NEW → PROCESSING → INVALID / PROCESSED。
/// 状态只由对账 Worker 根据积分计算服务的响应推进，终态不再变化。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已上传，积分计算服务尚未受理（对方的 REGISTERED 也视为 NEW）
    #[default]
    #[serde(alias = "REGISTERED")]
    New,
    /// 积分计算服务处理中
    Processing,
    /// 被积分计算服务拒绝，不会计算积分
    Invalid,
    /// 计算完成，积分已入账
    Processed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Invalid,
        OrderStatus::Processed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 检查状态流转是否合法
    ///
    /// 终态不可再变；PROCESSING 不回退到 NEW；同状态重复写入视为合法的空操作。
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            Self::Invalid | Self::Processed => false,
            Self::New => true,
            Self::Processing => next != Self::New,
        }
    }

    /// 可以流转到当前状态的前置状态集合
    ///
    /// 仓储层据此做条件更新，保证重复投递的终态结果不会被二次应用。
    pub fn predecessors(&self) -> &'static [OrderStatus] {
        match self {
            Self::New => &[Self::New],
            Self::Processing | Self::Invalid | Self::Processed => {
                &[Self::New, Self::Processing]
            }
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
