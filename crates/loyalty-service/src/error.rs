//! 积分服务错误类型
//!
//! 业务错误直接反馈给调用方，不重试；基础设施错误（数据库、积分计算服务、超时）
//! 在对账 Worker 中按退避策略重试，在同步请求中以通用失败返回。

use loyalty_shared::timeout::Elapsed;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 校验错误 ===
    #[error("订单号格式错误: {0}")]
    InvalidOrderNumber(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 冲突错误 ===
    #[error("订单已被其他用户上传: {0}")]
    OrderConflict(String),

    #[error("登录名已被占用: {0}")]
    LoginTaken(String),

    // === 余额错误 ===
    #[error("余额不足: 需要 {requested}, 可用 {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    /// 超出积分字段可表示的范围
    #[error("积分数额超出上限: {0}")]
    AmountOutOfRange(String),

    // === 身份错误 ===
    #[error("登录名或密码错误")]
    InvalidCredentials,

    #[error("未认证: {0}")]
    Unauthorized(String),

    // === 基础设施错误 ===
    #[error("积分计算服务不可达: {0}")]
    AccrualTransport(String),

    #[error("积分计算服务响应异常: {0}")]
    AccrualProtocol(String),

    #[error("操作超时: {operation}")]
    Timeout { operation: String },

    #[error("数据库错误: {0}")]
    Database(#[source] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl From<Elapsed> for LoyaltyError {
    fn from(e: Elapsed) -> Self {
        Self::Timeout {
            operation: e.operation.to_string(),
        }
    }
}

impl From<sqlx::Error> for LoyaltyError {
    fn from(e: sqlx::Error) -> Self {
        if is_numeric_overflow(&e) {
            Self::AmountOutOfRange(e.to_string())
        } else {
            Self::Database(e)
        }
    }
}

impl From<reqwest::Error> for LoyaltyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::AccrualProtocol(e.to_string())
        } else {
            Self::AccrualTransport(e.to_string())
        }
    }
}

impl LoyaltyError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Timeout { .. }
                | Self::AccrualTransport(_)
                | Self::AccrualProtocol(_)
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Timeout { .. }
                | Self::AccrualTransport(_)
                | Self::AccrualProtocol(_)
                | Self::Internal(_)
        )
    }

    /// 获取错误码（用于 API 响应和日志）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OrderConflict(_) => "ORDER_CONFLICT",
            Self::LoginTaken(_) => "LOGIN_TAKEN",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AccrualTransport(_) => "ACCRUAL_UNAVAILABLE",
            Self::AccrualProtocol(_) => "ACCRUAL_PROTOCOL_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// 判断数据库错误是否为唯一约束冲突
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// 判断数据库错误是否为数值溢出（SQLSTATE 22003）
fn is_numeric_overflow(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE))
}

const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// 判断数据库错误是否为 CHECK 约束冲突（余额不能为负）
pub(crate) fn is_check_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_check_violation())
}
