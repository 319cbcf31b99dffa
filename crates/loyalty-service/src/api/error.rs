//! HTTP 错误响应
//!
//! 把服务层错误映射为状态码；系统级错误只返回通用提示，详细信息记录日志

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::LoyaltyError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error("未认证: {0}")]
    Unauthorized(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Loyalty(e) => match e {
                LoyaltyError::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LoyaltyError::Validation(_) | LoyaltyError::AmountOutOfRange(_) => {
                    StatusCode::BAD_REQUEST
                }
                LoyaltyError::OrderConflict(_) | LoyaltyError::LoginTaken(_) => {
                    StatusCode::CONFLICT
                }
                LoyaltyError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                LoyaltyError::InvalidCredentials | LoyaltyError::Unauthorized(_) => {
                    StatusCode::UNAUTHORIZED
                }
                LoyaltyError::AccrualTransport(_)
                | LoyaltyError::AccrualProtocol(_)
                | LoyaltyError::Timeout { .. }
                | LoyaltyError::Database(_)
                | LoyaltyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Loyalty(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Loyalty(e) if !e.is_business_error() => {
                tracing::error!(code = e.error_code(), error = %e, "请求处理失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
