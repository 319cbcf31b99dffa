//! JWT 认证中间件与当前用户提取器
//!
//! 中间件校验 Bearer Token 并把 [`AuthUser`] 放入请求扩展；
//! handler 通过提取器拿到已认证的用户 ID，缺失即返回 401。

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::state::AppState;

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub login: String,
}

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = token else {
        return ApiError::Unauthorized("缺少认证 Token".into()).into_response();
    };

    let user = state
        .jwt
        .verify_token(token)
        .and_then(|claims| {
            Ok(AuthUser {
                user_id: claims.user_id()?,
                login: claims.login,
            })
        });

    match user {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("未登录".into()))
    }
}

/// 生成 `Authorization` 响应头的值
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
