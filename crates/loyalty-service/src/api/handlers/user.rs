//! 注册与登录

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::auth::bearer;
use crate::api::dto::{CredentialsRequest, TokenResponse, parse_validated};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// 注册新用户，成功后直接视为已登录
///
/// POST /api/user/register
pub async fn register(State(state): State<AppState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let req: CredentialsRequest = parse_validated(&body)?;
    let auth = state.auth.register(&req.login, &req.password).await?;

    Ok((
        [(AUTHORIZATION, bearer(&auth.token))],
        Json(TokenResponse { token: auth.token }),
    ))
}

/// 用户登录
///
/// POST /api/user/login
pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let req: CredentialsRequest = parse_validated(&body)?;
    let auth = state.auth.login(&req.login, &req.password).await?;

    Ok((
        [(AUTHORIZATION, bearer(&auth.token))],
        Json(TokenResponse { token: auth.token }),
    ))
}
