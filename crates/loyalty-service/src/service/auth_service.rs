//! 用户注册与登录
//!
//! bcrypt 计算放到阻塞线程池，避免占用异步运行时

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::{JwtManager, hash_password, verify_password};
use crate::error::{LoyaltyError, Result};
use crate::repository::UserRepositoryTrait;

/// 认证成功后返回给客户端的凭证
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub user_id: i64,
    pub token: String,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepositoryTrait>,
    jwt: JwtManager,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(user_repo: Arc<dyn UserRepositoryTrait>, jwt: JwtManager, bcrypt_cost: u32) -> Self {
        Self {
            user_repo,
            jwt,
            bcrypt_cost,
        }
    }

    /// 注册并直接登录
    #[instrument(skip(self, password))]
    pub async fn register(&self, login: &str, password: &str) -> Result<AuthToken> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| LoyaltyError::Internal(format!("密码哈希任务失败: {e}")))??;

        let user = self
            .user_repo
            .create_user(login, &password_hash)
            .await
            .inspect_err(|e| warn!(error = %e, "注册失败"))?;

        info!(user_id = user.id, "用户注册成功");
        Ok(AuthToken {
            user_id: user.id,
            token: self.jwt.generate_token(user.id, &user.login)?,
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<AuthToken> {
        let Some(user) = self.user_repo.find_by_login(login).await? else {
            warn!("登录失败：用户不存在");
            return Err(LoyaltyError::InvalidCredentials);
        };

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matched = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| LoyaltyError::Internal(format!("密码校验任务失败: {e}")))??;

        if !matched {
            warn!(user_id = user.id, "登录失败：密码错误");
            return Err(LoyaltyError::InvalidCredentials);
        }

        info!(user_id = user.id, "用户登录成功");
        Ok(AuthToken {
            user_id: user.id,
            token: self.jwt.generate_token(user.id, &user.login)?,
        })
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::repository::MockUserRepositoryTrait;
    use chrono::Utc;
    use loyalty_shared::config::AuthConfig;

    const TEST_COST: u32 = 4;

    fn jwt() -> JwtManager {
        JwtManager::new(&AuthConfig::default())
    }

    fn user(password: &str) -> User {
        User {
            id: 7,
            login: "alice".to_string(),
            password_hash: hash_password(password, TEST_COST).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_create_user()
            .withf(|login, hash| login == "alice" && hash != "secret" && hash.starts_with("$2"))
            .times(1)
            .returning(|login, hash| {
                Ok(User {
                    id: 7,
                    login: login.to_string(),
                    password_hash: hash.to_string(),
                    created_at: Utc::now(),
                })
            });

        let service = AuthService::new(Arc::new(repo), jwt(), TEST_COST);
        let token = service.register("alice", "secret").await.unwrap();
        assert_eq!(token.user_id, 7);

        let claims = service.jwt().verify_token(&token.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_register_login_taken() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_create_user()
            .returning(|login, _| Err(LoyaltyError::LoginTaken(login.to_string())));

        let service = AuthService::new(Arc::new(repo), jwt(), TEST_COST);
        let err = service.register("alice", "secret").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::LoginTaken(_)));
    }

    #[tokio::test]
    async fn test_login_success() {
        let stored = user("secret");
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_login()
            .returning(move |_| Ok(Some(stored.clone())));

        let service = AuthService::new(Arc::new(repo), jwt(), TEST_COST);
        let token = service.login("alice", "secret").await.unwrap();
        assert_eq!(token.user_id, 7);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let stored = user("secret");
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_login()
            .returning(move |_| Ok(Some(stored.clone())));

        let service = AuthService::new(Arc::new(repo), jwt(), TEST_COST);
        let err = service.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let mut repo = MockUserRepositoryTrait::new();
        repo.expect_find_by_login().returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(repo), jwt(), TEST_COST);
        let err = service.login("bob", "secret").await.unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidCredentials));
    }
}
