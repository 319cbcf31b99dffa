//! 用户仓储

use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::timeout::bounded;
use sqlx::PgPool;

use super::traits::UserRepositoryTrait;
use crate::error::{LoyaltyError, Result, is_unique_violation};
use crate::models::User;

pub struct UserRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl UserRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User> {
        bounded(self.call_timeout, "create_user", async {
            let mut tx = self.pool.begin().await?;

            let user = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (login, password_hash)
                VALUES ($1, $2)
                RETURNING id, login, password_hash, created_at
                "#,
            )
            .bind(login)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LoyaltyError::LoginTaken(login.to_string())
                } else {
                    LoyaltyError::from(e)
                }
            })?;

            sqlx::query("INSERT INTO balances (user_id) VALUES ($1)")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(user)
        })
        .await
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        bounded(self.call_timeout, "find_by_login", async {
            let user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, login, password_hash, created_at
                FROM users
                WHERE login = $1
                "#,
            )
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

            Ok(user)
        })
        .await
    }
}
