//! JWT Token 处理

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loyalty_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    pub login: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| LoyaltyError::Unauthorized("Token 中的用户 ID 无效".to_string()))
    }
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    issuer: String,
    expires_in_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            expires_in_secs: config.jwt_expires_secs,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// 生成 JWT Token
    pub fn generate_token(&self, user_id: i64, login: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            login: login.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| LoyaltyError::Internal(format!("JWT 生成失败: {}", e)))
    }

    /// 验证并解析 JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => LoyaltyError::Unauthorized("Token 已过期".into()),
                ErrorKind::InvalidToken => LoyaltyError::Unauthorized("无效的 Token".into()),
                _ => LoyaltyError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(secret: &str) -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_generate_and_verify() {
        let jwt = manager("test-secret");
        let token = jwt.generate_token(42, "alice").unwrap();

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.login, "alice");
        assert_eq!(claims.iss, "gophermart");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = manager("secret-a").generate_token(1, "alice").unwrap();
        let err = manager("secret-b").verify_token(&token).unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = JwtManager::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expires_secs: -3600,
            ..Default::default()
        });
        let token = jwt.generate_token(1, "alice").unwrap();
        let err = jwt.verify_token(&token).unwrap_err();
        assert!(matches!(err, LoyaltyError::Unauthorized(msg) if msg.contains("过期")));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(manager("test-secret").verify_token("not-a-jwt").is_err());
    }
}
