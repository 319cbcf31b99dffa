//! 密码处理
//!
//! bcrypt 哈希，明文密码不落库

use bcrypt::{hash, verify};

use crate::error::{LoyaltyError, Result};

/// 对密码进行哈希处理
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    hash(password, cost).map_err(|e| LoyaltyError::Internal(format!("密码哈希失败: {}", e)))
}

/// 验证密码
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    verify(password, hash).map_err(|e| LoyaltyError::Internal(format!("密码验证失败: {}", e)))
}
