//! 认证模块
//!
//! JWT Token 签发校验和 bcrypt 密码哈希

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtManager};
pub use password::{hash_password, verify_password};
