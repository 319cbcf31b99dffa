//! 订单号校验
//!
//! 订单号为 ASCII 数字串，使用 Luhn 校验和判定合法性。
//! 校验前去除所有空白字符；去除后仍包含非数字字符或少于 2 位即视为非法。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// 订单号最少位数
const MIN_DIGITS: usize = 2;

/// 判断订单号是否合法
///
/// 纯函数：结果只取决于去除空白后的数字序列。
pub fn is_valid_order_number(raw: &str) -> bool {
    let mut digits = Vec::with_capacity(raw.len());
    for ch in raw.chars().filter(|c| !c.is_whitespace()) {
        match ch.to_digit(10) {
            Some(d) if ch.is_ascii_digit() => digits.push(d),
            _ => return false,
        }
    }

    if digits.len() < MIN_DIGITS {
        return false;
    }

    luhn_sum(&digits) % 10 == 0
}

/// 从右往左，每隔一位（倒数第二位起）乘 2，大于 9 的减 9，再求和
fn luhn_sum(digits: &[u32]) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum()
}

/// 已通过校验的订单号
///
/// 内部保存去除空白后的规范形式，持久化和比较都使用该形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// 解析并校验订单号
    pub fn parse(raw: &str) -> Result<Self> {
        if !is_valid_order_number(raw) {
            return Err(LoyaltyError::InvalidOrderNumber(raw.trim().to_string()));
        }
        Ok(Self(raw.chars().filter(|c| !c.is_whitespace()).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = LoyaltyError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}
