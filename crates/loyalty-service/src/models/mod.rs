//! 积分服务领域模型

pub mod balance;
pub mod enums;
pub mod order;
pub mod user;

pub use balance::{Balance, MAX_POINTS, Withdrawal};
pub use enums::OrderStatus;
pub use order::{AccrualResult, Order, SweepCursor};
pub use user::User;

/// 历史查询结果
///
/// "没有记录" 是独立的结果而不是错误，调用方需显式分支处理。
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<T> {
    Empty,
    Items(Vec<T>),
}

impl<T> Listing<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Items(items)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Empty => Vec::new(),
            Self::Items(items) => items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        match self {
            Self::Empty => Listing::Empty,
            Self::Items(items) => Listing::Items(items.into_iter().map(f).collect()),
        }
    }
}
