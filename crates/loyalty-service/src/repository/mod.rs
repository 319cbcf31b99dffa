//! 数据仓储层
//!
//! - PostgreSQL 实现：生产使用，事务由单个仓储方法内部完成
//! - 内存实现：测试和本地运行
//! - 定义 trait 接口以支持 mock 测试
//!
//! 所有 PostgreSQL 调用都受单次超时限制，超时的事务随 future 一起被丢弃并回滚。

mod balance_repo;
mod memory;
mod order_repo;
mod traits;
mod user_repo;

pub use balance_repo::BalanceRepository;
pub use memory::MemoryStore;
pub use order_repo::OrderRepository;
pub use traits::*;
pub use user_repo::UserRepository;
