//! 聚合存储（persist）
//!
//! 工作单元对持久化的全部假设只有四个操作：按键查询、插入、带原始版本的更新、删除。
//! 具体后端（SQL、文档库、内存测试替身等）由上层实现并注入。
//!
mod aggregate_store;
mod store_inmemory;

pub use aggregate_store::AggregateStore;
pub use store_inmemory::InMemoryAggregateStore;
