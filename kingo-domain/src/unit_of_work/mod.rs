//! 工作单元（unit_of_work）
//!
//! 一次逻辑操作内的变更跟踪与统一刷新：
//! - `AggregateSet`：键 → 被跟踪聚合的集合；
//! - `UnitOfWork`：按聚合类型维护 selected/inserted/deleted 三个集合，
//!   按“删除 → 更新 → 插入”的顺序刷新到存储；
//! - `UnitOfWorkController`：登记（enlist）有待刷新的单元，并反复刷新直到稳定；
//! - `Flushable`：可被控制器刷新的单元协议（工作单元、事件缓冲等）。
//!
//! 刷新是“尽力而为”而非事务：某个单元刷新失败时，同一轮中其他单元已完成的写入
//! 不会回滚，失败单元也不会被自动重新登记；需要完整一致性时由调用方重跑整个操作。
//!
mod aggregate_set;
mod controller;
mod flushable;
#[allow(clippy::module_inception)]
mod unit_of_work;

pub use aggregate_set::AggregateSet;
pub use controller::UnitOfWorkController;
pub use flushable::Flushable;
pub use unit_of_work::UnitOfWork;
