//! Kingo 领域层基础库（kingo-domain）
//!
//! 提供“一次逻辑操作内收集变更、最后统一刷新”所需的核心构件：
//! - 版本（`version`）：可互换的有序、可递增版本策略（计数器 / 时间戳）；
//! - 聚合（`aggregate`）：聚合接口、共享句柄与带原始版本的跟踪包装；
//! - 工作单元（`unit_of_work`）：聚合集合、工作单元与刷新控制器；
//! - 领域事件（`domain_event`）与事件子系统（`eventing`）：事件缓冲与事件总线；
//! - 存储（`persist`）：工作单元依赖的聚合存储协议与内存实现。
//!
//! 本 crate 不绑定任何存储或传输实现，也不持有“当前操作”的全局状态；
//! 操作上下文与消息分发位于 `kingo-application`。
//!
//! 典型用法：
//! 1. 用 `#[aggregate]` 定义聚合，实现 `AggregateStore`；
//! 2. 为一次操作创建 `UnitOfWorkController`、`UnitOfWork` 与 `EventBuffer`；
//! 3. 查找/加入/移除聚合并发布事件；
//! 4. 调用 `UnitOfWorkController::flush` 统一写出。
//!
pub mod aggregate;
pub mod domain_event;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod unit_of_work;
pub mod validation;
pub mod version;

// 允许在本 crate 内部通过 ::kingo_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::kingo_domain 路径。
extern crate self as kingo_domain;
