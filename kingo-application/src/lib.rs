//! Kingo 应用层（kingo-application）
//!
//! - 操作上下文（`context`）：一次逻辑操作共享的控制器、缓存与事件缓冲栈，
//!   以及 owner/participant 作用域；
//! - 命令/查询总线：显式注册、按类型分发，每次分发都在操作作用域内执行；
//! - 进程内事件总线：在当前操作内调用事件处理器，处理器产生的变更在后续刷新轮次写出；
//! - 仓储（`repository`）：经由工作单元访问聚合。
//!
pub mod cache;
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod config;
pub mod context;
pub mod dto;
pub mod error;
pub mod event_handler;
pub mod in_process_event_bus;
pub mod inmemory_command_bus;
pub mod inmemory_query_bus;
pub mod query;
pub mod query_bus;
pub mod query_handler;
pub mod repository;

pub use in_process_event_bus::InProcessEventBus;
pub use inmemory_command_bus::InMemoryCommandBus;
pub use inmemory_query_bus::InMemoryQueryBus;
