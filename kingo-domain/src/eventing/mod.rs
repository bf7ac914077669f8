//! 事件子系统（eventing）
//!
//! - `SerializedEvent`：事件在总线上的投递形态；
//! - `EventBus`：事件发布协议，`InMemoryEventBus` 为基于广播通道的内存实现；
//! - `EventBuffer`：一次操作内的事件缓冲，作为可刷新单元登记到控制器，
//!   刷新时按发布顺序交给事件总线。
//!
//! 该模块不绑定具体传输实现，可对接任意消息系统或内存实现。
//!
mod buffer;
mod bus;
mod bus_inmemory;
mod serialized_event;

pub use buffer::EventBuffer;
pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use serialized_event::SerializedEvent;
