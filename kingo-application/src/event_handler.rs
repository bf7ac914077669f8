//! 事件处理器（EventHandler）
//!
//! 定义在进程内消费某类/多类/全部事件的处理逻辑与元信息（名称、订阅类型）。
//!
use crate::context::OperationContext;
use async_trait::async_trait;
use kingo_domain::eventing::SerializedEvent;

#[derive(Clone, Debug)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

/// 事件处理器：在发布事件的操作上下文内处理事件
///
/// 处理器对聚合的修改与再次发布的事件会登记到同一控制器，在后续刷新轮次中写出。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与错误信息）
    fn handler_name(&self) -> &str;
    /// 返回该处理器支持的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件
    async fn handle(&self, ctx: &OperationContext, event: &SerializedEvent) -> anyhow::Result<()>;
}
