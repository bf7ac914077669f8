//! 事件总线（EventBus）协议
//!
//! 事件缓冲在刷新时逐条、按顺序调用 `publish`；投递语义（进程内分发、
//! 跨进程消息系统等）由实现决定，本库不提供跨进程投递保证。
//!
use crate::{error::DomainResult as Result, eventing::SerializedEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// 事件总线：负责分发事件
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &SerializedEvent) -> Result<()>;

    /// 按顺序逐条发布，遇到第一个失败即返回（已发布的事件不回滚）
    async fn publish_batch(&self, events: &[SerializedEvent]) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> EventBus for Arc<T>
where
    T: EventBus + ?Sized,
{
    async fn publish(&self, event: &SerializedEvent) -> Result<()> {
        (**self).publish(event).await
    }
}
