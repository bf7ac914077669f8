use crate::validation::ErrorInfo;
use serde::Serialize;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
///
/// 事件在发布时会被复制一份再校验，调用方之后对原实例的修改不会影响已缓冲的事件。
pub trait DomainEvent: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    /// 事件类型（形如 `OrderEvent.Created` 或自定义类型名），用于路由处理器
    fn event_type(&self) -> &str;

    /// 事件自检；返回的错误详情会随 `DomainError::InvalidEvent` 传出
    fn validate(&self) -> Result<(), ErrorInfo> {
        Ok(())
    }
}
