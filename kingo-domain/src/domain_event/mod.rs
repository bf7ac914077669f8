//! 领域事件（Domain Event）
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`），以及随事件一起投递的
//! 业务语境（`BusinessContext`）。

mod business_context;
mod domain_event_trait;

pub use business_context::BusinessContext;
pub use domain_event_trait::DomainEvent;
