//! 进程内事件总线（InProcessEventBus）
//!
//! 事件缓冲刷新时调用 `publish`：按注册顺序依次调用匹配的处理器，
//! 处理器运行在当前操作上下文内；随后（可选）转发给外部总线。
//!
use crate::context::OperationContext;
use crate::event_handler::{EventHandler, HandledEventType};
use async_trait::async_trait;
use kingo_domain::error::{DomainError, DomainResult};
use kingo_domain::eventing::{EventBus, SerializedEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
struct HandlerRegistry {
    by_type: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    all: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let mut by_type: HashMap<String, Vec<Arc<dyn EventHandler>>> = HashMap::new();
        let mut all: Vec<Arc<dyn EventHandler>> = Vec::new();

        for h in handlers {
            match h.handled_event_type() {
                HandledEventType::All => all.push(h),
                HandledEventType::One(t) => {
                    by_type.entry(t).or_default().push(h);
                }
                HandledEventType::Many(ts) => {
                    for t in ts {
                        by_type.entry(t).or_default().push(h.clone());
                    }
                }
            }
        }

        Self { by_type, all }
    }

    fn matching(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut merged: Vec<Arc<dyn EventHandler>> = Vec::new();
        if let Some(list) = self.by_type.get(event_type) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().cloned());
        merged
    }
}

pub struct InProcessEventBus {
    registry: HandlerRegistry,
    forward: Option<Arc<dyn EventBus>>,
}

impl InProcessEventBus {
    /// 以显式给出的处理器列表构建总线
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self {
            registry: HandlerRegistry::new(handlers),
            forward: None,
        }
    }

    /// 处理器全部成功后再转发给 `bus`（例如跨进程的消息总线）
    pub fn forward_to(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.forward = Some(bus);
        self
    }

    pub fn has_handlers_for(&self, event_type: &str) -> bool {
        !self.registry.matching(event_type).is_empty()
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    /// 匹配的处理器按顺序执行，第一个失败即返回 `EventHandler` 错误；
    /// 存在匹配处理器却没有当前操作上下文时返回 `EventBus` 错误。
    async fn publish(&self, event: &SerializedEvent) -> DomainResult<()> {
        let handlers = self.registry.matching(event.event_type());

        if !handlers.is_empty() {
            let ctx = OperationContext::current().ok_or_else(|| {
                DomainError::event_bus(format!(
                    "no operation context to handle {}",
                    event.event_type()
                ))
            })?;

            for handler in handlers {
                debug!(
                    handler = handler.handler_name(),
                    event_type = event.event_type(),
                    event_id = event.event_id(),
                    "handling event"
                );
                handler
                    .handle(&ctx, event)
                    .await
                    .map_err(|e| DomainError::EventHandler {
                        handler: handler.handler_name().to_string(),
                        reason: format!("{e:#}"),
                    })?;
            }
        }

        if let Some(forward) = &self.forward {
            forward.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::context::{AppContext, ContextFactory};
    use crate::error::AppError;
    use kingo_domain::domain_event::DomainEvent;
    use kingo_domain::eventing::InMemoryEventBus;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Step {
        n: u32,
    }

    impl DomainEvent for Step {
        fn event_type(&self) -> &str {
            "Step"
        }
    }

    /// 记录收到的事件；n < limit 时发布下一步事件
    struct Chain {
        name: &'static str,
        limit: u32,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Chain {
        fn handler_name(&self) -> &str {
            self.name
        }

        fn handled_event_type(&self) -> HandledEventType {
            HandledEventType::One("Step".into())
        }

        async fn handle(&self, ctx: &OperationContext, event: &SerializedEvent) -> anyhow::Result<()> {
            let step: Step = event.decode()?;
            self.seen.lock().unwrap().push(format!("{}:{}", self.name, step.n));
            if step.n < self.limit {
                ctx.publish(&Step { n: step.n + 1 })?;
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn handler_name(&self) -> &str {
            "failing"
        }

        fn handled_event_type(&self) -> HandledEventType {
            HandledEventType::All
        }

        async fn handle(&self, _ctx: &OperationContext, _event: &SerializedEvent) -> anyhow::Result<()> {
            anyhow::bail!("projection offline")
        }
    }

    #[test]
    fn registry_merges_typed_and_catch_all_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bus = InProcessEventBus::new(vec![
            Arc::new(Chain {
                name: "chain",
                limit: 0,
                seen,
            }),
            Arc::new(Failing),
        ]);
        assert_eq!(bus.registry.matching("Step").len(), 2);
        assert_eq!(bus.registry.matching("Other").len(), 1);
        assert!(bus.has_handlers_for("Other"));
    }

    // 处理器发布的事件在后续轮次中继续分发，最终收敛
    #[tokio::test]
    async fn handlers_cascade_within_one_operation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let outer = InMemoryEventBus::default();
        let bus = InProcessEventBus::new(vec![Arc::new(Chain {
            name: "chain",
            limit: 3,
            seen: seen.clone(),
        })])
        .forward_to(Arc::new(outer.clone()));
        let factory = ContextFactory::builder()
            .event_bus(Arc::new(bus))
            .config(ContextConfig::builder().max_flush_passes(8).build())
            .build();

        OperationContext::run(&factory, AppContext::default(), |ctx| async move {
            ctx.publish(&Step { n: 1 })?;
            Ok::<_, AppError>(())
        })
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["chain:1", "chain:2", "chain:3"]
        );
        assert_eq!(outer.published().len(), 3);
    }

    #[tokio::test]
    async fn handler_failure_becomes_event_handler_error() {
        let outer = InMemoryEventBus::default();
        let bus = InProcessEventBus::new(vec![Arc::new(Failing)]).forward_to(Arc::new(outer.clone()));
        let factory = ContextFactory::builder().event_bus(Arc::new(bus)).build();

        let err = OperationContext::run(&factory, AppContext::default(), |ctx| async move {
            ctx.publish(&Step { n: 1 })?;
            Ok::<_, AppError>(())
        })
        .await
        .unwrap_err();

        match err {
            AppError::Domain(DomainError::EventHandler { handler, reason }) => {
                assert_eq!(handler, "failing");
                assert_eq!(reason, "projection offline");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(outer.published().is_empty());
    }

    #[tokio::test]
    async fn publishing_outside_an_operation_is_rejected() {
        let bus = InProcessEventBus::new(vec![Arc::new(Failing)]);
        let event = SerializedEvent::from_event(&Step { n: 1 }, Default::default()).unwrap();

        let err = bus.publish(&event).await.unwrap_err();
        assert!(matches!(err, DomainError::EventBus { .. }));

        // 没有匹配的处理器时无需上下文
        let empty = InProcessEventBus::new(Vec::new());
        empty.publish(&event).await.unwrap();
    }
}
