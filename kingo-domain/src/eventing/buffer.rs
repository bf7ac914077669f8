//! 事件缓冲（EventBuffer）
//!
//! 一次操作内产生的领域事件先进入缓冲，由控制器在刷新时按发布顺序交给事件总线。
//!
use crate::domain_event::{BusinessContext, DomainEvent};
use crate::error::{DomainError, DomainResult};
use crate::eventing::{EventBus, SerializedEvent};
use crate::unit_of_work::{Flushable, UnitOfWorkController};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

pub struct EventBuffer {
    me: Weak<Self>,
    bus: Arc<dyn EventBus>,
    controller: Arc<UnitOfWorkController>,
    context: BusinessContext,
    events: Mutex<Vec<SerializedEvent>>,
    closed: AtomicBool,
}

impl EventBuffer {
    /// `context` 会附加到经由本缓冲发布的每一条事件上
    pub fn new(
        bus: Arc<dyn EventBus>,
        controller: Arc<UnitOfWorkController>,
        context: BusinessContext,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            bus,
            controller,
            context,
            events: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn lock_events(&self) -> MutexGuard<'_, Vec<SerializedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 缓冲一条事件
    ///
    /// 先复制事件再校验副本，校验失败返回 `InvalidEvent` 且事件不会进入缓冲；
    /// 成功后追加到缓冲末尾并把自身登记到控制器。不做任何 I/O。
    pub fn publish<E: DomainEvent>(&self, event: &E) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::disposed("EventBuffer"));
        }

        let copy = event.clone();
        copy.validate().map_err(|errors| DomainError::InvalidEvent {
            event_type: copy.event_type().to_string(),
            errors,
        })?;
        let serialized = SerializedEvent::from_event(&copy, self.context.clone())?;

        self.lock_events().push(serialized);

        let me = self
            .me
            .upgrade()
            .ok_or_else(|| DomainError::disposed("EventBuffer"))?;
        self.controller.enlist(me)
    }

    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    pub fn context(&self) -> &BusinessContext {
        &self.context
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 关闭缓冲并丢弃尚未发布的事件
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.lock_events().clear();
    }

    /// 取出当前缓冲（替换为空列表）并按顺序发布
    ///
    /// 刷新期间发布的新事件进入新的缓冲，由后续轮次发布，不丢失也不重复。
    /// 某条事件发布失败时刷新立即失败，已发布的事件不会回滚，本批剩余事件被丢弃。
    pub async fn flush(&self) -> DomainResult<()> {
        let batch = std::mem::take(&mut *self.lock_events());
        if batch.is_empty() {
            return Ok(());
        }

        debug!(events = batch.len(), "publishing buffered events");
        for event in &batch {
            self.bus.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Flushable for EventBuffer {
    fn name(&self) -> &str {
        "EventBuffer"
    }

    fn requires_flush(&self) -> bool {
        !self.is_empty()
    }

    async fn flush(&self) -> DomainResult<()> {
        EventBuffer::flush(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::InMemoryEventBus;
    use crate::validation::ErrorInfo;
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tick {
        n: u32,
    }

    impl DomainEvent for Tick {
        fn event_type(&self) -> &str {
            "Tick"
        }

        fn validate(&self) -> Result<(), ErrorInfo> {
            let mut info = ErrorInfo::new();
            if self.n == 0 {
                info.add_member_error("n", "must be positive");
            }
            info.into_result()
        }
    }

    fn ticks(bus: &InMemoryEventBus) -> Vec<u32> {
        bus.published()
            .iter()
            .map(|e| e.decode::<Tick>().unwrap().n)
            .collect()
    }

    fn buffer_on(bus: Arc<dyn EventBus>) -> (Arc<UnitOfWorkController>, Arc<EventBuffer>) {
        let controller = UnitOfWorkController::new(8);
        let buffer = EventBuffer::new(bus, controller.clone(), BusinessContext::default());
        (controller, buffer)
    }

    #[tokio::test]
    async fn events_are_published_in_order() {
        let bus = InMemoryEventBus::default();
        let (controller, buffer) = buffer_on(Arc::new(bus.clone()));

        for n in 1..=5 {
            buffer.publish(&Tick { n }).unwrap();
        }
        assert!(buffer.requires_flush());
        assert!(bus.published().is_empty());

        controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(ticks(&bus), vec![1, 2, 3, 4, 5]);
        assert!(!buffer.requires_flush());
    }

    #[tokio::test]
    async fn buffered_event_is_a_copy() {
        let bus = InMemoryEventBus::default();
        let (_, buffer) = buffer_on(Arc::new(bus.clone()));

        let mut tick = Tick { n: 1 };
        buffer.publish(&tick).unwrap();
        tick.n = 2;

        buffer.flush().await.unwrap();
        assert_eq!(ticks(&bus), vec![1]);
    }

    #[tokio::test]
    async fn invalid_event_never_enters_the_buffer() {
        let bus = InMemoryEventBus::default();
        let (controller, buffer) = buffer_on(Arc::new(bus.clone()));

        let err = buffer.publish(&Tick { n: 0 }).unwrap_err();
        match err {
            DomainError::InvalidEvent { event_type, errors } => {
                assert_eq!(event_type, "Tick");
                assert_eq!(errors.member_errors()["n"], vec!["must be positive"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(buffer.is_empty());
        assert_eq!(controller.pending(), 0);
    }

    #[tokio::test]
    async fn publish_after_close_is_object_disposed() {
        let bus = InMemoryEventBus::default();
        let (_, buffer) = buffer_on(Arc::new(bus));
        buffer.publish(&Tick { n: 1 }).unwrap();
        buffer.close();

        assert!(buffer.is_empty());
        let err = buffer.publish(&Tick { n: 2 }).unwrap_err();
        assert!(matches!(err, DomainError::ObjectDisposed { .. }));
    }

    /// 在发布第一条事件时向同一缓冲再发布一条事件的总线
    struct ReentrantBus {
        inner: InMemoryEventBus,
        buffer: Mutex<Option<Weak<EventBuffer>>>,
    }

    #[async_trait]
    impl EventBus for ReentrantBus {
        async fn publish(&self, event: &SerializedEvent) -> DomainResult<()> {
            self.inner.publish(event).await?;
            let buffer = self.buffer.lock().unwrap().take();
            if let Some(buffer) = buffer.and_then(|b| b.upgrade()) {
                buffer.publish(&Tick { n: 99 })?;
            }
            Ok(())
        }
    }

    // 刷新期间发布的事件恰好投递一次，且在本批之后
    #[tokio::test]
    async fn publish_during_flush_is_delivered_once_in_next_pass() {
        let inner = InMemoryEventBus::default();
        let bus = Arc::new(ReentrantBus {
            inner: inner.clone(),
            buffer: Mutex::new(None),
        });
        let (controller, buffer) = buffer_on(bus.clone());
        *bus.buffer.lock().unwrap() = Some(Arc::downgrade(&buffer));

        for n in 1..=3 {
            buffer.publish(&Tick { n }).unwrap();
        }

        let passes = controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(passes, 2);
        assert_eq!(ticks(&inner), vec![1, 2, 3, 99]);
    }

    struct FailingBus {
        inner: InMemoryEventBus,
        fail_on: u32,
    }

    #[async_trait]
    impl EventBus for FailingBus {
        async fn publish(&self, event: &SerializedEvent) -> DomainResult<()> {
            if event.decode::<Tick>()?.n == self.fail_on {
                return Err(DomainError::event_bus("broker unavailable"));
            }
            self.inner.publish(event).await
        }
    }

    // 发布失败：错误原样传出，已发布事件保留，剩余事件不再发布
    #[tokio::test]
    async fn bus_failure_aborts_flush_without_rollback() {
        let inner = InMemoryEventBus::default();
        let (controller, buffer) = buffer_on(Arc::new(FailingBus {
            inner: inner.clone(),
            fail_on: 2,
        }));
        for n in 1..=3 {
            buffer.publish(&Tick { n }).unwrap();
        }

        let err = controller
            .flush(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EventBus { .. }));
        assert_eq!(ticks(&inner), vec![1]);
        assert!(buffer.is_empty());
    }
}
