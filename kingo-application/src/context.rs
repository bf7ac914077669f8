//! 操作上下文（Operation Context）
//!
//! 一次逻辑操作（一条命令/查询及其引发的事件处理）共享：
//! - 一个 `UnitOfWorkController`：所有工作单元与事件缓冲都登记到这里；
//! - 一个 `ScopeCache`：按类型缓存的工作单元等对象；
//! - 一个事件缓冲栈：栈底对应根事件总线，嵌套作用域可压入自己的总线。
//!
//! 上下文以 `Arc<OperationContext>` 显式传递给处理器；`tokio::task_local!`
//! 只在宿主边界（`OperationContext::run`）安装，用于让嵌套的分发找到外层上下文。
//! 只有最外层（owner）作用域负责刷新与释放，嵌套作用域不触碰共享状态。
//!
use crate::cache::ScopeCache;
use crate::config::ContextConfig;
use crate::error::AppResult;
use bon::Builder;
use kingo_domain::aggregate::Aggregate;
use kingo_domain::domain_event::{BusinessContext, DomainEvent};
use kingo_domain::error::DomainError;
use kingo_domain::eventing::{EventBuffer, EventBus};
use kingo_domain::persist::AggregateStore;
use kingo_domain::unit_of_work::{Flushable, UnitOfWork, UnitOfWorkController};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/查询）所需的横切信息，例如：
/// - 业务语境（`BusinessContext`）：关联追踪 `correlation_id`、因果链 `causation_id`、
///   执行者类型/ID 等，会附加到本次操作发布的每一条事件上；
/// - 幂等键（`idempotency_key`）：用于在基础设施层实现请求幂等（如 API 层重复提交保护）。
///
/// 典型用法：
/// ```rust
/// use kingo_application::context::AppContext;
/// use kingo_domain::domain_event::BusinessContext;
///
/// let ctx = AppContext {
///     biz: BusinessContext::builder()
///         .correlation_id("cor-123".into())
///         .actor_type("user".into())
///         .actor_id("u-1".into())
///         .build(),
///     idempotency_key: Some("idem-xyz".into()),
/// };
/// assert_eq!(ctx.biz.correlation_id(), Some("cor-123"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、审计主体、操作因果）
    pub biz: BusinessContext,
    /// 幂等键（可选）：为空则由上层或基础设施决定是否参与幂等
    pub idempotency_key: Option<String>,
}

tokio::task_local! {
    static CURRENT: Arc<OperationContext>;
}

/// 创建操作上下文的工厂：根事件总线 + 配置
#[derive(Clone, Builder)]
pub struct ContextFactory {
    event_bus: Arc<dyn EventBus>,
    #[builder(default)]
    config: ContextConfig,
}

impl ContextFactory {
    pub fn create(&self, app: AppContext) -> Arc<OperationContext> {
        OperationContext::new(app, self.event_bus.clone(), &self.config)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<dyn EventBus> {
        &self.event_bus
    }
}

pub struct OperationContext {
    id: Uuid,
    app: AppContext,
    controller: Arc<UnitOfWorkController>,
    cache: ScopeCache,
    buffers: Mutex<Vec<Arc<EventBuffer>>>,
    cancellation: CancellationToken,
    disposed: AtomicBool,
}

impl OperationContext {
    pub fn new(app: AppContext, event_bus: Arc<dyn EventBus>, config: &ContextConfig) -> Arc<Self> {
        let controller = UnitOfWorkController::new(config.max_flush_passes());
        let root = EventBuffer::new(event_bus, controller.clone(), app.biz.clone());
        let id = Uuid::new_v4();
        debug!(operation = %id, "operation context created");

        Arc::new(Self {
            id,
            app,
            controller,
            cache: ScopeCache::new(),
            buffers: Mutex::new(vec![root]),
            cancellation: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// 当前异步流程所属的上下文；不在任何操作内时返回 `None`
    pub fn current() -> Option<Arc<Self>> {
        CURRENT.try_with(Arc::clone).ok()
    }

    /// 在操作作用域内执行 `f`
    ///
    /// 没有外层上下文时创建新上下文并成为 owner：`f` 成功后刷新并释放上下文，
    /// 失败时丢弃所有未刷新的变更；已有外层上下文时只参与其中，不刷新也不释放。
    pub async fn run<T, F, Fut>(factory: &ContextFactory, app: AppContext, f: F) -> AppResult<T>
    where
        F: FnOnce(Arc<OperationContext>) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let parent = Self::current();
        let scope = OperationScope::begin(parent.as_ref(), factory, app);
        let context = scope.context().clone();
        let installed = context.clone();

        let body = async move {
            match f(context).await {
                Ok(value) => {
                    scope.complete().await?;
                    Ok(value)
                }
                Err(err) => {
                    scope.discard();
                    Err(err)
                }
            }
        };

        if parent.is_some() {
            body.await
        } else {
            CURRENT.scope(installed, body).await
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn controller(&self) -> &Arc<UnitOfWorkController> {
        &self.controller
    }

    pub fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> AppResult<()> {
        if self.is_disposed() {
            return Err(DomainError::disposed("OperationContext").into());
        }
        Ok(())
    }

    fn lock_buffers(&self) -> MutexGuard<'_, Vec<Arc<EventBuffer>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enlist(&self, unit: Arc<dyn Flushable>) -> AppResult<()> {
        self.ensure_alive()?;
        Ok(self.controller.enlist(unit)?)
    }

    /// 栈顶的事件缓冲（最内层作用域指定的总线）
    pub fn event_buffer(&self) -> AppResult<Arc<EventBuffer>> {
        self.ensure_alive()?;
        self.lock_buffers()
            .last()
            .cloned()
            .ok_or_else(|| DomainError::disposed("EventBuffer").into())
    }

    pub fn publish<E: DomainEvent>(&self, event: &E) -> AppResult<()> {
        Ok(self.event_buffer()?.publish(event)?)
    }

    /// 本上下文内 `store` 对应的工作单元
    ///
    /// 按存储实例区分：同一上下文内对同一个 `store` 多次调用返回同一工作单元，
    /// 同类型的不同存储各有自己的工作单元。
    pub fn unit_of_work<A, S>(&self, store: Arc<S>) -> AppResult<Arc<UnitOfWork<A, S>>>
    where
        A: Aggregate + Clone,
        S: AggregateStore<A> + 'static,
    {
        self.ensure_alive()?;
        // 工作单元持有 `store`，缓存条目存续期间该地址不会被复用
        let instance = Arc::as_ptr(&store) as usize;
        self.cache.get_or_insert_for(instance, || {
            UnitOfWork::new(store, self.controller.clone())
        })
    }

    fn push_buffer(&self, buffer: Arc<EventBuffer>) {
        self.lock_buffers().push(buffer);
    }

    fn pop_buffer(&self, buffer: &Arc<EventBuffer>) {
        let mut buffers = self.lock_buffers();
        if let Some(pos) = buffers.iter().rposition(|b| Arc::ptr_eq(b, buffer)) {
            buffers.remove(pos);
        }
    }

    /// 刷新所有登记的单元直到稳定，返回执行的轮数
    async fn flush(&self) -> AppResult<usize> {
        self.ensure_alive()?;
        Ok(self.controller.flush(&self.cancellation).await?)
    }

    /// 释放缓存、关闭事件缓冲与控制器；之后的登记/发布返回 `ObjectDisposed`
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.dispose();
        for buffer in std::mem::take(&mut *self.lock_buffers()) {
            buffer.close();
        }
        self.controller.close();
        debug!(operation = %self.id, "operation context disposed");
    }
}

/// 操作作用域
///
/// owner 作用域结束时刷新并释放上下文；participant 作用域只弹出自己压入的事件缓冲。
pub struct OperationScope {
    context: Arc<OperationContext>,
    owner: bool,
    pushed: Option<Arc<EventBuffer>>,
    finished: bool,
}

impl OperationScope {
    /// 开始一个作用域：没有 `parent` 时用 `factory` 与 `app` 创建新上下文并成为 owner；
    /// 有 `parent` 时等同于 [`OperationScope::participate`]，`factory` 与 `app` 不会被使用，
    /// 参与者沿用外层上下文的事件总线与业务语境。
    pub fn begin(
        parent: Option<&Arc<OperationContext>>,
        factory: &ContextFactory,
        app: AppContext,
    ) -> Self {
        match parent {
            Some(parent) => Self::participate(parent),
            None => Self::own(factory.create(app)),
        }
    }

    /// 参与已有上下文：结束时既不刷新也不释放
    pub fn participate(parent: &Arc<OperationContext>) -> Self {
        debug!(operation = %parent.id(), owner = false, "operation scope begun");
        Self {
            context: parent.clone(),
            owner: false,
            pushed: None,
            finished: false,
        }
    }

    fn own(context: Arc<OperationContext>) -> Self {
        debug!(operation = %context.id(), owner = true, "operation scope begun");
        Self {
            context,
            owner: true,
            pushed: None,
            finished: false,
        }
    }

    /// 在 `parent` 内开始一个使用独立事件总线的嵌套作用域
    ///
    /// 作用域存续期间发布的事件进入新的事件缓冲并投递到 `bus`；
    /// 该缓冲仍登记在共享控制器上，由 owner 统一刷新。
    pub fn with_event_bus(
        parent: &Arc<OperationContext>,
        bus: Arc<dyn EventBus>,
    ) -> AppResult<Self> {
        parent.ensure_alive()?;
        let buffer = EventBuffer::new(bus, parent.controller.clone(), parent.app.biz.clone());
        parent.push_buffer(buffer.clone());
        Ok(Self {
            context: parent.clone(),
            owner: false,
            pushed: Some(buffer),
            finished: false,
        })
    }

    pub fn context(&self) -> &Arc<OperationContext> {
        &self.context
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    fn leave(&mut self) {
        self.finished = true;
        if let Some(buffer) = self.pushed.take() {
            self.context.pop_buffer(&buffer);
        }
    }

    /// 正常结束作用域
    ///
    /// owner：刷新控制器（直到稳定），然后释放上下文；刷新失败时同样释放并返回错误。
    pub async fn complete(mut self) -> AppResult<()> {
        self.leave();
        if !self.owner {
            return Ok(());
        }

        let result = self.context.flush().await;
        self.context.dispose();
        match &result {
            Ok(passes) => debug!(operation = %self.context.id(), passes, "operation completed"),
            Err(err) => debug!(operation = %self.context.id(), error = %err, "operation flush failed"),
        }
        result.map(|_| ())
    }

    /// 放弃作用域：owner 丢弃所有未刷新的变更并释放上下文
    pub fn discard(mut self) {
        self.leave();
        if self.owner {
            debug!(operation = %self.context.id(), "operation discarded");
            self.context.dispose();
        }
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.leave();
        if self.owner {
            warn!(
                operation = %self.context.id(),
                pending = self.context.controller().pending(),
                "operation scope dropped without completing, pending work discarded"
            );
            self.context.dispose();
        }
    }
}
