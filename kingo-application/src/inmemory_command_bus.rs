use crate::{
    command::Command,
    command_bus::CommandBus,
    command_handler::CommandHandler,
    context::{AppContext, ContextFactory, OperationContext},
    error::AppError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId, type_name_of_val};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

type CmdHandlerFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send>>;

type CmdHandlerFn =
    Arc<dyn Fn(Box<dyn Any + Send>, Arc<OperationContext>) -> CmdHandlerFuture + Send + Sync>;

/// 基于内存的 CommandBus 实现
/// - 通过 TypeId 显式注册不同 Command 对应的 Handler（一个命令只能有一个处理器）
/// - 运行时以类型擦除（Any）方式进行调度
/// - 每次分发都在 `OperationContext::run` 内执行
pub struct InMemoryCommandBus {
    factory: ContextFactory,
    handlers: DashMap<TypeId, (&'static str, CmdHandlerFn)>,
}

impl InMemoryCommandBus {
    pub fn new(factory: ContextFactory) -> Self {
        Self {
            factory,
            handlers: DashMap::new(),
        }
    }

    /// 注册命令处理器；同一命令重复注册返回 `AlreadyRegisteredCommand`
    pub fn register<C, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let f: CmdHandlerFn = Arc::new(move |boxed_cmd, ctx| {
            let handler = handler.clone();

            Box::pin(async move {
                // 键与闭包同一泛型 C，正常情况下 downcast 不会失败
                match boxed_cmd.downcast::<C>() {
                    Ok(cmd) => handler.handle(&ctx, *cmd).await,
                    Err(e) => Err(AppError::TypeMismatch {
                        expected: C::NAME,
                        found: type_name_of_val(&e),
                    }),
                }
            })
        });

        match self.handlers.entry(TypeId::of::<C>()) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredCommand { command: C::NAME }),
            Entry::Vacant(slot) => {
                slot.insert((C::NAME, f));
                Ok(())
            }
        }
    }

    /// 获取已注册的命令名列表（只读视图）
    pub fn registered_commands(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|e| e.value().0).collect()
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn dispatch<C: Command>(&self, app: &AppContext, cmd: C) -> Result<(), AppError> {
        let Some(f) = self.handlers.get(&TypeId::of::<C>()).map(|h| h.1.clone()) else {
            return Err(AppError::HandlerNotFound(C::NAME));
        };

        debug!(command = C::NAME, "dispatching command");
        OperationContext::run(&self.factory, app.clone(), move |ctx| {
            (f)(Box::new(cmd), ctx)
        })
        .await
    }
}
