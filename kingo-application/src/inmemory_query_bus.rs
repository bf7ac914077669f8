use crate::{
    context::{AppContext, ContextFactory, OperationContext},
    error::AppError,
    query::Query,
    query_bus::QueryBus,
    query_handler::QueryHandler,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId, type_name, type_name_of_val};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

type BoxAnySend = Box<dyn Any + Send>;

type QueryHandlerFuture = Pin<Box<dyn Future<Output = Result<BoxAnySend, AppError>> + Send>>;

type QueryHandlerFn =
    Arc<dyn Fn(BoxAnySend, Arc<OperationContext>) -> QueryHandlerFuture + Send + Sync>;

/// 基于内存的 QueryBus 实现
/// - 通过 TypeId 显式注册不同 Query 对应的 Handler
/// - 以类型擦除方式调度，并在调用端进行结果还原
/// - 查询同样在 `OperationContext::run` 内执行
pub struct InMemoryQueryBus {
    factory: ContextFactory,
    handlers: DashMap<TypeId, (&'static str, QueryHandlerFn)>,
}

impl InMemoryQueryBus {
    pub fn new(factory: ContextFactory) -> Self {
        Self {
            factory,
            handlers: DashMap::new(),
        }
    }

    /// 注册查询处理器；同一查询重复注册返回 `AlreadyRegisteredQuery`
    pub fn register<Q, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let f: QueryHandlerFn = Arc::new(move |boxed_q, ctx| {
            let handler = handler.clone();

            Box::pin(async move {
                match boxed_q.downcast::<Q>() {
                    Ok(q) => {
                        let dto = handler.handle(&ctx, *q).await?;
                        Ok(Box::new(dto) as BoxAnySend)
                    }
                    Err(e) => Err(AppError::TypeMismatch {
                        expected: type_name::<Q>(),
                        found: type_name_of_val(&e),
                    }),
                }
            })
        });

        match self.handlers.entry(TypeId::of::<Q>()) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredQuery {
                query: Q::NAME,
                result: type_name::<Q::Dto>(),
            }),
            Entry::Vacant(slot) => {
                slot.insert((Q::NAME, f));
                Ok(())
            }
        }
    }

    /// 获取已注册的查询名列表（只读视图）
    pub fn registered_queries(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|e| e.value().0).collect()
    }
}

#[async_trait]
impl QueryBus for InMemoryQueryBus {
    async fn dispatch<Q: Query>(&self, app: &AppContext, q: Q) -> Result<Q::Dto, AppError> {
        let Some(f) = self.handlers.get(&TypeId::of::<Q>()).map(|h| h.1.clone()) else {
            return Err(AppError::HandlerNotFound(Q::NAME));
        };

        debug!(query = Q::NAME, "dispatching query");
        let out = OperationContext::run(&self.factory, app.clone(), move |ctx| {
            (f)(Box::new(q), ctx)
        })
        .await?;

        match out.downcast::<Q::Dto>() {
            Ok(dto) => Ok(*dto),
            Err(e) => Err(AppError::TypeMismatch {
                expected: type_name::<Q::Dto>(),
                found: type_name_of_val(&e),
            }),
        }
    }
}
