//! 聚合仓储（Repository）
//!
//! 处理器使用的聚合访问入口：在给定操作上下文内取得该聚合类型的工作单元，
//! 并把“查找不到”翻译为 `AppError::AggregateNotFound`。
//!
use crate::context::OperationContext;
use crate::error::{AppError, AppResult};
use kingo_domain::aggregate::{Aggregate, AggregateRef};
use kingo_domain::persist::AggregateStore;
use kingo_domain::unit_of_work::UnitOfWork;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct Repository<A, S> {
    store: Arc<S>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A, S> Clone for Repository<A, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A, S> Repository<A, S>
where
    A: Aggregate + Clone,
    S: AggregateStore<A> + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    pub fn unit_of_work(&self, ctx: &OperationContext) -> AppResult<Arc<UnitOfWork<A, S>>> {
        ctx.unit_of_work::<A, S>(self.store.clone())
    }

    pub async fn find(
        &self,
        ctx: &OperationContext,
        key: &A::Key,
    ) -> AppResult<Option<AggregateRef<A>>> {
        Ok(self.unit_of_work(ctx)?.try_find(key).await?)
    }

    /// 找不到时返回 `AggregateNotFound`
    pub async fn get(&self, ctx: &OperationContext, key: &A::Key) -> AppResult<AggregateRef<A>> {
        self.find(ctx, key)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound {
                aggregate_type: A::TYPE,
                key: key.to_string(),
            })
    }

    /// 加入新聚合，返回其共享句柄
    pub fn add(&self, ctx: &OperationContext, aggregate: A) -> AppResult<AggregateRef<A>> {
        let handle = AggregateRef::new(aggregate);
        self.unit_of_work(ctx)?.add(handle.clone())?;
        Ok(handle)
    }

    pub fn remove(&self, ctx: &OperationContext, aggregate: &AggregateRef<A>) -> AppResult<()> {
        Ok(self.unit_of_work(ctx)?.remove(aggregate)?)
    }
}
