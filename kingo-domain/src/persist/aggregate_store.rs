use crate::{aggregate::Aggregate, error::DomainResult};
use async_trait::async_trait;
use std::sync::Arc;

/// 聚合存储协议
#[async_trait]
pub trait AggregateStore<A>: Send + Sync
where
    A: Aggregate,
{
    /// 按键查询；不存在时返回 `Ok(None)`
    async fn try_select(&self, key: &A::Key) -> DomainResult<Option<A>>;

    async fn insert(&self, aggregate: &A) -> DomainResult<()>;

    /// `original_version` 为聚合被加载时的版本，实现可据此做乐观并发校验
    async fn update(&self, aggregate: &A, original_version: A::Version) -> DomainResult<()>;

    async fn delete(&self, aggregate: &A) -> DomainResult<()>;
}

#[async_trait]
impl<A, T> AggregateStore<A> for Arc<T>
where
    A: Aggregate,
    T: AggregateStore<A> + ?Sized,
{
    async fn try_select(&self, key: &A::Key) -> DomainResult<Option<A>> {
        (**self).try_select(key).await
    }

    async fn insert(&self, aggregate: &A) -> DomainResult<()> {
        (**self).insert(aggregate).await
    }

    async fn update(&self, aggregate: &A, original_version: A::Version) -> DomainResult<()> {
        (**self).update(aggregate, original_version).await
    }

    async fn delete(&self, aggregate: &A) -> DomainResult<()> {
        (**self).delete(aggregate).await
    }
}
