use crate::{context::OperationContext, error::AppError, query::Query};
use async_trait::async_trait;

#[async_trait]
pub trait QueryHandler<Q>: Send + Sync
where
    Q: Query,
{
    async fn handle(&self, ctx: &OperationContext, q: Q) -> Result<Q::Dto, AppError>;
}
