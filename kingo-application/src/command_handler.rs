use crate::{command::Command, context::OperationContext, error::AppError};
use async_trait::async_trait;

/// 命令处理器
///
/// `ctx` 为本次分发所在的操作上下文：通过它获取工作单元、发布事件。
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    async fn handle(&self, ctx: &OperationContext, cmd: C) -> Result<(), AppError>;
}
