use crate::error::DomainResult;
use async_trait::async_trait;

/// 可被 `UnitOfWorkController` 刷新的单元
///
/// 身份按引用（`Arc` 指针）区分；状态变化时由单元自行重新登记。
#[async_trait]
pub trait Flushable: Send + Sync {
    /// 单元名称（日志用）
    fn name(&self) -> &str;

    /// 是否存在待刷新的状态
    fn requires_flush(&self) -> bool;

    /// 将待刷新的状态写出；写出后 `requires_flush` 应返回 false（除非期间有新的变更）
    async fn flush(&self) -> DomainResult<()>;
}
