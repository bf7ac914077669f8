use crate::{command::Command, context::AppContext, error::AppError};
use async_trait::async_trait;

/// 命令总线（Command Bus）
///
/// - 负责根据命令的具体类型路由到对应的处理器；
/// - 每次分发都在一个操作作用域内执行：最外层分发负责刷新，嵌套分发只参与；
/// - 该 trait 带有泛型方法，通常以具体实现类型注入使用。
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// 分发命令到对应处理器
    ///
    /// - `app`：应用上下文（链路追踪、幂等键等），仅在创建新操作上下文时使用
    /// - `cmd`：具体命令实例
    async fn dispatch<C>(&self, app: &AppContext, cmd: C) -> Result<(), AppError>
    where
        C: Command;
}
