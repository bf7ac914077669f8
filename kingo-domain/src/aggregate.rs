//! 聚合（Aggregate）抽象
//!
//! - `Aggregate`：具备唯一键与单调递增版本的领域实体；
//! - `AggregateRef`：工作单元与调用方共享的聚合句柄，调用方对聚合的修改
//!   （包括版本递增）对工作单元可见；句柄的身份即 `Arc` 指针身份；
//! - `TrackedAggregate`：句柄 + 加载/加入时捕获的原始版本。
//!
use crate::error::DomainResult;
use crate::version::Revision;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 聚合根接口
pub trait Aggregate: Send + Sync + 'static {
    /// 聚合类型名（用于日志与错误信息）
    const TYPE: &'static str;

    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;
    type Version: Revision;

    fn key(&self) -> &Self::Key;

    fn version(&self) -> Self::Version;

    /// 仅供聚合自身推进版本使用
    fn version_mut(&mut self) -> &mut Self::Version;

    /// 递增版本并返回新版本；已达上限时返回 `Overflow`，版本保持不变
    fn increment_version(&mut self) -> DomainResult<Self::Version> {
        let next = self.version().increment()?;
        *self.version_mut() = next;
        Ok(next)
    }
}

/// 共享聚合句柄
pub struct AggregateRef<A> {
    inner: Arc<RwLock<A>>,
}

impl<A: Aggregate> AggregateRef<A> {
    pub fn new(aggregate: A) -> Self {
        Self {
            inner: Arc::new(RwLock::new(aggregate)),
        }
    }

    // 锁内只存放聚合本身，中毒后数据仍然可用
    pub fn read(&self) -> RwLockReadGuard<'_, A> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, A> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> A::Key {
        self.read().key().clone()
    }

    pub fn version(&self) -> A::Version {
        self.read().version()
    }

    /// 是否为同一个聚合实例（而非键相等）
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 复制当前状态
    pub fn snapshot(&self) -> A
    where
        A: Clone,
    {
        self.read().clone()
    }
}

impl<A> Clone for AggregateRef<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Aggregate + fmt::Debug> fmt::Debug for AggregateRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AggregateRef").field(&*self.read()).finish()
    }
}

/// 被工作单元跟踪的聚合：句柄 + 原始版本
pub struct TrackedAggregate<A: Aggregate> {
    aggregate: AggregateRef<A>,
    original_version: A::Version,
}

impl<A: Aggregate> TrackedAggregate<A> {
    /// 以当前版本作为原始版本开始跟踪
    pub fn new(aggregate: AggregateRef<A>) -> Self {
        let original_version = aggregate.version();
        Self {
            aggregate,
            original_version,
        }
    }

    pub fn aggregate(&self) -> &AggregateRef<A> {
        &self.aggregate
    }

    pub fn original_version(&self) -> A::Version {
        self.original_version
    }

    pub fn has_been_updated(&self) -> bool {
        self.aggregate.version() != self.original_version
    }

    /// 写入存储后以写入的版本作为新的原始版本
    pub(crate) fn rebase(&mut self, written: A::Version) {
        self.original_version = written;
    }
}

impl<A: Aggregate> Clone for TrackedAggregate<A> {
    fn clone(&self) -> Self {
        Self {
            aggregate: self.aggregate.clone(),
            original_version: self.original_version,
        }
    }
}
