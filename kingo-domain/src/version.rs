//! 聚合版本（Revision）
//!
//! 聚合以“有序、可递增的标识”记录自身修订号，工作单元据此判断聚合是否被修改
//! （当前版本 ≠ 加载时的原始版本），存储层据此实现乐观并发控制。
//!
//! 提供两种可互换的策略：
//! - `AggregateVersion`：从 0 开始的非负计数器；
//! - `DateTimeVersion`：基于 UTC 时间戳的版本，每次递增严格变大。
//!
use crate::error::{DomainError, DomainResult};
use chrono::{DateTime, TimeDelta, Utc};
use kingo_macros::value_object;
use std::fmt;
use std::hash::Hash;

/// 有序、可递增的版本标识
///
/// 约束：`increment` 返回的值严格大于原值；无法再递增时返回 `DomainError::Overflow`。
/// `Default` 为聚合创建时的初始版本。
pub trait Revision:
    Copy + Ord + Hash + fmt::Debug + fmt::Display + Default + Send + Sync + 'static
{
    fn increment(&self) -> DomainResult<Self>;
}

/// 数值版本号（用于乐观锁和并发控制）
///
/// # 示例
///
/// ```
/// use kingo_domain::version::{AggregateVersion, Revision};
///
/// let v1 = AggregateVersion::new();
/// assert!(v1.is_new());
///
/// let v2 = v1.increment().unwrap();
/// assert_eq!(v2.value(), 1);
/// assert!(v2 > v1);
///
/// assert!(AggregateVersion::MAX.increment().is_err());
/// ```
#[value_object(ordered = true)]
pub struct AggregateVersion(u32);

impl AggregateVersion {
    pub const MAX: Self = Self(u32::MAX);

    /// 创建初始版本（版本号为 0）
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_value(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    pub fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl Revision for AggregateVersion {
    fn increment(&self) -> DomainResult<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| DomainError::Overflow {
                value: self.to_string(),
            })
    }
}

impl fmt::Display for AggregateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for AggregateVersion {
    fn from(value: u32) -> Self {
        Self::from_value(value)
    }
}

impl From<AggregateVersion> for u32 {
    fn from(version: AggregateVersion) -> Self {
        version.value()
    }
}

/// 时间戳版本号
///
/// 递增取 `max(当前时间, 原值 + 1µs)`，即便时钟回拨或同一微秒内多次递增也严格变大。
#[value_object(ordered = true)]
pub struct DateTimeVersion(DateTime<Utc>);

impl DateTimeVersion {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub const fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Revision for DateTimeVersion {
    fn increment(&self) -> DomainResult<Self> {
        let next = self
            .0
            .checked_add_signed(TimeDelta::microseconds(1))
            .ok_or_else(|| DomainError::Overflow {
                value: self.to_string(),
            })?;

        Ok(Self(next.max(Utc::now())))
    }
}

impl fmt::Display for DateTimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for DateTimeVersion {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}
