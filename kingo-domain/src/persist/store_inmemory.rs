//! 内存版聚合存储（InMemoryAggregateStore）
//!
//! 以 `DashMap` 保存聚合副本，`update` 按原始版本做乐观并发校验，
//! 适用于测试、示例与本地开发。
//!
use crate::aggregate::Aggregate;
use crate::error::{DomainError, DomainResult};
use crate::persist::AggregateStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub struct InMemoryAggregateStore<A>
where
    A: Aggregate,
{
    rows: DashMap<A::Key, A>,
}

impl<A> Default for InMemoryAggregateStore<A>
where
    A: Aggregate,
{
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<A> InMemoryAggregateStore<A>
where
    A: Aggregate + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入初始数据（不经过工作单元）
    pub fn seed(&self, aggregate: A) {
        self.rows.insert(aggregate.key().clone(), aggregate);
    }

    pub fn get(&self, key: &A::Key) -> Option<A> {
        self.rows.get(key).map(|row| row.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl<A> AggregateStore<A> for InMemoryAggregateStore<A>
where
    A: Aggregate + Clone,
{
    async fn try_select(&self, key: &A::Key) -> DomainResult<Option<A>> {
        Ok(self.get(key))
    }

    async fn insert(&self, aggregate: &A) -> DomainResult<()> {
        match self.rows.entry(aggregate.key().clone()) {
            Entry::Occupied(_) => Err(DomainError::DuplicateKey {
                aggregate_type: A::TYPE,
                key: aggregate.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(aggregate.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, aggregate: &A, original_version: A::Version) -> DomainResult<()> {
        let Some(mut row) = self.rows.get_mut(aggregate.key()) else {
            return Err(DomainError::store(format!(
                "{} {} does not exist",
                A::TYPE,
                aggregate.key()
            )));
        };

        if row.version() != original_version {
            return Err(DomainError::VersionConflict {
                key: aggregate.key().to_string(),
                expected: original_version.to_string(),
                actual: row.version().to_string(),
            });
        }

        *row = aggregate.clone();
        Ok(())
    }

    async fn delete(&self, aggregate: &A) -> DomainResult<()> {
        self.rows.remove(aggregate.key());
        Ok(())
    }
}
