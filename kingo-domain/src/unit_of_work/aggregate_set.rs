use crate::aggregate::{Aggregate, AggregateRef, TrackedAggregate};
use crate::error::{DomainError, DomainResult};
use std::collections::HashMap;

/// 键 → 被跟踪聚合（含原始版本）的集合，键唯一
pub struct AggregateSet<A: Aggregate> {
    entries: HashMap<A::Key, TrackedAggregate<A>>,
}

impl<A: Aggregate> Default for AggregateSet<A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<A: Aggregate> AggregateSet<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &A::Key) -> bool {
        self.entries.contains_key(key)
    }

    pub fn try_get(&self, key: &A::Key) -> Option<&TrackedAggregate<A>> {
        self.entries.get(key)
    }

    pub(crate) fn try_get_mut(&mut self, key: &A::Key) -> Option<&mut TrackedAggregate<A>> {
        self.entries.get_mut(key)
    }

    /// 键对应的条目是否正是 `aggregate` 这个实例
    pub fn holds(&self, key: &A::Key, aggregate: &AggregateRef<A>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|tracked| tracked.aggregate().same_instance(aggregate))
    }

    /// 以聚合当前版本为原始版本加入集合
    pub fn add(&mut self, aggregate: AggregateRef<A>) -> DomainResult<()> {
        self.add_tracked(TrackedAggregate::new(aggregate))
    }

    pub(crate) fn add_tracked(&mut self, tracked: TrackedAggregate<A>) -> DomainResult<()> {
        let key = tracked.aggregate().key();
        if self.entries.contains_key(&key) {
            return Err(DomainError::DuplicateKey {
                aggregate_type: A::TYPE,
                key: key.to_string(),
            });
        }
        self.entries.insert(key, tracked);
        Ok(())
    }

    /// 不存在时为空操作
    pub fn remove(&mut self, key: &A::Key) -> Option<TrackedAggregate<A>> {
        self.entries.remove(key)
    }

    /// 将条目（连同其原始版本）移动到 `target`
    ///
    /// 源集合中不存在该键属于调用方的编程错误，返回 `InvalidState`。
    pub fn move_to(&mut self, key: &A::Key, target: &mut AggregateSet<A>) -> DomainResult<()> {
        if target.contains(key) {
            return Err(DomainError::DuplicateKey {
                aggregate_type: A::TYPE,
                key: key.to_string(),
            });
        }
        let tracked = self.entries.remove(key).ok_or_else(|| DomainError::InvalidState {
            reason: format!("{} {key} is not part of the source set", A::TYPE),
        })?;
        target.add_tracked(tracked)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAggregate<A>> {
        self.entries.values()
    }

    /// 是否有任一聚合的版本已偏离原始版本
    pub fn any_updated(&self) -> bool {
        self.entries.values().any(TrackedAggregate::has_been_updated)
    }

    /// 取出全部条目并清空集合
    pub fn drain(&mut self) -> Vec<TrackedAggregate<A>> {
        self.entries.drain().map(|(_, tracked)| tracked).collect()
    }
}
