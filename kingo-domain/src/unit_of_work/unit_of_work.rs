use super::{AggregateSet, Flushable, UnitOfWorkController};
use crate::aggregate::{Aggregate, AggregateRef, TrackedAggregate};
use crate::error::{DomainError, DomainResult};
use crate::persist::AggregateStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

struct Sets<A: Aggregate> {
    selected: AggregateSet<A>,
    inserted: AggregateSet<A>,
    deleted: AggregateSet<A>,
}

impl<A: Aggregate> Default for Sets<A> {
    fn default() -> Self {
        Self {
            selected: AggregateSet::new(),
            inserted: AggregateSet::new(),
            deleted: AggregateSet::new(),
        }
    }
}

// 以下 settle_* 在某个条目写入存储成功后调用，返回 `true` 表示留下了新的待写变更。
// 刷新期间条目一直留在原集合中，查找与加入/移除看到的始终是同一实例。
impl<A: Aggregate> Sets<A> {
    fn settle_deleted(&mut self, flushed: &TrackedAggregate<A>) -> DomainResult<bool> {
        let key = flushed.aggregate().key();
        if self.deleted.holds(&key, flushed.aggregate()) {
            self.deleted.remove(&key);
            return Ok(false);
        }
        // 删除已经落库，刷新期间又撤销了删除：改为重新插入
        if self.selected.holds(&key, flushed.aggregate()) {
            self.selected.move_to(&key, &mut self.inserted)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn settle_updated(&mut self, flushed: &TrackedAggregate<A>, written: A::Version) -> bool {
        let key = flushed.aggregate().key();
        for set in [&mut self.selected, &mut self.deleted] {
            if set.holds(&key, flushed.aggregate()) {
                let Some(tracked) = set.try_get_mut(&key) else {
                    continue;
                };
                tracked.rebase(written);
                return tracked.has_been_updated();
            }
        }
        false
    }

    fn settle_inserted(
        &mut self,
        flushed: &TrackedAggregate<A>,
        written: A::Version,
    ) -> DomainResult<bool> {
        let key = flushed.aggregate().key();
        if self.inserted.holds(&key, flushed.aggregate()) {
            let Some(mut tracked) = self.inserted.remove(&key) else {
                return Ok(false);
            };
            tracked.rebase(written);
            let changed = tracked.has_been_updated();
            self.selected.add_tracked(tracked)?;
            return Ok(changed);
        }
        if self.deleted.contains(&key) {
            return Ok(false);
        }
        // 插入已经落库，刷新期间又被移除：补一次删除
        self.deleted.add(flushed.aggregate().clone())?;
        Ok(true)
    }
}

/// 单一聚合类型的工作单元
///
/// - `selected`：从存储加载（或已插入）的聚合，刷新时只更新版本发生变化的条目，
///   刷新后仍保留，作为本工作单元的身份映射；
/// - `inserted`：新加入的聚合，刷新时插入；
/// - `deleted`：待删除的聚合，刷新时删除。
///
/// 刷新顺序固定为“删除 → 更新 → 插入”，因此同一会话内“删除键 X 再加入键 X”
/// 会先 Delete(X) 再 Insert(X)。
///
/// 一个工作单元只属于一条逻辑流程；内部锁只用于满足 `Sync`，
/// 并不保证多线程同时修改时的语义。
pub struct UnitOfWork<A, S>
where
    A: Aggregate + Clone,
    S: AggregateStore<A> + 'static,
{
    me: Weak<Self>,
    store: Arc<S>,
    controller: Arc<UnitOfWorkController>,
    sets: Mutex<Sets<A>>,
}

impl<A, S> UnitOfWork<A, S>
where
    A: Aggregate + Clone,
    S: AggregateStore<A> + 'static,
{
    pub fn new(store: Arc<S>, controller: Arc<UnitOfWorkController>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            store,
            controller,
            sets: Mutex::new(Sets::default()),
        })
    }

    fn lock_sets(&self) -> MutexGuard<'_, Sets<A>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enlist(&self) -> DomainResult<()> {
        let me = self
            .me
            .upgrade()
            .ok_or_else(|| DomainError::disposed("UnitOfWork"))?;
        self.controller.enlist(me)
    }

    /// 按键查找聚合
    ///
    /// 依次检查 selected、inserted（命中不访问存储）；已标记删除的键返回 `None`；
    /// 否则查询存储，命中后加入 selected 并登记到控制器。
    pub async fn try_find(&self, key: &A::Key) -> DomainResult<Option<AggregateRef<A>>> {
        {
            let sets = self.lock_sets();
            if let Some(hit) = sets
                .selected
                .try_get(key)
                .or_else(|| sets.inserted.try_get(key))
            {
                return Ok(Some(hit.aggregate().clone()));
            }
            if sets.deleted.contains(key) {
                return Ok(None);
            }
        }

        let Some(loaded) = self.store.try_select(key).await? else {
            return Ok(None);
        };

        let handle = {
            let mut sets = self.lock_sets();
            // 等待存储期间同键可能已被加载、加入或删除
            if let Some(hit) = sets
                .selected
                .try_get(key)
                .or_else(|| sets.inserted.try_get(key))
            {
                return Ok(Some(hit.aggregate().clone()));
            }
            if sets.deleted.contains(key) {
                return Ok(None);
            }
            let handle = AggregateRef::new(loaded);
            sets.selected.add(handle.clone())?;
            handle
        };

        self.enlist()?;
        Ok(Some(handle))
    }

    /// 加入聚合
    ///
    /// - 同一实例已在 selected/inserted 中：空操作；
    /// - 同键的其他实例已在 selected/inserted 中：`DuplicateKey`；
    /// - 同一实例已被标记删除：撤销删除，移回 selected；
    /// - 同键的其他实例已被标记删除：保留删除并作为新聚合插入（先删后插）；
    /// - 其他情况加入 inserted。
    pub fn add(&self, aggregate: AggregateRef<A>) -> DomainResult<()> {
        let key = aggregate.key();
        {
            let mut sets = self.lock_sets();
            let Sets {
                selected,
                inserted,
                deleted,
            } = &mut *sets;

            if let Some(existing) = selected.try_get(&key).or_else(|| inserted.try_get(&key)) {
                if existing.aggregate().same_instance(&aggregate) {
                    return Ok(());
                }
                return Err(DomainError::DuplicateKey {
                    aggregate_type: A::TYPE,
                    key: key.to_string(),
                });
            }

            if deleted.holds(&key, &aggregate) {
                deleted.move_to(&key, selected)?;
            } else {
                inserted.add(aggregate)?;
            }
        }

        self.enlist()
    }

    /// 移除聚合
    ///
    /// - 在 selected 中：移入 deleted；
    /// - 在 inserted 中：直接丢弃（从未写入存储，插入与删除相互抵消）；
    /// - 已在 deleted 中：空操作；
    /// - 其他情况（未加载过的键）：直接加入 deleted。
    pub fn remove(&self, aggregate: &AggregateRef<A>) -> DomainResult<()> {
        let key = aggregate.key();
        {
            let mut sets = self.lock_sets();
            let Sets {
                selected,
                inserted,
                deleted,
            } = &mut *sets;

            if selected.contains(&key) {
                selected.move_to(&key, deleted)?;
            } else if inserted.remove(&key).is_some() {
                return Ok(());
            } else if deleted.contains(&key) {
                return Ok(());
            } else {
                deleted.add(aggregate.clone())?;
            }
        }

        self.enlist()
    }

    /// 有待删除/插入的聚合，或任一已加载聚合的版本发生了变化
    pub fn requires_flush(&self) -> bool {
        let sets = self.lock_sets();
        !sets.deleted.is_empty() || !sets.inserted.is_empty() || sets.selected.any_updated()
    }

    /// 按“删除 → 更新 → 插入”的顺序写入存储
    ///
    /// 开始时在锁内复制出本轮要写的条目，但不把它们移出集合：写入期间的查找
    /// 仍命中同一实例。每个条目写入成功后才结算：删除项移出 deleted，更新项以写入的
    /// 版本作为新的原始版本，插入项转入 selected。刷新期间产生的新变更留给下一轮，
    /// 并重新登记到控制器。写入中途失败时已执行的存储调用不会回滚。
    pub async fn flush(&self) -> DomainResult<()> {
        let (deleted, updated, inserted) = {
            let sets = self.lock_sets();
            let updated: Vec<TrackedAggregate<A>> = sets
                .selected
                .iter()
                .filter(|tracked| tracked.has_been_updated())
                .cloned()
                .collect();
            let deleted: Vec<_> = sets.deleted.iter().cloned().collect();
            let inserted: Vec<_> = sets.inserted.iter().cloned().collect();
            (deleted, updated, inserted)
        };

        debug!(
            aggregate = A::TYPE,
            deleted = deleted.len(),
            updated = updated.len(),
            inserted = inserted.len(),
            "flushing unit of work"
        );

        let mut pending = false;
        for tracked in &deleted {
            self.store.delete(&tracked.aggregate().snapshot()).await?;
            pending |= self.lock_sets().settle_deleted(tracked)?;
        }
        for tracked in &updated {
            let value = tracked.aggregate().snapshot();
            self.store.update(&value, tracked.original_version()).await?;
            pending |= self.lock_sets().settle_updated(tracked, value.version());
        }
        for tracked in &inserted {
            let value = tracked.aggregate().snapshot();
            self.store.insert(&value).await?;
            pending |= self.lock_sets().settle_inserted(tracked, value.version())?;
        }

        if pending {
            debug!(aggregate = A::TYPE, "changes made during flush left for the next pass");
            self.enlist()?;
        }
        Ok(())
    }
}

#[async_trait]
impl<A, S> Flushable for UnitOfWork<A, S>
where
    A: Aggregate + Clone,
    S: AggregateStore<A> + 'static,
{
    fn name(&self) -> &str {
        A::TYPE
    }

    fn requires_flush(&self) -> bool {
        UnitOfWork::requires_flush(self)
    }

    async fn flush(&self) -> DomainResult<()> {
        UnitOfWork::flush(self).await
    }
}
