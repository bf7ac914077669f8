//! 操作级缓存（ScopeCache）
//!
//! 以类型（可附加一个实例标识）为键保存一次操作内共享的对象，例如每个存储对应的工作单元；
//! 生命周期由操作上下文管理：上下文结束时 `dispose`，之后的访问返回 `ObjectDisposed`。
//!
use crate::error::{AppError, AppResult};
use dashmap::DashMap;
use kingo_domain::error::DomainError;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

type Entry = Arc<dyn Any + Send + Sync>;

/// 类型 + 实例标识；不区分实例的条目使用 0
type CacheKey = (TypeId, usize);

#[derive(Default)]
pub struct ScopeCache {
    entries: DashMap<CacheKey, Entry>,
    disposed: AtomicBool,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_alive(&self) -> AppResult<()> {
        if self.is_disposed() {
            return Err(DomainError::disposed("ScopeCache").into());
        }
        Ok(())
    }

    fn downcast<T: Any + Send + Sync>(entry: Entry) -> AppResult<Arc<T>> {
        entry.downcast::<T>().map_err(|_| AppError::TypeMismatch {
            expected: type_name::<T>(),
            found: "unknown",
        })
    }

    /// 取出类型 `T` 的条目，不存在时用 `init` 创建
    ///
    /// `init` 在条目锁内执行，不能再访问本缓存。
    pub fn get_or_insert_with<T, F>(&self, init: F) -> AppResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Arc<T>,
    {
        self.get_or_insert_for(0, init)
    }

    /// 同 `get_or_insert_with`，但同一类型按 `instance` 区分出多个条目
    pub fn get_or_insert_for<T, F>(&self, instance: usize, init: F) -> AppResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Arc<T>,
    {
        self.ensure_alive()?;
        let entry = self
            .entries
            .entry((TypeId::of::<T>(), instance))
            .or_insert_with(|| init() as Entry)
            .clone();
        Self::downcast(entry)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> AppResult<Option<Arc<T>>> {
        self.get_for(0)
    }

    pub fn get_for<T: Any + Send + Sync>(&self, instance: usize) -> AppResult<Option<Arc<T>>> {
        self.ensure_alive()?;
        let key = (TypeId::of::<T>(), instance);
        let Some(entry) = self.entries.get(&key).map(|e| e.clone()) else {
            return Ok(None);
        };
        Self::downcast(entry).map(Some)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// 清空缓存；重复调用无副作用
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!(entries = self.entries.len(), "scope cache disposed");
            self.entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Settings {
        name: &'static str,
    }

    #[test]
    fn init_runs_once_per_type() {
        let cache = ScopeCache::new();
        let calls = AtomicUsize::new(0);

        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Arc::new(Settings { name: "a" })
        };
        let first = cache.get_or_insert_with(make).unwrap();
        let second = cache
            .get_or_insert_with(|| Arc::new(Settings { name: "b" }))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get::<String>().unwrap().is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn instances_of_one_type_are_kept_apart() {
        let cache = ScopeCache::new();
        let a = cache
            .get_or_insert_for(1, || Arc::new(Settings { name: "a" }))
            .unwrap();
        let b = cache
            .get_or_insert_for(2, || Arc::new(Settings { name: "b" }))
            .unwrap();
        let again = cache
            .get_or_insert_for(1, || Arc::new(Settings { name: "c" }))
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(cache.get_for::<Settings>(2).unwrap().unwrap().name, "b");
        assert!(cache.get::<Settings>().unwrap().is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn access_after_dispose_is_object_disposed() {
        let cache = ScopeCache::new();
        cache
            .get_or_insert_with(|| Arc::new(Settings { name: "a" }))
            .unwrap();
        cache.dispose();
        cache.dispose();

        assert!(cache.is_empty());
        let err = cache.get::<Settings>().unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::ObjectDisposed { .. })
        ));
    }
}
