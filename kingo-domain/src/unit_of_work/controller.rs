use super::Flushable;
use crate::error::{DomainError, DomainResult};
use futures_util::future::join_all;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 工作单元控制器：一次操作内登记的可刷新单元队列（FIFO）
///
/// - `enlist` 在锁内入队，可被同一操作内的多个调用点并发调用，不做 I/O；
/// - 重复登记同一单元是允许的，刷新时按引用去重并重新检查 `requires_flush`；
/// - `flush` 反复“取空队列 → 过滤 → 并发刷新”，直到某一轮没有任何单元需要刷新，
///   以容纳刷新过程中新登记的单元（例如发布事件触发的处理器又修改了聚合）。
pub struct UnitOfWorkController {
    queue: Mutex<VecDeque<Arc<dyn Flushable>>>,
    closed: AtomicBool,
    max_passes: usize,
}

impl UnitOfWorkController {
    pub const DEFAULT_MAX_PASSES: usize = 32;

    /// `max_passes` 为单次 `flush` 的最大轮数，超出时返回 `FlushNotConverged`
    pub fn new(max_passes: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            max_passes: max_passes.max(1),
        })
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Arc<dyn Flushable>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enlist(&self, unit: Arc<dyn Flushable>) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::disposed("UnitOfWorkController"));
        }
        trace!(unit = unit.name(), "unit enlisted");
        self.lock_queue().push_back(unit);
        Ok(())
    }

    /// 当前排队（尚未被刷新轮次检查）的登记数，含重复登记
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 关闭控制器并丢弃所有登记；之后的 `enlist` 返回 `ObjectDisposed`
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let dropped = std::mem::take(&mut *self.lock_queue());
        if !dropped.is_empty() {
            debug!(units = dropped.len(), "controller closed with pending units");
        }
    }

    /// 刷新所有登记单元直到稳定，返回实际执行的轮数
    ///
    /// - 取消只在每一轮开始前检查；一轮一旦开始就会等全部单元刷新结束；
    ///   被取消时本轮取出的单元放回队首，保持登记状态；
    /// - 同一轮内单元之间并发刷新，不保证相互顺序；
    /// - 任一单元失败时，本轮其余单元仍会完成，然后返回第一个错误；失败单元不会被重新登记。
    pub async fn flush(&self, cancellation: &CancellationToken) -> DomainResult<usize> {
        let mut passes = 0;

        loop {
            let units = self.drain_requiring_flush();
            if units.is_empty() {
                debug!(passes, "controller settled");
                return Ok(passes);
            }

            if cancellation.is_cancelled() {
                self.requeue_front(units);
                return Err(DomainError::Cancelled { pass: passes + 1 });
            }

            if passes >= self.max_passes {
                self.requeue_front(units);
                return Err(DomainError::FlushNotConverged { passes });
            }

            passes += 1;
            debug!(pass = passes, units = units.len(), "flushing enlisted units");

            let results = join_all(units.iter().map(|unit| unit.flush())).await;
            if let Some(err) = results.into_iter().find_map(Result::err) {
                debug!(pass = passes, error = %err, "flush pass failed");
                return Err(err);
            }
        }
    }

    // 锁内只做出队；requires_flush 可能获取单元自身的锁，放在锁外检查
    fn drain_requiring_flush(&self) -> Vec<Arc<dyn Flushable>> {
        let drained: Vec<Arc<dyn Flushable>> = self.lock_queue().drain(..).collect();
        let mut seen: HashSet<*const ()> = HashSet::with_capacity(drained.len());

        drained
            .into_iter()
            .filter(|unit| seen.insert(Arc::as_ptr(unit).cast::<()>()))
            .filter(|unit| unit.requires_flush())
            .collect()
    }

    fn requeue_front(&self, units: Vec<Arc<dyn Flushable>>) {
        let mut queue = self.lock_queue();
        for unit in units.into_iter().rev() {
            queue.push_front(unit);
        }
    }
}

impl Default for UnitOfWorkController {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            max_passes: Self::DEFAULT_MAX_PASSES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    /// 计数单元：`dirty` 次数表示待刷新；可选地在刷新时向控制器登记下一个单元
    struct CountingUnit {
        name: String,
        dirty: AtomicBool,
        flushed: AtomicUsize,
        fail: bool,
        cascade: Mutex<Option<(Weak<UnitOfWorkController>, Arc<CountingUnit>)>>,
    }

    impl CountingUnit {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                dirty: AtomicBool::new(true),
                flushed: AtomicUsize::new(0),
                fail: false,
                cascade: Mutex::new(None),
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                dirty: AtomicBool::new(true),
                flushed: AtomicUsize::new(0),
                fail: true,
                cascade: Mutex::new(None),
            })
        }

        fn clean(name: &str) -> Arc<Self> {
            let unit = Self::new(name);
            unit.dirty.store(false, Ordering::SeqCst);
            unit
        }

        fn then_enlist(&self, controller: &Arc<UnitOfWorkController>, next: Arc<CountingUnit>) {
            *self.cascade.lock().unwrap() = Some((Arc::downgrade(controller), next));
        }

        fn flushed(&self) -> usize {
            self.flushed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Flushable for CountingUnit {
        fn name(&self) -> &str {
            &self.name
        }

        fn requires_flush(&self) -> bool {
            self.dirty.load(Ordering::SeqCst)
        }

        async fn flush(&self) -> DomainResult<()> {
            self.dirty.store(false, Ordering::SeqCst);
            self.flushed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DomainError::store(format!("{} failed", self.name)));
            }
            let cascade = self.cascade.lock().unwrap().take();
            if let Some((controller, next)) = cascade {
                controller.upgrade().unwrap().enlist(next)?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn flush_with_nothing_enlisted_runs_zero_passes() {
        let controller = UnitOfWorkController::new(8);
        let passes = controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(passes, 0);
    }

    // 重复登记同一单元只刷新一次；干净单元被丢弃
    #[tokio::test]
    async fn duplicate_enlistment_flushes_once_and_clean_units_are_dropped() {
        let controller = UnitOfWorkController::new(8);
        let dirty = CountingUnit::new("dirty");
        let clean = CountingUnit::clean("clean");

        controller.enlist(dirty.clone()).unwrap();
        controller.enlist(dirty.clone()).unwrap();
        controller.enlist(clean.clone()).unwrap();
        assert_eq!(controller.pending(), 3);

        let passes = controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(passes, 1);
        assert_eq!(dirty.flushed(), 1);
        assert_eq!(clean.flushed(), 0);
        assert_eq!(controller.pending(), 0);

        // 再次刷新不会重复写出
        let passes = controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(passes, 0);
        assert_eq!(dirty.flushed(), 1);
    }

    // 级联登记（深度 3）在同一次 flush 内收敛
    #[tokio::test]
    async fn cascading_enlistments_converge() {
        let controller = UnitOfWorkController::new(8);
        let a = CountingUnit::new("a");
        let b = CountingUnit::new("b");
        let c = CountingUnit::new("c");
        a.then_enlist(&controller, b.clone());
        b.then_enlist(&controller, c.clone());

        controller.enlist(a.clone()).unwrap();
        let passes = controller.flush(&CancellationToken::new()).await.unwrap();

        assert_eq!(passes, 3);
        assert_eq!((a.flushed(), b.flushed(), c.flushed()), (1, 1, 1));
    }

    #[tokio::test]
    async fn unbounded_cascade_is_reported() {
        let controller = UnitOfWorkController::new(2);
        let a = CountingUnit::new("a");
        let b = CountingUnit::new("b");
        let c = CountingUnit::new("c");
        a.then_enlist(&controller, b.clone());
        b.then_enlist(&controller, c.clone());

        controller.enlist(a).unwrap();
        let err = controller
            .flush(&CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            DomainError::FlushNotConverged { passes } => assert_eq!(passes, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.flushed(), 0);
        assert_eq!(controller.pending(), 1);
    }

    // 单元失败：本轮其他单元仍完成，失败单元不会被重新登记
    #[tokio::test]
    async fn failure_completes_pass_and_is_not_requeued() {
        let controller = UnitOfWorkController::new(8);
        let ok = CountingUnit::new("ok");
        let bad = CountingUnit::failing("bad");
        controller.enlist(bad.clone()).unwrap();
        controller.enlist(ok.clone()).unwrap();

        let err = controller
            .flush(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Store { .. }));
        assert_eq!(ok.flushed(), 1);
        assert_eq!(bad.flushed(), 1);
        assert_eq!(controller.pending(), 0);
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_a_pass() {
        let controller = UnitOfWorkController::new(8);
        let unit = CountingUnit::new("u");
        controller.enlist(unit.clone()).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = controller.flush(&token).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled { pass: 1 }));
        assert_eq!(unit.flushed(), 0);
        // 单元仍处于登记状态
        assert_eq!(controller.pending(), 1);

        controller.flush(&CancellationToken::new()).await.unwrap();
        assert_eq!(unit.flushed(), 1);
    }

    #[tokio::test]
    async fn enlist_after_close_is_object_disposed() {
        let controller = UnitOfWorkController::new(8);
        controller.enlist(CountingUnit::new("u")).unwrap();
        controller.close();
        assert_eq!(controller.pending(), 0);

        let err = controller.enlist(CountingUnit::new("late")).unwrap_err();
        assert!(matches!(err, DomainError::ObjectDisposed { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enlistment_is_safe() {
        let controller = UnitOfWorkController::new(8);
        let units: Vec<Arc<CountingUnit>> =
            (0..64).map(|i| CountingUnit::new(&format!("u{i}"))).collect();

        let mut set = tokio::task::JoinSet::new();
        for unit in units.iter().cloned() {
            let controller = controller.clone();
            set.spawn(async move { controller.enlist(unit).unwrap() });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap();
        }

        controller.flush(&CancellationToken::new()).await.unwrap();
        assert!(units.iter().all(|u| u.flushed() == 1));
    }
}
