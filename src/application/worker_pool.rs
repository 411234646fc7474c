//! WorkerPool - Bounded executor for work that must leave the caller's path.
//!
//! Two pools exist in the service: one for post-commit event delivery and
//! one for calls to other services. Both follow the same admission order:
//!
//! 1. Fewer than `min_workers` running: start a worker with the task
//! 2. Otherwise: put the task on the bounded queue
//! 3. Queue full and fewer than `max_workers` running: start an extra worker
//! 4. Otherwise: apply the `OverflowPolicy`
//!
//! With `OverflowPolicy::CallerRuns` (the default) a saturated pool never
//! drops work. The submitter runs the task itself, which slows it down and
//! pushes back on whoever is producing tasks.
//!
//! Extra workers above `min_workers` exit after sitting idle for
//! `keep_alive`. `shutdown` stops intake and waits for every queued task.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

type Task = BoxFuture<'static, ()>;

/// What to do with a task when every worker is busy and the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Run the task on the submitting task.
    #[default]
    CallerRuns,
    /// Refuse the task with `PoolError::Saturated`.
    Reject,
}

/// Sizing for a `WorkerPool`.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// Idle time after which a worker above `min_workers` exits.
    pub keep_alive: Duration,
    pub overflow: OverflowPolicy,
}

impl WorkerPoolConfig {
    pub fn new(min_workers: usize, max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            queue_capacity,
            keep_alive: Duration::from_secs(60),
            overflow: OverflowPolicy::CallerRuns,
        }
    }

    /// Sizing used for post-commit event delivery.
    pub fn event_delivery() -> Self {
        Self::new(2, 5, 100)
    }

    /// Sizing used for calls to other services.
    pub fn outbound_calls() -> Self {
        Self::new(1, 3, 50)
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::event_delivery()
    }
}

/// How a submitted task was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new worker was started with the task.
    Started,
    /// The task is waiting on the queue.
    Queued,
    /// The pool was saturated and the task already ran on the caller.
    RanOnCaller,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Worker pool '{0}' is saturated")]
    Saturated(String),

    #[error("Worker pool '{0}' is shut down")]
    ShutDown(String),

    #[error("Task on worker pool '{0}' ended without a result")]
    TaskAborted(String),
}

/// Point-in-time counters for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: usize,
    pub completed: usize,
    pub ran_on_caller: usize,
    pub panicked: usize,
}

/// Cloneable handle to a bounded pool of tokio worker tasks.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    name: String,
    config: WorkerPoolConfig,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: AsyncMutex<mpsc::Receiver<Task>>,
    workers: AtomicUsize,
    next_worker_id: AtomicUsize,
    completed: AtomicUsize,
    ran_on_caller: AtomicUsize,
    panicked: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerPool {
    /// Creates a pool. No workers run until the first submission.
    ///
    /// `name` doubles as the worker name prefix (`comment-event` gives
    /// workers `comment-event-1`, `comment-event-2`, ...).
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> Self {
        let mut config = config;
        config.min_workers = config.min_workers.max(1);
        config.max_workers = config.max_workers.max(config.min_workers);
        config.queue_capacity = config.queue_capacity.max(1);

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                config,
                sender: Mutex::new(Some(sender)),
                receiver: AsyncMutex::new(receiver),
                workers: AtomicUsize::new(0),
                next_worker_id: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                ran_on_caller: AtomicUsize::new(0),
                panicked: AtomicUsize::new(0),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.inner.config
    }

    /// Hands a task to the pool.
    ///
    /// Returns once the task is admitted. Under `CallerRuns` overflow that
    /// means after the task has finished on the caller.
    pub async fn submit<F>(&self, task: F) -> Result<Submission, PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = &self.inner;
        let task: Task = Box::pin(task);

        let sender = lock(&inner.sender).clone();
        let Some(sender) = sender else {
            return self.overflow(task, true).await;
        };

        if inner.try_reserve_worker(inner.config.min_workers) {
            inner.spawn_worker(task);
            return Ok(Submission::Started);
        }

        let task = match sender.try_send(task) {
            Ok(()) => return Ok(Submission::Queued),
            Err(TrySendError::Full(task)) => task,
            Err(TrySendError::Closed(task)) => return self.overflow(task, true).await,
        };

        if inner.try_reserve_worker(inner.config.max_workers) {
            inner.spawn_worker(task);
            return Ok(Submission::Started);
        }

        self.overflow(task, false).await
    }

    /// Runs a computation on the pool and waits for its result.
    pub async fn call<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            let _ = tx.send(task.await);
        })
        .await?;

        rx.await
            .map_err(|_| PoolError::TaskAborted(self.inner.name.clone()))
    }

    async fn overflow(&self, task: Task, shut_down: bool) -> Result<Submission, PoolError> {
        let inner = &self.inner;
        match inner.config.overflow {
            OverflowPolicy::CallerRuns => {
                if shut_down {
                    warn!(pool = %inner.name, "Pool is shut down, running task on caller");
                } else {
                    debug!(pool = %inner.name, "Pool saturated, running task on caller");
                }
                inner.ran_on_caller.fetch_add(1, Ordering::SeqCst);
                inner.run_task(task).await;
                Ok(Submission::RanOnCaller)
            }
            OverflowPolicy::Reject if shut_down => {
                warn!(pool = %inner.name, "Pool is shut down, task rejected");
                Err(PoolError::ShutDown(inner.name.clone()))
            }
            OverflowPolicy::Reject => {
                warn!(pool = %inner.name, "Pool saturated, task rejected");
                Err(PoolError::Saturated(inner.name.clone()))
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let queued = lock(&inner.sender)
            .as_ref()
            .map(|s| inner.config.queue_capacity.saturating_sub(s.capacity()))
            .unwrap_or(0);
        PoolStats {
            workers: inner.workers.load(Ordering::SeqCst),
            queued,
            completed: inner.completed.load(Ordering::SeqCst),
            ran_on_caller: inner.ran_on_caller.load(Ordering::SeqCst),
            panicked: inner.panicked.load(Ordering::SeqCst),
        }
    }

    /// Stops accepting work and waits until every queued task has run.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if lock(&inner.sender).take().is_some() {
            debug!(pool = %inner.name, "Worker pool shutting down");
        }

        loop {
            let handles: Vec<_> = std::mem::take(&mut *lock(&inner.handles));
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    error!(pool = %inner.name, error = %err, "Worker ended abnormally");
                }
            }
        }
    }
}

impl PoolInner {
    fn try_reserve_worker(&self, limit: usize) -> bool {
        let mut current = self.workers.load(Ordering::SeqCst);
        loop {
            if current >= limit {
                return false;
            }
            match self.workers.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn try_retire_worker(&self) -> bool {
        let mut current = self.workers.load(Ordering::SeqCst);
        loop {
            if current <= self.config.min_workers {
                return false;
            }
            match self.workers.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>, first: Task) {
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = format!("{}-{}", self.name, id);
        let span = tracing::debug_span!("worker", name = %worker);

        let inner = Arc::clone(self);
        let handle = tokio::spawn(inner.worker_loop(first).instrument(span));

        let mut handles = lock(&self.handles);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    async fn worker_loop(self: Arc<Self>, first: Task) {
        debug!("Worker started");
        self.run_task(first).await;

        loop {
            let next = if self.workers.load(Ordering::SeqCst) > self.config.min_workers {
                let wait = async { self.receiver.lock().await.recv().await };
                match tokio::time::timeout(self.config.keep_alive, wait).await {
                    Ok(next) => next,
                    Err(_) => {
                        if self.try_retire_worker() {
                            debug!("Idle worker retired");
                            return;
                        }
                        continue;
                    }
                }
            } else {
                self.receiver.lock().await.recv().await
            };

            match next {
                Some(task) => self.run_task(task).await,
                None => break,
            }
        }

        self.workers.fetch_sub(1, Ordering::SeqCst);
        debug!("Worker stopped");
    }

    async fn run_task(&self, task: Task) {
        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
            self.panicked.fetch_add(1, Ordering::SeqCst);
            error!(pool = %self.name, "Task panicked");
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Semaphore;

    fn counting_task(counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gated_task(gate: &Arc<Semaphore>, counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let gate = Arc::clone(gate);
        let counter = Arc::clone(counter);
        async move {
            let _permit = gate.acquire().await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn shutdown_drains_every_queued_task() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(2, 5, 100));
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..20 {
            pool.submit(counting_task(&counter)).await.unwrap();
        }
        pool.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(pool.stats().workers, 0);
    }

    #[tokio::test]
    async fn saturated_pool_runs_task_on_caller() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(1, 1, 1));
        let gate = Arc::new(Semaphore::new(0));
        let counter = Arc::new(AtomicU32::new(0));

        assert_eq!(pool.submit(gated_task(&gate, &counter)).await, Ok(Submission::Started));
        assert_eq!(pool.submit(gated_task(&gate, &counter)).await, Ok(Submission::Queued));
        assert_eq!(pool.submit(counting_task(&counter)).await, Ok(Submission::RanOnCaller));

        // Only the caller-run task has finished so far.
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        gate.add_permits(10);
        pool.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.stats().ran_on_caller, 1);
    }

    #[tokio::test]
    async fn extra_workers_start_only_when_queue_is_full() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(1, 3, 1));
        let gate = Arc::new(Semaphore::new(0));
        let counter = Arc::new(AtomicU32::new(0));

        let mut admissions = Vec::new();
        for _ in 0..4 {
            admissions.push(pool.submit(gated_task(&gate, &counter)).await.unwrap());
        }
        admissions.push(pool.submit(counting_task(&counter)).await.unwrap());

        assert_eq!(
            admissions,
            vec![
                Submission::Started,
                Submission::Queued,
                Submission::Started,
                Submission::Started,
                Submission::RanOnCaller,
            ]
        );
        assert_eq!(pool.stats().workers, 3);

        gate.add_permits(10);
        pool.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn reject_policy_refuses_when_saturated() {
        let config = WorkerPoolConfig::new(1, 1, 1).with_overflow(OverflowPolicy::Reject);
        let pool = WorkerPool::new("test", config);
        let gate = Arc::new(Semaphore::new(0));
        let counter = Arc::new(AtomicU32::new(0));

        pool.submit(gated_task(&gate, &counter)).await.unwrap();
        pool.submit(gated_task(&gate, &counter)).await.unwrap();
        let result = pool.submit(counting_task(&counter)).await;

        assert_eq!(result, Err(PoolError::Saturated("test".to_string())));

        gate.add_permits(10);
        pool.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(1, 1, 10));
        let counter = Arc::new(AtomicU32::new(0));

        pool.submit(async { panic!("boom") }).await.unwrap();
        pool.submit(counting_task(&counter)).await.unwrap();
        pool.shutdown().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().panicked, 1);
    }

    #[tokio::test]
    async fn call_returns_task_output() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::outbound_calls());

        let value = pool.call(async { 40 + 2 }).await;

        assert_eq!(value, Ok(42));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_runs_on_caller() {
        let pool = WorkerPool::new("test", WorkerPoolConfig::new(1, 1, 1));
        let counter = Arc::new(AtomicU32::new(0));
        pool.shutdown().await;

        let admission = pool.submit(counting_task(&counter)).await;

        assert_eq!(admission, Ok(Submission::RanOnCaller));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_extra_workers_retire_after_keep_alive() {
        let config = WorkerPoolConfig::new(1, 2, 1).with_keep_alive(Duration::from_millis(50));
        let pool = WorkerPool::new("test", config);
        let gate = Arc::new(Semaphore::new(0));
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            pool.submit(gated_task(&gate, &counter)).await.unwrap();
        }
        assert_eq!(pool.stats().workers, 2);

        gate.add_permits(10);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.stats().workers, 1);
        pool.shutdown().await;
    }

    #[test]
    fn default_sizing_matches_event_delivery() {
        let config = WorkerPoolConfig::default();
        assert_eq!((config.min_workers, config.max_workers, config.queue_capacity), (2, 5, 100));

        let outbound = WorkerPoolConfig::outbound_calls();
        assert_eq!((outbound.min_workers, outbound.max_workers, outbound.queue_capacity), (1, 3, 50));
    }
}
