//! Cancellable scheduled tasks
//!
//! Deferred and periodic work (health monitoring, mesh rebalancing) runs on
//! the tokio runtime behind a [`ScheduledTask`] handle. Dropping a handle
//! detaches the task; only [`ScheduledTask::cancel`] stops it.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CanopyError, Result};

/// Handle to a task running on the tokio runtime
#[derive(Debug)]
pub struct ScheduledTask {
    id: Uuid,
    label: String,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `work` once after `delay`
    pub fn after<F>(label: impl Into<String>, delay: Duration, work: F) -> Result<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = current_runtime()?;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        Ok(Self::from_handle(label.into(), handle))
    }

    /// Run `tick` every `period`, first run one period from now
    pub fn every<F, Fut>(label: impl Into<String>, period: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(CanopyError::Config("task period must be non-zero".to_string()));
        }
        let runtime = current_runtime()?;
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        Ok(Self::from_handle(label.into(), handle))
    }

    fn from_handle(label: String, handle: JoinHandle<()>) -> Self {
        let id = Uuid::now_v7();
        debug!(task_id = %id, label = %label, "Scheduled task");
        Self { id, label, handle }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop the task. A task that already ran is unaffected.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!(task_id = %self.id, label = %self.label, "Cancelling task");
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Whether the calling thread can schedule tasks
    pub fn runtime_available() -> bool {
        Handle::try_current().is_ok()
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|e| CanopyError::Internal(format!("no tokio runtime for scheduled task: {}", e)))
}

/// Pending tasks keyed by the entity they belong to
#[derive(Debug)]
pub struct TaskRegistry<K: Eq + Hash> {
    tasks: DashMap<K, ScheduledTask>,
}

impl<K> TaskRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Track a task, cancelling any task already registered for `key`
    pub fn insert(&self, key: K, task: ScheduledTask) {
        if let Some(previous) = self.tasks.insert(key, task) {
            previous.cancel();
        }
    }

    /// Cancel and forget the task for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some((_, task)) => {
                let pending = !task.is_finished();
                task.cancel();
                pending
            }
            None => false,
        }
    }

    /// Run `work` once after `delay`, tracked under `key` until it fires
    ///
    /// The entry is held while the task is spawned, so the task's own release
    /// always lands after registration.
    pub fn schedule_after<F>(
        self: &Arc<Self>,
        key: K,
        label: impl Into<String>,
        delay: Duration,
        work: F,
    ) -> Result<()>
    where
        K: Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let registry = Arc::downgrade(self);
        let fired = key.clone();
        let entry = self.tasks.entry(key);
        let task = ScheduledTask::after(label, delay, async move {
            if let Some(registry) = registry.upgrade() {
                registry.release(&fired);
            }
            work.await;
        })?;

        match entry {
            Entry::Occupied(mut occupied) => occupied.insert(task).cancel(),
            Entry::Vacant(vacant) => {
                vacant.insert(task);
            }
        }
        Ok(())
    }

    /// Forget the task for `key` without cancelling it (used by the task itself when it fires)
    pub fn release(&self, key: &K) -> Option<ScheduledTask> {
        self.tasks.remove(key).map(|(_, task)| task)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every pending task
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<K> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        keys.iter().filter(|key| self.cancel(key)).count()
    }
}

impl<K> Default for TaskRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_after_fires_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::after("once", Duration::from_secs(60), async move {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_firing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::after("cancelled", Duration::from_secs(60), async move {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        task.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_periodically() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::every("tick", Duration::from_secs(30), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        task.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_requires_runtime() {
        assert!(!ScheduledTask::runtime_available());
        let result = ScheduledTask::after("no-runtime", Duration::from_secs(1), async {});
        assert!(result.is_err());

        let registry: Arc<TaskRegistry<u32>> = Arc::new(TaskRegistry::new());
        assert!(registry
            .schedule_after(1, "no-runtime", Duration::ZERO, async {})
            .is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_after_releases_immediate_task() {
        let registry: Arc<TaskRegistry<u32>> = Arc::new(TaskRegistry::new());
        let (tx, rx) = tokio::sync::oneshot::channel();

        registry
            .schedule_after(3, "immediate", Duration::ZERO, async move {
                let _ = tx.send(());
            })
            .unwrap();
        rx.await.unwrap();

        assert!(!registry.contains(&3));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_after_replaces_pending_task() {
        let registry: Arc<TaskRegistry<u32>> = Arc::new(TaskRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let c = counter.clone();
            registry
                .schedule_after(5, "pending", Duration::from_secs(10), async move {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_cancel() {
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        let task = ScheduledTask::after("pending", Duration::from_secs(10), async {}).unwrap();
        registry.insert(7, task);

        assert!(registry.contains(&7));
        assert!(registry.cancel(&7));
        assert!(!registry.contains(&7));
        assert!(!registry.cancel(&7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_cancel_all() {
        let registry: TaskRegistry<u32> = TaskRegistry::new();
        for key in 0..3 {
            let task = ScheduledTask::after("pending", Duration::from_secs(10), async {}).unwrap();
            registry.insert(key, task);
        }
        assert_eq!(registry.cancel_all(), 3);
        assert!(registry.is_empty());
    }
}
