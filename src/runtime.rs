//! Schedulers for the work a form fires and forgets: field validations and
//! submit cycles.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use futures::FutureExt;
use futures::executor::{ThreadPool, block_on};
use futures::future::{BoxFuture, join_all};
use tracing::warn;

pub type BoxedTask = BoxFuture<'static, ()>;

pub trait TaskSpawner: Send + Sync + 'static {
    fn spawn(&self, task: BoxedTask);
}

/// Runs a task on the calling thread as far as it can get without waiting.
///
/// Synchronous validators therefore settle before `change`/`submit` return.
/// Tasks still pending after the first poll finish on a pool shared by every
/// form in the process.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineSpawner;

impl TaskSpawner for InlineSpawner {
    fn spawn(&self, mut task: BoxedTask) {
        if (&mut task).now_or_never().is_some() {
            return;
        }
        match background_pool() {
            Some(pool) => pool.spawn_ok(task),
            None => {
                warn!("background pool unavailable; finishing task on the caller");
                block_on(task);
            }
        }
    }
}

fn background_pool() -> Option<&'static ThreadPool> {
    static POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();
    POOL.get_or_init(|| match ThreadPool::builder().name_prefix("calmform-").create() {
        Ok(pool) => Some(pool),
        Err(error) => {
            warn!(%error, "could not start background pool");
            None
        }
    })
    .as_ref()
}

impl TaskSpawner for ThreadPool {
    fn spawn(&self, task: BoxedTask) {
        self.spawn_ok(task);
    }
}

/// Collects tasks until [`TaskQueue::run_until_stalled`] drives them.
///
/// Suits hosts with their own event loop, and tests that need to observe the
/// state between an edit and its validation.
#[derive(Clone, Default)]
pub struct TaskQueue {
    pending: Arc<Mutex<Vec<BoxedTask>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drives every queued task concurrently, including tasks queued while
    /// running, until the queue is empty. Must not be called from inside
    /// another executor.
    pub fn run_until_stalled(&self) {
        loop {
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                break;
            }
            block_on(join_all(batch));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BoxedTask>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TaskSpawner for TaskQueue {
    fn spawn(&self, task: BoxedTask) {
        self.lock().push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn queue_defers_until_driven() {
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            queue.spawn(Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        queue.run_until_stalled();
        assert!(queue.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn queue_runs_tasks_spawned_by_tasks() {
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let inner_queue = queue.clone();
            let counter = counter.clone();
            queue.spawn(Box::pin(async move {
                let counter = counter.clone();
                inner_queue.spawn(Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }));
        }

        queue.run_until_stalled();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inline_spawner_finishes_ready_tasks_before_returning() {
        let counter = Arc::new(AtomicUsize::new(0));
        let task_counter = counter.clone();
        InlineSpawner.spawn(Box::pin(async move {
            task_counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inline_spawner_hands_pending_tasks_to_the_pool() {
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();
        InlineSpawner.spawn(Box::pin(async move {
            let _ = release_rx.await;
            let _ = done_tx.send(7);
        }));

        release_tx.send(()).expect("release task");
        assert_eq!(block_on(done_rx), Ok(7));
    }

    #[test]
    fn thread_pool_runs_spawned_tasks() {
        let pool = ThreadPool::new().expect("thread pool");
        let spawner: Arc<dyn TaskSpawner> = Arc::new(pool);
        let (done_tx, done_rx) = oneshot::channel();
        spawner.spawn(Box::pin(async move {
            let _ = done_tx.send("done");
        }));

        assert_eq!(block_on(done_rx), Ok("done"));
    }
}
