use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

// ============================================================================
// Bounded Background Tasks
// ============================================================================
//
// Detached work that must outlive the request that started it, kept visible:
// handles are tracked, finished ones are reaped on every spawn, and the set
// refuses new work once `capacity` tasks are still running.
//
// ============================================================================

pub struct BackgroundTasks {
    name: &'static str,
    tasks: Mutex<JoinSet<()>>,
    capacity: usize,
}

impl BackgroundTasks {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            tasks: Mutex::new(JoinSet::new()),
            capacity,
        }
    }

    /// Spawns `task` unless the set is full. Returns whether it was started.
    pub async fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        Self::reap(self.name, &mut tasks);

        if tasks.len() >= self.capacity {
            tracing::warn!(
                tasks = self.name,
                capacity = self.capacity,
                "Background task limit reached, dropping task"
            );
            return false;
        }

        tasks.spawn(task);
        true
    }

    pub async fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        Self::reap(self.name, &mut tasks);
        tasks.len()
    }

    /// Waits for every tracked task to finish
    pub async fn wait_idle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(tasks = self.name, error = %e, "Background task ended abnormally");
            }
        }
    }

    fn reap(name: &str, tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                tracing::warn!(tasks = name, error = %e, "Background task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn test_tasks_run_to_completion() {
        let tasks = BackgroundTasks::new("test", 8);
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            assert!(tasks.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }).await);
        }

        tasks.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(tasks.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced_until_tasks_finish() {
        let tasks = BackgroundTasks::new("test", 2);
        let release = Arc::new(Semaphore::new(0));

        for _ in 0..2 {
            let release = release.clone();
            assert!(tasks.spawn(async move {
                let _permit = release.acquire().await;
            }).await);
        }
        assert!(!tasks.spawn(async {}).await);
        assert_eq!(tasks.in_flight().await, 2);

        release.add_permits(2);
        tasks.wait_idle().await;
        assert!(tasks.spawn(async {}).await);
    }
}
