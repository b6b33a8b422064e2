//! Named background tasks for the sync engine.
//!
//! Every engine task (poller, realtime consumer, eligibility debounce, delayed
//! template refresh) is registered under a name. Spawning under a name that is
//! already tracked aborts the previous task, which is what gives the eligibility
//! debounce and the delayed refresh their "last call wins" behavior.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct Tracked {
    id: u64,
    handle: JoinHandle<()>,
}

pub struct TaskTracker {
    tasks: Arc<Mutex<HashMap<String, Tracked>>>,
    next_id: AtomicU64,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Spawn a tracked task that removes itself on completion. An existing task
    /// with the same name is aborted first.
    pub async fn spawn<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = self.tasks.clone();
        let name_clone = name.clone();

        // Lock is held across spawn + insert so a task that finishes immediately
        // cannot try to remove itself before it is registered.
        let mut guard = self.tasks.lock().await;
        if let Some(old) = guard.remove(&name) {
            debug!("replacing task '{}'", name);
            old.handle.abort();
        }
        let handle = tokio::spawn(async move {
            future.await;
            let mut tasks = tasks.lock().await;
            // only remove our own entry; a replacement may already sit under this name
            if tasks.get(&name_clone).is_some_and(|t| t.id == id) {
                tasks.remove(&name_clone);
            }
            debug!("task '{}' completed", name_clone);
        });
        guard.insert(name, Tracked { id, handle });
    }

    /// Abort the task registered under `name`. Returns `false` if none was tracked.
    #[cfg(test)]
    pub async fn abort(&self, name: &str) -> bool {
        let removed = self.tasks.lock().await.remove(name);
        match removed {
            Some(task) => {
                task.handle.abort();
                debug!("aborted task '{}'", name);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub async fn is_running(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(name)
            .is_some_and(|t| !t.handle.is_finished())
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Cancel all tracked tasks
    pub async fn cancel_all(&self) {
        let tasks: HashMap<String, Tracked> = {
            let mut guard = self.tasks.lock().await;
            guard.drain().collect()
        };
        let count = tasks.len();
        for (name, task) in tasks {
            task.handle.abort();
            debug!("cancelled task '{}'", name);
        }
        if count > 0 {
            info!("cancelled {} engine tasks", count);
        }
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
