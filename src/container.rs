//! Name-indexed collection of task queues
//!
//! Applications that want several independently configured schedulers (a
//! render queue, an asset-loading queue, a network queue) register them
//! here by name and pump them all with one [`TaskQueueContainer::update`]
//! call per frame or loop iteration.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::scheduler::{Configuration, TaskQueue};

/// Process-wide default container, for callers that do not thread their
/// own through the program.
pub static GLOBAL_CONTAINER: Lazy<TaskQueueContainer> = Lazy::new(TaskQueueContainer::new);

/// Owns [`TaskQueue`] instances keyed by name.
pub struct TaskQueueContainer {
    queues: RwLock<HashMap<String, Arc<TaskQueue>>>,
}

impl TaskQueueContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Create and initialize a queue under `name`. A no-op when the name
    /// is already taken.
    pub fn create_queue(&self, name: &str, config: &Configuration) {
        let mut queues = self.queues.write();
        if queues.contains_key(name) {
            log::warn!("task queue {name:?} already exists, ignoring create");
            return;
        }

        let queue = TaskQueue::new();
        queue.initialize(config);
        queues.insert(name.to_string(), queue);
    }

    /// Look up a queue by name.
    pub fn get_queue(&self, name: &str) -> Option<Arc<TaskQueue>> {
        self.queues.read().get(name).cloned()
    }

    /// Number of queues owned.
    pub fn queues_count(&self) -> usize {
        self.queues.read().len()
    }

    /// Pump every owned queue, in no particular order.
    pub fn update(&self) {
        // Snapshot first: update runs user code, which may call back into
        // this container.
        let queues: Vec<Arc<TaskQueue>> = self.queues.read().values().cloned().collect();
        for queue in queues {
            queue.update();
        }
    }
}

impl Default for TaskQueueContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueueContainer {
    fn drop(&mut self) {
        for queue in self.queues.get_mut().values() {
            queue.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{exec, TaskOptions};
    use crate::task::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn creates_empty() {
        let container = TaskQueueContainer::new();
        assert_eq!(container.queues_count(), 0);
        assert!(container.get_queue("missing").is_none());
        container.update();
    }

    #[test]
    fn creates_and_finds_queues() {
        let container = TaskQueueContainer::new();
        container.create_queue("render", &Configuration::new(2, 1, 1));
        container.create_queue("assets", &Configuration::new(1, 0, 0));

        assert_eq!(container.queues_count(), 2);
        let render = container.get_queue("render").expect("queue exists");
        assert!(render.is_initialized());
        assert_eq!(render.num_worker_threads(), 3);
    }

    #[test]
    fn duplicate_create_is_a_noop() {
        let container = TaskQueueContainer::new();
        container.create_queue("work", &Configuration::new(2, 1, 1));
        let first = container.get_queue("work").expect("queue exists");

        container.create_queue("work", &Configuration::new(5, 5, 5));
        let second = container.get_queue("work").expect("queue exists");

        assert_eq!(container.queues_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.num_worker_threads(), 3);
    }

    #[test]
    fn update_pumps_main_thread_tasks() {
        let container = TaskQueueContainer::new();
        container.create_queue("work", &Configuration::new(2, 1, 1));
        let queue = container.get_queue("work").expect("queue exists");

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in_task = Arc::clone(&runs);
        let mut options = TaskOptions::new([exec(move |_q, _t| {
            runs_in_task.fetch_add(1, Ordering::SeqCst);
        })]);
        options.is_main_thread = true;

        queue.add_task(Arc::new(Task::with_options(options)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        container.update();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_cleans_up_queues() {
        let container = TaskQueueContainer::new();
        container.create_queue("work", &Configuration::new(2, 1, 1));
        let queue = container.get_queue("work").expect("queue exists");

        drop(container);
        assert!(!queue.is_initialized());
        assert!(queue.is_shut_down());
    }
}
