//! # tasklib
//!
//! Option-driven task scheduling for mixed CPU- and I/O-bound work inside
//! a single process.
//!
//! ## Features
//!
//! - **Tasks**: closures bundled with scheduling options (priority, a
//!   blocking hint, a thread target, and an optional start delay)
//! - **Worker split**: blocking and non-blocking worker flavors, so short
//!   tasks overtake long-running ones
//! - **Main-thread dispatch**: tasks targeted at the caller's thread run
//!   from inside [`TaskQueue::update`], never anywhere else
//! - **Delays**: suspended tasks sleep in a deadline-ordered map and
//!   re-enter admission when due
//! - **Reschedule**: a task can request another run with different
//!   options from inside its own body
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasklib::prelude::*;
//! use std::time::Duration;
//!
//! let queue = TaskQueue::new();
//! queue.initialize(&Configuration::default());
//!
//! // Plain worker task.
//! queue.add_task(task!(exec(|_queue, _task| {
//!     println!("hello from a worker thread");
//! })));
//!
//! // High-priority task that starts after 50 ms, runs once on a worker,
//! // then reschedules itself onto the main thread.
//! queue.add_task(task!(
//!     10,
//!     Duration::from_millis(50),
//!     exec(|_queue, task| {
//!         task.reschedule([TaskOption::Target(ThreadTarget::MainThread)]);
//!     }),
//! ));
//!
//! // The caller's loop pumps main-thread tasks and the delay clock.
//! queue.update();
//!
//! queue.cleanup();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod container;
pub mod error;
pub mod options;
pub mod pool;
pub mod scheduler;
pub mod task;

/// Convenient re-exports for common functionality
pub mod prelude {
    pub use crate::container::{TaskQueueContainer, GLOBAL_CONTAINER};
    pub use crate::error::{Error, Result};
    pub use crate::options::{
        exec, TaskBlocking, TaskExecutable, TaskOption, TaskOptions, TaskPriority, ThreadTarget,
    };
    pub use crate::pool::{PoolItem, ResourcePool};
    pub use crate::scheduler::{Configuration, PerformanceStats, TaskQueue};
    pub use crate::task::{Task, TaskHandle, TaskStatus};

    /// Build a [`TaskOptions`] from a list of option values.
    ///
    /// Each argument is anything convertible into a
    /// [`TaskOption`](crate::options::TaskOption): a `u32` priority, a
    /// `bool` blocking hint, a [`ThreadTarget`](crate::options::ThreadTarget),
    /// a [`Duration`](std::time::Duration) delay, an executable from
    /// [`exec`](crate::options::exec), or a whole options value. Options
    /// apply left to right; the last mention of a field wins.
    #[macro_export]
    macro_rules! task_options {
        () => {
            $crate::options::TaskOptions::default()
        };
        ($($opt:expr),+ $(,)?) => {
            $crate::options::TaskOptions::new([$($crate::options::TaskOption::from($opt)),+])
        };
    }

    /// Build a ready-to-submit [`TaskHandle`](crate::task::TaskHandle)
    /// from a list of option values. Same argument rules as
    /// [`task_options!`].
    #[macro_export]
    macro_rules! task {
        ($($opt:expr),* $(,)?) => {
            ::std::sync::Arc::new($crate::task::Task::with_options(
                $crate::task_options!($($opt),*),
            ))
        };
    }

    pub use crate::{task, task_options};
}

// Re-export the prelude at crate root for convenience
pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn basic_queue_test() {
        let queue = TaskQueue::new();
        queue.initialize(&Configuration::new(2, 1, 1));

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in_task = Arc::clone(&runs);
        queue.add_task(task!(exec(move |_queue, _task| {
            runs_in_task.fetch_add(1, Ordering::SeqCst);
        })));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        queue.cleanup();
    }

    #[test]
    fn task_macro_applies_options() {
        let task = task!(7, true, Duration::from_millis(3));
        let options = task.options();

        assert_eq!(options.priority, 7);
        assert!(options.is_blocking);
        assert!(!options.is_main_thread);
        assert_eq!(options.delay, Duration::from_millis(3));
        assert!(options.executable.is_none());
    }
}
