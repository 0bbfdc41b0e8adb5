//! The task itself: status, live options, and the reschedule protocol
//!
//! A [`Task`] is shared between its submitter and the queue through a
//! [`TaskHandle`]. From inside its own executable a task may call
//! [`Task::reschedule`] to request another run with (possibly) different
//! options; the queue applies the request after the executable returns.
//! The two-field protocol (a scratch options copy plus a flag) keeps the
//! executable free of the task lock while it runs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::options::{TaskOption, TaskOptions};
use crate::scheduler::TaskQueue;

/// Shared, reference-counted handle to a task.
///
/// The queue clones the handle for the duration of a dispatch, so the task
/// stays alive through its own execution even if the submitter drops it.
pub type TaskHandle = Arc<Task>;

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Freshly created, not yet admitted to a queue.
    Init,
    /// Held in the delay map until its deadline elapses.
    Suspended,
    /// Waiting in the ready queue for a worker.
    InQueue,
    /// Waiting in the main-thread queue for an `update` call.
    InQueueMain,
    /// Executing right now.
    Working,
    /// Done, and not coming back.
    Finished,
}

pub(crate) struct TaskState {
    pub(crate) status: TaskStatus,
    pub(crate) options: TaskOptions,
    pub(crate) reschedule_options: TaskOptions,
    pub(crate) do_reschedule: bool,
}

impl TaskState {
    /// Clear the reschedule request and make the scratch copy match the
    /// live options, so a parameterless `reschedule` re-runs unchanged.
    pub(crate) fn reset_reschedule(&mut self) {
        self.do_reschedule = false;
        self.reschedule_options = self.options.clone();
    }

    /// The scratch options become the live options.
    pub(crate) fn apply_reschedule(&mut self) {
        self.options = self.reschedule_options.clone();
    }
}

/// A mutable unit of work.
///
/// Readers may observe a momentarily stale snapshot while the task is
/// executing; all accessors are safe to call from any thread.
pub struct Task {
    state: Mutex<TaskState>,
}

impl Task {
    /// Create a task with all-default options.
    pub fn new() -> Self {
        Self::with_options(TaskOptions::default())
    }

    /// Create a task from a prepared options bundle.
    pub fn with_options(options: TaskOptions) -> Self {
        Task {
            state: Mutex::new(TaskState {
                status: TaskStatus::Init,
                reschedule_options: options.clone(),
                options,
                do_reschedule: false,
            }),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    /// Snapshot of the live options that currently determine dispatch.
    pub fn options(&self) -> TaskOptions {
        self.state.lock().options.clone()
    }

    /// Snapshot of the scratch options a pending reschedule would apply.
    pub fn reschedule_options(&self) -> TaskOptions {
        self.state.lock().reschedule_options.clone()
    }

    /// Whether the task has requested another run.
    pub fn will_reschedule(&self) -> bool {
        self.state.lock().do_reschedule
    }

    /// Request another run with the given option changes merged in.
    ///
    /// Only meaningful from inside the task's own executable; the queue
    /// reads the request after the executable returns. An empty option
    /// sequence re-runs the task with unchanged options.
    pub fn reschedule(&self, opts: impl IntoIterator<Item = TaskOption>) {
        let mut state = self.state.lock();
        state.reschedule_options.set_options(opts);
        state.do_reschedule = true;
    }

    pub(crate) fn state(&self) -> &Mutex<TaskState> {
        &self.state
    }

    /// Run the executable with the task lock released.
    ///
    /// Lock hand-off: mark the task `Working` and reset the reschedule
    /// scratch under the lock, surrender the lock, invoke the executable,
    /// re-take the lock and finish unless a reschedule was requested.
    /// A panicking executable counts as finished without reschedule.
    pub(crate) fn execute(&self, queue: &TaskQueue, handle: &TaskHandle) {
        let executable = {
            let mut state = self.state.lock();
            match state.options.executable.clone() {
                Some(executable) => {
                    state.status = TaskStatus::Working;
                    state.reset_reschedule();
                    Some(executable)
                }
                None => None,
            }
        };

        let mut panicked = false;
        if let Some(executable) = executable {
            if catch_unwind(AssertUnwindSafe(|| executable.call(queue, handle))).is_err() {
                log::error!("task executable panicked, treating the task as finished");
                panicked = true;
            }
        }

        let mut state = self.state.lock();
        if panicked {
            state.do_reschedule = false;
        }
        if !state.do_reschedule {
            state.status = TaskStatus::Finished;
        }
    }

    #[cfg(test)]
    pub(crate) fn reset_reschedule_for_test(&self) {
        self.state.lock().reset_reschedule();
    }

    #[cfg(test)]
    pub(crate) fn apply_reschedule_for_test(&self) {
        self.state.lock().apply_reschedule();
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}
