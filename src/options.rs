//! Task scheduling options
//!
//! [`TaskOptions`] bundles the five knobs that decide where and when a task
//! runs: priority, the blocking hint, the thread target, an optional start
//! delay, and the executable itself. Options are merged from a sequence of
//! [`TaskOption`] values in application order, so the last mention of a
//! field wins.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::TaskQueue;
use crate::task::TaskHandle;

/// Task priority. Higher values are more important; 0 is the default.
pub type TaskPriority = u32;

/// Blocking hint for a task that may occupy its worker for a long time.
pub type TaskBlocking = bool;

/// Which thread a task is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadTarget {
    /// The caller's thread, serviced from inside [`TaskQueue::update`].
    MainThread,
    /// Any of the queue's worker threads.
    WorkerThread,
}

/// The callable body of a task.
///
/// Executables receive the queue they run on and a handle to their own
/// task, so they can call [`Task::reschedule`](crate::task::Task::reschedule)
/// or submit further work. They may run more than once, so the underlying
/// closure is `Fn`, shared behind an `Arc`.
///
/// Erased callables cannot be compared for semantic identity; equality is
/// defined as "same erased closure type" and nothing more. Do not use it
/// to distinguish two instances of the same closure.
#[derive(Clone)]
pub struct TaskExecutable {
    func: Arc<dyn Fn(&TaskQueue, &TaskHandle) + Send + Sync>,
    type_id: TypeId,
}

impl TaskExecutable {
    /// Wrap a closure as a task executable.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TaskQueue, &TaskHandle) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            type_id: TypeId::of::<F>(),
        }
    }

    /// Invoke the executable.
    pub fn call(&self, queue: &TaskQueue, task: &TaskHandle) {
        (self.func)(queue, task)
    }
}

impl PartialEq for TaskExecutable {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TaskExecutable {}

impl fmt::Debug for TaskExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutable")
            .field("type_id", &self.type_id)
            .finish()
    }
}

/// Wrap a closure as a [`TaskOption::Executable`].
///
/// Shorthand for option lists: `task_options![exec(|queue, task| { .. })]`.
pub fn exec<F>(f: F) -> TaskOption
where
    F: Fn(&TaskQueue, &TaskHandle) + Send + Sync + 'static,
{
    TaskOption::Executable(TaskExecutable::new(f))
}

/// A single scheduling option, one variant per knob.
#[derive(Debug, Clone)]
pub enum TaskOption {
    /// Set the priority.
    Priority(TaskPriority),
    /// Set the blocking hint.
    Blocking(TaskBlocking),
    /// Set the thread target.
    Target(ThreadTarget),
    /// Set the start delay.
    Delay(Duration),
    /// Set the executable.
    Executable(TaskExecutable),
    /// Overwrite every field from a whole options value.
    Options(TaskOptions),
}

impl From<TaskPriority> for TaskOption {
    fn from(priority: TaskPriority) -> Self {
        TaskOption::Priority(priority)
    }
}

impl From<bool> for TaskOption {
    fn from(is_blocking: bool) -> Self {
        TaskOption::Blocking(is_blocking)
    }
}

impl From<ThreadTarget> for TaskOption {
    fn from(target: ThreadTarget) -> Self {
        TaskOption::Target(target)
    }
}

impl From<Duration> for TaskOption {
    fn from(delay: Duration) -> Self {
        TaskOption::Delay(delay)
    }
}

impl From<TaskExecutable> for TaskOption {
    fn from(executable: TaskExecutable) -> Self {
        TaskOption::Executable(executable)
    }
}

impl From<TaskOptions> for TaskOption {
    fn from(options: TaskOptions) -> Self {
        TaskOption::Options(options)
    }
}

/// The full bundle of scheduling options for one task.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Priority; tasks below the queue's running priority are passed over.
    pub priority: TaskPriority,
    /// Hint that the task may run long. Non-blocking workers skip it.
    pub is_blocking: bool,
    /// Dispatch on the main thread via [`TaskQueue::update`].
    pub is_main_thread: bool,
    /// Hold the task in the delay map this long before admission.
    pub delay: Duration,
    /// The task body. A task without one finishes immediately.
    pub executable: Option<TaskExecutable>,
}

impl TaskOptions {
    /// Build options from a sequence of [`TaskOption`] values.
    pub fn new(opts: impl IntoIterator<Item = TaskOption>) -> Self {
        let mut options = Self::default();
        options.set_options(opts);
        options
    }

    /// Apply options in order. The last mention of a field wins, fields
    /// not mentioned keep their value, and an empty sequence is a no-op.
    pub fn set_options(&mut self, opts: impl IntoIterator<Item = TaskOption>) {
        for opt in opts {
            self.set_option(opt);
        }
    }

    fn set_option(&mut self, opt: TaskOption) {
        match opt {
            TaskOption::Priority(priority) => self.priority = priority,
            TaskOption::Blocking(is_blocking) => self.is_blocking = is_blocking,
            TaskOption::Target(target) => {
                self.is_main_thread = target == ThreadTarget::MainThread;
            }
            TaskOption::Delay(delay) => self.delay = delay,
            TaskOption::Executable(executable) => self.executable = Some(executable),
            TaskOption::Options(options) => *self = options,
        }
    }
}

impl PartialEq for TaskOptions {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
            && self.is_blocking == other.is_blocking
            && self.is_main_thread == other.is_main_thread
            && self.delay == other.delay
            && match (&self.executable, &other.executable) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}
