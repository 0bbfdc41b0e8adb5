//! The task queue: admission, worker dispatch, delayed resumption, and the
//! main-thread pump
//!
//! A [`TaskQueue`] owns three containers. Worker-targeted tasks wait in the
//! ready queue and are picked up by worker threads; main-thread tasks wait
//! in the main queue and run from inside [`TaskQueue::update`]; delayed
//! tasks sit in a deadline-ordered map until a delay thread promotes them
//! back through admission. A single `running_priority` ceiling gates all
//! dequeues: while a prioritized task is in flight, lower-priority tasks
//! are passed over rather than dropped.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::task::{TaskHandle, TaskState, TaskStatus};

use super::worker::{DelayThread, WorkerThread};

/// Sentinel written to `earliest_deadline` to force a delay thread to
/// re-read the map regardless of what it believed the earliest entry was.
const DEADLINE_PAST: u64 = 0;
/// Sentinel meaning the delay map is empty.
const DEADLINE_FAR: u64 = u64::MAX;

/// Thread counts for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Workers that accept every task, including blocking ones.
    pub blocking_threads: usize,
    /// Workers that skip tasks carrying the blocking hint.
    pub non_blocking_threads: usize,
    /// Delay scheduler threads. One is enough for almost every workload.
    pub scheduling_threads: usize,
}

impl Configuration {
    /// Explicit thread counts.
    pub fn new(blocking: usize, non_blocking: usize, scheduling: usize) -> Self {
        Self {
            blocking_threads: blocking,
            non_blocking_threads: non_blocking,
            scheduling_threads: scheduling,
        }
    }

    /// Size the pool from the machine: one blocking worker per CPU core,
    /// a quarter as many non-blocking workers, one delay thread.
    pub fn auto() -> Self {
        let cores = num_cpus::get();
        Self {
            blocking_threads: cores.max(1),
            non_blocking_threads: (cores / 4).max(1),
            scheduling_threads: 1,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(6, 2, 1)
    }
}

/// Snapshot of a queue's performance counters.
///
/// `added`, `completed`, `suspended` and `resumed` accumulate and can be
/// reset through [`TaskQueue::performance_stats`]; `waiting` and `total`
/// track the current population and are never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceStats {
    /// Tasks accepted by [`TaskQueue::add_task`].
    pub added: i64,
    /// Tasks that finished without requesting a reschedule.
    pub completed: i64,
    /// Admissions that went to the delay map.
    pub suspended: i64,
    /// Promotions out of the delay map.
    pub resumed: i64,
    /// Tasks currently in the delay map.
    pub waiting: i64,
    /// Tasks currently anywhere in the queue, including in flight.
    pub total: i64,
}

#[derive(Default)]
struct Counters {
    added: AtomicI64,
    completed: AtomicI64,
    suspended: AtomicI64,
    resumed: AtomicI64,
    waiting: AtomicI64,
    total: AtomicI64,
}

impl Counters {
    fn reset(&self) {
        self.added.store(0, Ordering::Release);
        self.completed.store(0, Ordering::Release);
        self.suspended.store(0, Ordering::Release);
        self.resumed.store(0, Ordering::Release);
        self.waiting.store(0, Ordering::Release);
        self.total.store(0, Ordering::Release);
    }
}

/// A scheduler instance: worker threads, delay threads, and the three task
/// containers they serve.
///
/// Lock order is `task lock → init lock → delay lock → ready lock → main
/// lock`; any path taking two of them takes them in that order. The two
/// scans that inspect task state while holding a queue lock (worker pick,
/// `update` partition) use `try_lock` and so cannot close a cycle.
pub struct TaskQueue {
    weak_self: Weak<TaskQueue>,
    /// All deadlines are nanoseconds relative to this instant.
    epoch: Instant,

    initialized: AtomicBool,
    shut_down: AtomicBool,
    running_priority: AtomicU32,

    init_lock: Mutex<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    delay_threads: Mutex<Vec<JoinHandle<()>>>,

    num_blocking: AtomicUsize,
    num_non_blocking: AtomicUsize,
    num_scheduling: AtomicUsize,

    ready: Mutex<VecDeque<TaskHandle>>,
    ready_cond: Condvar,

    main: Mutex<VecDeque<TaskHandle>>,

    delay: Mutex<BTreeMap<u64, Vec<TaskHandle>>>,
    delay_cond: Condvar,
    earliest_deadline: AtomicU64,

    counters: Counters,
}

impl TaskQueue {
    /// Create a queue. It accepts no tasks until [`TaskQueue::initialize`]
    /// is called.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| TaskQueue {
            weak_self: weak.clone(),
            epoch: Instant::now(),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            running_priority: AtomicU32::new(0),
            init_lock: Mutex::new(()),
            workers: Mutex::new(Vec::new()),
            delay_threads: Mutex::new(Vec::new()),
            num_blocking: AtomicUsize::new(0),
            num_non_blocking: AtomicUsize::new(0),
            num_scheduling: AtomicUsize::new(0),
            ready: Mutex::new(VecDeque::new()),
            ready_cond: Condvar::new(),
            main: Mutex::new(VecDeque::new()),
            delay: Mutex::new(BTreeMap::new()),
            delay_cond: Condvar::new(),
            earliest_deadline: AtomicU64::new(DEADLINE_FAR),
            counters: Counters::default(),
        })
    }

    /// Spawn the configured threads.
    ///
    /// Ignored when the queue is already initialized, already shut down,
    /// or `blocking_threads` is zero (a queue with only non-blocking
    /// workers would never run blocking tasks).
    pub fn initialize(&self, config: &Configuration) {
        let _guard = self.init_lock.lock();

        if self.initialized.load(Ordering::Acquire) {
            log::warn!("ignoring initialize on an already initialized task queue");
            return;
        }
        if self.shut_down.load(Ordering::Acquire) {
            log::warn!("ignoring initialize on a shut down task queue");
            return;
        }
        if config.blocking_threads == 0 {
            log::warn!("ignoring initialize without blocking threads");
            return;
        }

        if let Err(err) = self.create_threads(config) {
            log::error!("task queue initialization failed: {err}");
            self.shutdown_threads();
            return;
        }

        self.initialized.store(true, Ordering::Release);
        log::info!(
            "initialized task queue ({} blocking, {} non-blocking, {} scheduling threads)",
            config.blocking_threads,
            config.non_blocking_threads,
            config.scheduling_threads
        );
    }

    /// Stop and join every thread, clear the containers, reset the
    /// counters. Idempotent; a no-op on a queue that was never
    /// initialized. The queue accepts no tasks afterwards.
    pub fn cleanup(&self) {
        let _guard = self.init_lock.lock();

        if !self.initialized.load(Ordering::Acquire) {
            return;
        }

        self.shutdown_threads();
        self.initialized.store(false, Ordering::Release);
        log::info!("task queue shut down");
    }

    /// Submit a task. Returns `false` when the queue is not initialized or
    /// is shutting down; no state is mutated in that case.
    pub fn add_task(&self, task: TaskHandle) -> bool {
        self.try_add_task(task).is_ok()
    }

    /// Submit a task, reporting the rejection reason.
    pub fn try_add_task(&self, task: TaskHandle) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::ShutDown);
        }

        self.counters.added.fetch_add(1, Ordering::Relaxed);
        let mut state = task.state().lock();
        self.admit(&task, &mut state, true);
        Ok(())
    }

    /// Pump the queue from the caller's thread.
    ///
    /// Pokes the delay thread when the earliest deadline has passed, then
    /// drains the main-thread queue: entries passing the admission test
    /// run here, entries below the priority ceiling stay queued for a
    /// later pump.
    pub fn update(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }

        if self.earliest_deadline.load(Ordering::Acquire) <= self.now_nanos() {
            self.delay_cond.notify_one();
        }

        let run = {
            let mut main = self.main.lock();
            if main.is_empty() {
                return;
            }

            let ceiling = self.running_priority.load(Ordering::Acquire);
            let mut run = Vec::new();
            let mut defer = VecDeque::new();
            for task in main.drain(..) {
                let admitted = match task.state().try_lock() {
                    Some(state) => state.options.priority >= ceiling,
                    // Lock momentarily held elsewhere; look again next pump.
                    None => false,
                };
                if admitted {
                    run.push(task);
                } else {
                    defer.push_back(task);
                }
            }
            *main = defer;
            run
        };

        for task in run {
            self.dispatch(&task);
        }
    }

    /// Snapshot the performance counters. With `reset`, the accumulating
    /// counters (`added`, `completed`, `suspended`, `resumed`) are zeroed
    /// atomically; `waiting` and `total` are never reset.
    pub fn performance_stats(&self, reset: bool) -> PerformanceStats {
        let take = |counter: &AtomicI64| {
            if reset {
                counter.swap(0, Ordering::AcqRel)
            } else {
                counter.load(Ordering::Acquire)
            }
        };

        PerformanceStats {
            added: take(&self.counters.added),
            completed: take(&self.counters.completed),
            suspended: take(&self.counters.suspended),
            resumed: take(&self.counters.resumed),
            waiting: self.counters.waiting.load(Ordering::Acquire),
            total: self.counters.total.load(Ordering::Acquire),
        }
    }

    /// Whether `initialize` has run and `cleanup` has not.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether the queue is shutting down or shut down.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Total worker threads, both flavors.
    pub fn num_worker_threads(&self) -> usize {
        self.num_blocking_threads() + self.num_non_blocking_threads()
    }

    /// Workers that accept blocking tasks.
    pub fn num_blocking_threads(&self) -> usize {
        self.num_blocking.load(Ordering::Acquire)
    }

    /// Workers that skip blocking tasks.
    pub fn num_non_blocking_threads(&self) -> usize {
        self.num_non_blocking.load(Ordering::Acquire)
    }

    /// Delay scheduler threads.
    pub fn num_scheduling_threads(&self) -> usize {
        self.num_scheduling.load(Ordering::Acquire)
    }

    // ===== internals =====================================================

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn create_threads(&self, config: &Configuration) -> Result<()> {
        let queue = self.weak_self.upgrade().ok_or_else(|| Error::Spawn {
            reason: "queue handle no longer available".to_string(),
        })?;

        let mut workers = self.workers.lock();
        let mut delay_threads = self.delay_threads.lock();
        let mut id: u32 = 0;

        for _ in 0..config.non_blocking_threads {
            workers.push(WorkerThread::new(id, true).spawn(Arc::clone(&queue))?);
            id += 1;
        }
        for _ in 0..config.blocking_threads {
            workers.push(WorkerThread::new(id, false).spawn(Arc::clone(&queue))?);
            id += 1;
        }
        for _ in 0..config.scheduling_threads {
            delay_threads.push(DelayThread::new(id).spawn(Arc::clone(&queue))?);
            id += 1;
        }

        self.num_blocking.store(config.blocking_threads, Ordering::Release);
        self.num_non_blocking
            .store(config.non_blocking_threads, Ordering::Release);
        self.num_scheduling
            .store(config.scheduling_threads, Ordering::Release);

        Ok(())
    }

    /// Flag, wake, join, clear. Caller holds the init lock.
    fn shutdown_threads(&self) {
        self.shut_down.store(true, Ordering::Release);

        // Take each condvar's mutex around the broadcast so a thread
        // between its predicate check and its wait cannot miss the wakeup.
        {
            let _ready = self.ready.lock();
            self.ready_cond.notify_all();
        }
        {
            let _delay = self.delay.lock();
            self.delay_cond.notify_all();
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                log::warn!("worker thread panicked during shutdown");
            }
        }
        let delay_threads: Vec<JoinHandle<()>> = self.delay_threads.lock().drain(..).collect();
        for handle in delay_threads {
            if handle.join().is_err() {
                log::warn!("delay thread panicked during shutdown");
            }
        }

        self.num_blocking.store(0, Ordering::Release);
        self.num_non_blocking.store(0, Ordering::Release);
        self.num_scheduling.store(0, Ordering::Release);

        self.ready.lock().clear();
        self.main.lock().clear();
        self.delay.lock().clear();
        self.earliest_deadline.store(DEADLINE_FAR, Ordering::Release);
        self.running_priority.store(0, Ordering::Release);
        self.counters.reset();
    }

    /// Route an admitted task to the delay map, the ready queue, or the
    /// main-thread queue. The caller holds the task lock; `update_total`
    /// is false when the task is re-entering (reschedule or promotion) and
    /// is therefore already counted.
    fn admit(&self, task: &TaskHandle, state: &mut TaskState, update_total: bool) {
        if state.options.delay > Duration::ZERO {
            let delay_nanos = u64::try_from(state.options.delay.as_nanos()).unwrap_or(u64::MAX);
            let deadline = self
                .now_nanos()
                .saturating_add(delay_nanos)
                .min(DEADLINE_FAR - 1);
            {
                let mut delay = self.delay.lock();
                delay.entry(deadline).or_default().push(Arc::clone(task));
                state.status = TaskStatus::Suspended;
            }
            self.counters.suspended.fetch_add(1, Ordering::Relaxed);
            self.counters.waiting.fetch_add(1, Ordering::Relaxed);

            // The newcomer may not be the earliest entry; the past
            // sentinel forces the delay thread to re-read the map and
            // recompute.
            self.earliest_deadline.store(DEADLINE_PAST, Ordering::Release);
            self.delay_cond.notify_one();
        } else {
            if !state.options.is_main_thread {
                {
                    let mut ready = self.ready.lock();
                    ready.push_back(Arc::clone(task));
                }
                state.status = TaskStatus::InQueue;
                self.ready_cond.notify_all();
            } else {
                let mut main = self.main.lock();
                main.push_back(Arc::clone(task));
                state.status = TaskStatus::InQueueMain;
            }

            self.running_priority
                .fetch_max(state.options.priority, Ordering::AcqRel);
        }

        if update_total {
            self.counters.total.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn dispatch(&self, task: &TaskHandle) {
        task.execute(self, task);
        self.reschedule_task(task);
    }

    /// The reschedule protocol, run after every dispatch.
    fn reschedule_task(&self, task: &TaskHandle) {
        let mut state = task.state().lock();
        if state.do_reschedule {
            state.apply_reschedule();
            self.admit(task, &mut state, false);
        } else {
            if state.options.priority > 0 {
                // Ceiling released. Any finishing prioritized task resets
                // it, even with other prioritized tasks still in flight.
                self.running_priority.store(0, Ordering::Release);
            }
            self.counters.total.fetch_sub(1, Ordering::Relaxed);
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Worker loop. Waits for the ready queue to fill, then scans it
    /// front to back for the first task whose lock is free and which
    /// passes the admission test for this worker flavor.
    pub(crate) fn run_worker(&self, thread_num: u32, ignore_blocking: bool) {
        log::debug!(
            "worker {} starting ({})",
            thread_num,
            if ignore_blocking {
                "non-blocking"
            } else {
                "blocking"
            }
        );

        loop {
            let task = {
                let mut ready = self.ready.lock();
                while !self.shut_down.load(Ordering::Acquire) && ready.is_empty() {
                    self.ready_cond.wait(&mut ready);
                }
                if self.shut_down.load(Ordering::Acquire) {
                    log::debug!("worker {}: shut down", thread_num);
                    return;
                }

                match self.scan_ready(&ready, ignore_blocking) {
                    Some(index) => ready.remove(index),
                    None => {
                        // Everything queued is gated by the ceiling or the
                        // blocking split. The ceiling drops without a
                        // ready-queue notification, so park with a timeout
                        // instead of spinning.
                        let _ = self
                            .ready_cond
                            .wait_for(&mut ready, Duration::from_millis(1));
                        None
                    }
                }
            };

            if let Some(task) = task {
                self.dispatch(&task);
            }
        }
    }

    /// Index of the first admissible ready task for this worker flavor.
    /// Gated tasks stay where they are.
    fn scan_ready(&self, ready: &VecDeque<TaskHandle>, ignore_blocking: bool) -> Option<usize> {
        let ceiling = self.running_priority.load(Ordering::Acquire);
        for (index, task) in ready.iter().enumerate() {
            if let Some(state) = task.state().try_lock() {
                if state.options.is_blocking && ignore_blocking {
                    continue;
                }
                if state.options.priority < ceiling {
                    continue;
                }
                return Some(index);
            }
        }
        None
    }

    /// Delay thread loop. Sleeps until the earliest deadline (or a poke),
    /// promotes every entry that has come due, and re-admits them.
    pub(crate) fn run_delay(&self, thread_num: u32) {
        log::debug!("delay thread {} starting", thread_num);

        loop {
            let due = {
                let mut delay = self.delay.lock();
                loop {
                    if self.shut_down.load(Ordering::Acquire) {
                        log::debug!("delay thread {}: shut down", thread_num);
                        return;
                    }
                    let earliest = self.earliest_deadline.load(Ordering::Acquire);
                    if earliest <= self.now_nanos() {
                        break;
                    }
                    match self.epoch.checked_add(Duration::from_nanos(earliest)) {
                        Some(deadline) if earliest != DEADLINE_FAR => {
                            let _ = self.delay_cond.wait_until(&mut delay, deadline);
                        }
                        // Empty map or a deadline beyond what the clock can
                        // represent: sleep until poked.
                        _ => {
                            self.delay_cond.wait(&mut delay);
                        }
                    }
                }

                let now = self.now_nanos();
                let later = delay.split_off(&now);
                let due = std::mem::replace(&mut *delay, later);

                let next = delay.keys().next().copied().unwrap_or(DEADLINE_FAR);
                self.earliest_deadline.store(next, Ordering::Release);

                due
            };

            // Re-admission happens with the delay lock released; a task
            // that immediately re-suspends takes the lock again in the
            // documented order.
            for task in due.into_values().flatten() {
                log::debug!("delay thread {}: resuming task", thread_num);
                self.counters.resumed.fetch_add(1, Ordering::Relaxed);
                self.counters.waiting.fetch_sub(1, Ordering::Relaxed);

                let mut state = task.state().lock();
                state.options.delay = Duration::ZERO;
                self.admit(&task, &mut state, false);
            }
        }
    }
}
