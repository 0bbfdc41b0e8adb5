//! Shared helpers for the integration suite

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tasklib::prelude::*;

/// Build a task that raises a flag when it runs, with extra options
/// merged on top.
pub fn flag_task(opts: impl IntoIterator<Item = TaskOption>) -> (TaskHandle, Arc<AtomicBool>) {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_in_task = Arc::clone(&flag);

    let mut options = TaskOptions::new([exec(move |_queue, _task| {
        flag_in_task.store(true, Ordering::SeqCst);
    })]);
    options.set_options(opts);

    (Arc::new(Task::with_options(options)), flag)
}

/// Build a task that sleeps for `ms` and then raises a flag, with extra
/// options merged on top.
pub fn sleeper_task(
    ms: u64,
    opts: impl IntoIterator<Item = TaskOption>,
) -> (TaskHandle, Arc<AtomicBool>) {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_in_task = Arc::clone(&flag);

    let mut options = TaskOptions::new([exec(move |_queue, _task| {
        std::thread::sleep(Duration::from_millis(ms));
        flag_in_task.store(true, Ordering::SeqCst);
    })]);
    options.set_options(opts);

    (Arc::new(Task::with_options(options)), flag)
}

pub fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// Poll `cond` until it holds or `timeout` elapses; true when it held.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
