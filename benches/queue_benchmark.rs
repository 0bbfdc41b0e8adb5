//! Scheduler throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tasklib::prelude::*;

fn bench_add_task(c: &mut Criterion) {
    let queue = TaskQueue::new();
    queue.initialize(&Configuration::default());

    c.bench_function("add_task_noop", |b| {
        b.iter(|| {
            queue.add_task(task!(exec(|_queue, _task| {})));
        })
    });

    queue.cleanup();
}

fn bench_dispatch_1000(c: &mut Criterion) {
    let queue = TaskQueue::new();
    queue.initialize(&Configuration::default());

    c.bench_function("dispatch_1000", |b| {
        b.iter(|| {
            let count = Arc::new(AtomicUsize::new(0));

            for _ in 0..1000 {
                let count_in_task = Arc::clone(&count);
                queue.add_task(task!(exec(move |_queue, _task| {
                    count_in_task.fetch_add(1, Ordering::Relaxed);
                })));
            }

            while count.load(Ordering::Relaxed) < 1000 {
                std::thread::sleep(Duration::from_micros(50));
            }
            black_box(count.load(Ordering::Relaxed));
        })
    });

    queue.cleanup();
}

fn bench_set_options(c: &mut Criterion) {
    c.bench_function("set_options_merge", |b| {
        b.iter(|| {
            let mut options = TaskOptions::default();
            options.set_options([
                TaskOption::Priority(black_box(7)),
                TaskOption::Blocking(true),
                TaskOption::Target(ThreadTarget::MainThread),
                TaskOption::Delay(Duration::from_millis(5)),
            ]);
            black_box(options);
        })
    });
}

criterion_group!(
    benches,
    bench_add_task,
    bench_dispatch_1000,
    bench_set_options
);
criterion_main!(benches);
