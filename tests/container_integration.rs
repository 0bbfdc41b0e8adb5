//! Container behavior: queue registry and the fan-out pump.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tasklib::prelude::*;

#[test]
fn update_fans_out_to_every_queue() {
    let container = TaskQueueContainer::new();
    container.create_queue("render", &Configuration::new(2, 1, 1));
    container.create_queue("assets", &Configuration::new(2, 0, 1));
    assert_eq!(container.queues_count(), 2);

    let render = container.get_queue("render").expect("queue exists");
    let assets = container.get_queue("assets").expect("queue exists");

    let (render_task, render_flag) =
        common::flag_task([TaskOption::Target(ThreadTarget::MainThread)]);
    let (assets_task, assets_flag) =
        common::flag_task([TaskOption::Target(ThreadTarget::MainThread)]);
    assert!(render.add_task(render_task));
    assert!(assets.add_task(assets_task));

    common::sleep_ms(20);
    assert!(!render_flag.load(Ordering::SeqCst));
    assert!(!assets_flag.load(Ordering::SeqCst));

    container.update();
    assert!(render_flag.load(Ordering::SeqCst));
    assert!(assets_flag.load(Ordering::SeqCst));
}

#[test]
fn queues_are_independent() {
    let container = TaskQueueContainer::new();
    container.create_queue("a", &Configuration::new(2, 1, 1));
    container.create_queue("b", &Configuration::new(2, 1, 1));

    let a = container.get_queue("a").expect("queue exists");
    let b = container.get_queue("b").expect("queue exists");
    assert!(!Arc::ptr_eq(&a, &b));

    let (task, flag) = common::flag_task([]);
    assert!(a.add_task(task));
    assert!(common::wait_until(
        std::time::Duration::from_millis(500),
        || flag.load(Ordering::SeqCst)
    ));

    assert_eq!(a.performance_stats(false).added, 1);
    assert_eq!(b.performance_stats(false).added, 0);
}

#[test]
fn global_container_is_available() {
    GLOBAL_CONTAINER.create_queue("global-smoke", &Configuration::new(1, 0, 0));

    let queue = GLOBAL_CONTAINER
        .get_queue("global-smoke")
        .expect("queue exists");
    assert!(queue.is_initialized());

    let (task, flag) = common::flag_task([]);
    assert!(queue.add_task(task));
    assert!(common::wait_until(
        std::time::Duration::from_millis(500),
        || flag.load(Ordering::SeqCst)
    ));
}
