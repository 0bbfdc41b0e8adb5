//! The scheduler core
//!
//! [`TaskQueue`] dispatches submitted tasks across worker threads, the
//! caller-driven main-thread pump, and a deadline-ordered delay map.

pub mod queue;
pub(crate) mod worker;

pub use queue::{Configuration, PerformanceStats, TaskQueue};
