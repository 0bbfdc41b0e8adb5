//! Error types for tasklib
//!
//! This module provides error handling types used throughout the library.
//!
//! Most of the scheduler API reports failure through sentinel returns
//! (`add_task` returns `false`, a second `initialize` is ignored); the
//! typed errors here cover the callers that want the reason, and the
//! internal thread-management paths.

use thiserror::Error;

/// Main error type for tasklib operations
#[derive(Error, Debug)]
pub enum Error {
    /// The queue has not been initialized yet
    #[error("Task queue is not initialized")]
    NotInitialized,

    /// The queue has been shut down and no longer accepts tasks
    #[error("Task queue is shut down")]
    ShutDown,

    /// Spawning a worker or delay thread failed
    #[error("Failed to spawn thread: {reason}")]
    Spawn {
        /// Reason for the spawn failure
        reason: String,
    },
}

/// Convenient result type alias
pub type Result<T> = std::result::Result<T, Error>;
