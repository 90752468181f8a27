//! # Task System Core Traits
//!
//! This module defines the unit of work executed by the [`TaskManager`](super::TaskManager).
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task travels back to the owner thread together with its output in a
//!    [`TaskOutcome`]
//! 4. The owner collects outcomes with `TaskManager::poll_completed()`
//!
//! Because the task itself comes back, a failed task can always be rerun on the
//! owner thread.
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - A task owns everything it needs; no references into owner-thread state

use std::any::Any;

use crate::engine_state::error::TaskError;

/// A unit of work that can be executed on a worker thread.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Must not hold references to data that might be modified elsewhere
/// - Running `process` twice must give equivalent outputs, since a failed task
///   is rerun synchronously
pub trait Task: Send + 'static {
    /// What the task produces.
    type Output: Send + 'static;

    /// Performs the work. Runs on a worker thread, or on the owner thread when
    /// falling back after a worker failure.
    fn process(&self) -> Self::Output;
}

/// A task returned from a worker, with what it produced.
#[derive(Debug)]
pub struct TaskOutcome<T: Task> {
    /// The task that was run.
    pub task: T,
    /// Its output, or why there is none.
    pub result: Result<T::Output, TaskError>,
}

impl<T: Task> TaskOutcome<T> {
    /// Returns the output, running the task on the calling thread if the worker failed.
    pub fn into_output_or_rerun(self) -> T::Output {
        match self.result {
            Ok(output) => output,
            Err(e) => {
                log::warn!("{}, rerunning task on the calling thread", e);
                self.task.process()
            }
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
