//! # Task Management System
//!
//! This module provides a small worker pool for executing CPU-bound work off the
//! owner thread.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: central coordinator for task distribution and worker management
//! - `Task`: a unit of work that can be executed on a worker
//! - `TaskOutcome`: a finished task together with its output or failure
//! - `TaskChannel`: communication channel between the owner thread and one worker
//!
//! Each worker is a `std::thread` with a dedicated channel pair. Tasks are
//! distributed round-robin with at most [`MAX_TASKS_IN_FLIGHT`] per worker;
//! anything beyond that waits in a FIFO backlog until a worker frees up.
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. The manager hands them to an idle worker, or queues them
//! 3. Workers run them, catching panics, and send back a `TaskOutcome`
//! 4. The owner thread collects outcomes in `poll_completed()` without blocking
//! 5. `process_queued_tasks()` moves backlog tasks onto freed workers
//!
//! ## Failure Handling
//! A panic inside `process()` is caught on the worker and reported as
//! `TaskError::Panicked`; a task that cannot be handed to its worker is
//! reported as `TaskError::Disconnected`. Either way the task is returned so the
//! caller can run it synchronously.
//!
//! ## Example Usage
//! ```rust
//! use voxel_world_engine::engine_state::task_management::{task::Task, TaskManager};
//!
//! struct Square(u64);
//!
//! impl Task for Square {
//!     type Output = u64;
//!     fn process(&self) -> u64 {
//!         self.0 * self.0
//!     }
//! }
//!
//! let mut task_manager = TaskManager::new(2);
//! task_manager.publish_task(Square(7));
//!
//! let mut results = Vec::new();
//! while results.is_empty() {
//!     task_manager.process_queued_tasks();
//!     results.extend(task_manager.poll_completed());
//!     std::thread::yield_now();
//! }
//! assert_eq!(results[0].result, Ok(49));
//! ```

pub mod task;

use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{error, info};

use crate::engine_state::error::TaskError;

use task::{panic_message, Task, TaskOutcome};

/// A communication channel between the owner thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from owner thread to worker
/// - `result_receiver`: Receives finished tasks from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `connected`: Cleared once the worker is found to be gone
/// - `_worker`: Handle to the worker thread
#[derive(Debug)]
pub struct TaskChannel<T: Task> {
    task_sender: Sender<T>,
    result_receiver: Receiver<TaskOutcome<T>>,
    num_tasks_in_flight: usize,
    connected: bool,
    _worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `failed`: Tasks that could not be delivered, returned by the next poll
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    failed: Vec<TaskOutcome<T>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Keeping this at 1 lets a busy worker's backlog be picked up by whichever
/// worker frees up first.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl<T: Task> TaskManager<T> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. `0` creates none;
    ///   published tasks then stay queued and callers run work synchronously.
    ///
    /// A worker whose thread cannot be spawned is logged and left out of the pool.
    pub fn new(num_workers: usize) -> Self {
        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<T>();
            let (result_tx, result_rx) = channel::<TaskOutcome<T>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = catch_unwind(AssertUnwindSafe(|| task.process()))
                        .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
                    if result_tx.send(TaskOutcome { task, result }).is_err() {
                        break;
                    }
                }
            };

            match thread::Builder::new()
                .name(format!("task-worker-{}", index))
                .spawn(task_closure)
            {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: task_tx,
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    connected: true,
                    _worker: worker,
                }),
                Err(e) => error!("could not spawn task worker {}: {}", index, e),
            }
        }

        info!("task manager started with {} workers", channels.len());

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            failed: Vec::new(),
            current_channel: 0,
        }
    }

    /// Number of workers still accepting tasks.
    pub fn worker_count(&self) -> usize {
        self.channels.iter().filter(|channel| channel.connected).count()
    }

    /// Number of tasks handed to workers that have not come back yet.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Number of tasks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was handed to the worker
    /// - `Err(task)` if the worker is gone; the channel is marked disconnected
    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        let channel = &mut self.channels[channel_idx];
        match channel.task_sender.send(task) {
            Ok(_) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(returned) => {
                error!("task worker {} disconnected", channel_idx);
                channel.connected = false;
                Err(returned.0)
            }
        }
    }

    /// Finds an available worker channel using round-robin starting at the
    /// last used channel. Busy and disconnected channels are skipped.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&index| {
                let channel = &self.channels[index];
                channel.connected && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on a worker
    /// - `false` if it was queued (all workers busy) or reported as failed
    ///   (worker disconnected)
    pub fn publish_task(&mut self, task: T) -> bool {
        let Some(channel_idx) = self.find_available_channel() else {
            self.queued_tasks.push_back(task);
            return false;
        };

        match self.try_send_task(task, channel_idx) {
            Ok(_) => {
                self.current_channel = (channel_idx + 1) % self.channels.len();
                true
            }
            Err(task) => {
                self.failed.push(TaskOutcome {
                    task,
                    result: Err(TaskError::Disconnected(channel_idx)),
                });
                false
            }
        }
    }

    /// Moves queued tasks onto workers that have become available, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => self.failed.push(TaskOutcome {
                    task,
                    result: Err(TaskError::Disconnected(channel_idx)),
                }),
            }
        }
    }

    /// Removes every queued task without running it, e.g. after a world reset.
    pub fn drain_queued(&mut self) -> Vec<T> {
        self.queued_tasks.drain(..).collect()
    }

    /// Collects every finished task without blocking.
    pub fn poll_completed(&mut self) -> Vec<TaskOutcome<T>> {
        let mut completed = std::mem::take(&mut self.failed);

        for (index, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(outcome) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        completed.push(outcome);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if channel.connected {
                            error!(
                                "task worker {} exited with {} tasks in flight",
                                index, channel.num_tasks_in_flight
                            );
                        }
                        channel.connected = false;
                        channel.num_tasks_in_flight = 0;
                        break;
                    }
                }
            }
        }

        completed
    }

    /// Cuts both channels of worker `index`, as if its thread had died.
    #[cfg(test)]
    pub(crate) fn disconnect_worker(&mut self, index: usize) {
        let (dead_sender, _) = channel::<T>();
        let (_, dead_receiver) = channel::<TaskOutcome<T>>();
        let worker = &mut self.channels[index];
        worker.task_sender = dead_sender;
        worker.result_receiver = dead_receiver;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Double(u32);

    impl Task for Double {
        type Output = u32;
        fn process(&self) -> u32 {
            self.0 * 2
        }
    }

    struct Explode(bool);

    impl Task for Explode {
        type Output = &'static str;
        fn process(&self) -> &'static str {
            if self.0 {
                panic!("boom");
            }
            "fine"
        }
    }

    fn drain<T: Task>(manager: &mut TaskManager<T>, expected: usize) -> Vec<TaskOutcome<T>> {
        let mut outcomes = Vec::new();
        while outcomes.len() < expected {
            manager.process_queued_tasks();
            outcomes.extend(manager.poll_completed());
            thread::yield_now();
        }
        outcomes
    }

    #[test]
    fn backlog_is_drained_across_workers() {
        let mut manager = TaskManager::new(2);
        let scheduled: Vec<bool> = (0..6).map(|n| manager.publish_task(Double(n))).collect();
        assert_eq!(scheduled.iter().filter(|&&s| s).count(), 2);
        assert_eq!(manager.queued_len(), 4);

        let mut results: Vec<u32> = drain(&mut manager, 6)
            .into_iter()
            .map(|outcome| outcome.result.unwrap())
            .collect();
        results.sort();
        assert_eq!(results, vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(manager.tasks_in_flight(), 0);
    }

    #[test]
    fn panicking_task_is_returned_for_a_rerun() {
        let mut manager = TaskManager::new(1);
        manager.publish_task(Explode(true));

        let outcome = drain(&mut manager, 1).pop().unwrap();
        assert_eq!(outcome.result, Err(TaskError::Panicked("boom".to_string())));
        assert!(outcome.task.0);

        // The worker survives the panic
        manager.publish_task(Explode(false));
        let outcome = drain(&mut manager, 1).pop().unwrap();
        assert_eq!(outcome.into_output_or_rerun(), "fine");
    }

    #[test]
    fn zero_workers_keeps_everything_queued() {
        let mut manager = TaskManager::new(0);
        assert!(!manager.publish_task(Double(1)));
        manager.process_queued_tasks();
        assert!(manager.poll_completed().is_empty());
        let queued = manager.drain_queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].process(), 2);
    }

    #[test]
    fn disconnected_worker_hands_the_task_back() {
        let mut manager = TaskManager::new(1);
        manager.disconnect_worker(0);

        assert!(!manager.publish_task(Double(3)));
        assert_eq!(manager.worker_count(), 0);

        let outcome = manager.poll_completed().pop().unwrap();
        assert_eq!(outcome.result, Err(TaskError::Disconnected(0)));
        assert_eq!(outcome.into_output_or_rerun(), 6);

        // Nothing left to deliver to, so later tasks wait in the backlog
        assert!(!manager.publish_task(Double(4)));
        assert_eq!(manager.queued_len(), 1);
        assert_eq!(manager.drain_queued().len(), 1);
    }
}
