//! Time management utilities
//!
//! The simulation itself advances on externally supplied fixed steps; this
//! module provides the deferred-task scheduler used for lifetime expiry and
//! similar one-shot callbacks.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a scheduled one-shot task.
    pub struct TaskHandle;
}

struct Task {
    remaining: f32,
    tag: u64,
}

/// Scheduler for deferred one-shot tasks, driven by simulation time.
///
/// Tasks carry an opaque `tag` chosen by the caller; `tick` returns the tags
/// of all tasks that fired so the caller can dispatch them. There is no
/// callback storage, which keeps the scheduler free of borrow entanglement
/// with the objects it serves.
#[derive(Default)]
pub struct TaskScheduler {
    tasks: SlotMap<TaskHandle, Task>,
}

impl TaskScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a task to fire after `delay` seconds.
    pub fn schedule(&mut self, delay: f32, tag: u64) -> TaskHandle {
        self.tasks.insert(Task {
            remaining: delay,
            tag,
        })
    }

    /// Change the remaining delay of an existing task.
    ///
    /// Unknown handles are logged and ignored.
    pub fn reschedule(&mut self, handle: TaskHandle, delay: f32) {
        match self.tasks.get_mut(handle) {
            Some(task) => task.remaining = delay,
            None => log::warn!("reschedule of unknown task {handle:?}"),
        }
    }

    /// Cancel a pending task. Unknown handles are logged and ignored.
    pub fn cancel(&mut self, handle: TaskHandle) {
        if self.tasks.remove(handle).is_none() {
            log::warn!("cancel of unknown task {handle:?}");
        }
    }

    /// Remaining delay of a pending task, or `None` if it is unknown.
    pub fn remaining(&self, handle: TaskHandle) -> Option<f32> {
        self.tasks.get(handle).map(|t| t.remaining)
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are pending
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance scheduler time by `dt` seconds and collect fired task tags.
    pub fn tick(&mut self, dt: f32) -> Vec<u64> {
        let fired: Vec<TaskHandle> = self
            .tasks
            .iter_mut()
            .filter_map(|(handle, task)| {
                task.remaining -= dt;
                (task.remaining <= 0.0).then_some(handle)
            })
            .collect();

        fired
            .into_iter()
            .filter_map(|handle| self.tasks.remove(handle).map(|t| t.tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_delay() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(1.0, 7);

        assert!(scheduler.tick(0.5).is_empty());
        assert_eq!(scheduler.tick(0.6), vec![7]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn reschedule_extends_delay() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.schedule(1.0, 1);
        scheduler.reschedule(handle, 3.0);

        assert!(scheduler.tick(2.0).is_empty());
        assert_eq!(scheduler.remaining(handle), Some(1.0));
        assert_eq!(scheduler.tick(1.5), vec![1]);
    }

    #[test]
    fn cancel_prevents_firing() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.schedule(0.5, 3);
        scheduler.cancel(handle);
        assert!(scheduler.tick(1.0).is_empty());
    }
}
