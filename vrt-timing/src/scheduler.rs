//! One-shot deferred tasks that can be cancelled before they fire.
//!
//! The experiment runs on a single logical thread, so a scheduled task is not
//! a closure but a [`TimerHandle`]. The event loop polls the scheduler and
//! hands every [`Fired`] handle back to whoever armed it, which compares it
//! with the handle it is still waiting for.

use crate::Timer;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A handle whose deadline has passed, with the clock reading at delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub at: u64,
}

pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerHandle;
    /// Returns false if the handle already fired or was never issued.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
    /// Removes and returns the earliest task whose deadline has passed.
    fn poll(&mut self) -> Option<Fired>;
    /// Time until the earliest pending deadline, zero if one is overdue.
    fn next_deadline_in(&self) -> Option<Duration>;
    fn pending(&self) -> usize;
}

#[derive(Debug)]
struct Pending {
    handle: TimerHandle,
    due_at: u64,
}

/// Scheduler that keeps absolute deadlines on a [`Timer`].
#[derive(Debug)]
pub struct DeadlineScheduler<T: Timer> {
    timer: T,
    pending: Vec<Pending>,
    next_id: u64,
}

impl<T: Timer> DeadlineScheduler<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            pending: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: Timer> Scheduler for DeadlineScheduler<T> {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        let due_at = self.timer.now() + delay.as_millis() as u64;
        self.pending.push(Pending { handle, due_at });
        debug!(handle = handle.0, due_at, "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        let removed = self.pending.len() != before;
        if removed {
            debug!(handle = handle.0, "timer cancelled");
        }
        removed
    }

    fn poll(&mut self) -> Option<Fired> {
        let now = self.timer.now();
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due_at <= now)
            .min_by_key(|(_, p)| p.due_at)
            .map(|(i, _)| i)?;
        let task = self.pending.remove(idx);
        Some(Fired {
            handle: task.handle,
            at: now,
        })
    }

    fn next_deadline_in(&self) -> Option<Duration> {
        let now = self.timer.now();
        self.pending
            .iter()
            .map(|p| p.due_at)
            .min()
            .map(|due| Duration::from_millis(due.saturating_sub(now)))
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}
