//! Cooperative task queues with a virtual clock
//!
//! Microtasks run in FIFO order and are drained completely after every task.
//! Timers run in order of due time, ties broken by scheduling order. Time only
//! advances when the loop picks up a timer.

use crate::context::ExecutionContext;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A unit of deferred work
pub type Task = Box<dyn FnOnce(&mut ExecutionContext) -> Result<(), Value>>;

/// Handle returned by `set_timeout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Microtask and timer queues of one execution context
#[derive(Default)]
pub struct EventLoop {
    microtasks: VecDeque<Task>,
    timers: BTreeMap<(u64, u64), (TimerId, Task)>,
    timer_keys: HashMap<TimerId, (u64, u64)>,
    now_ms: u64,
    next_seq: u64,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn queue_microtask(&mut self, task: Task) {
        self.microtasks.push_back(task);
    }

    pub fn pop_microtask(&mut self) -> Option<Task> {
        self.microtasks.pop_front()
    }

    /// Schedule a task to run `delay_ms` after the current virtual time
    pub fn schedule(&mut self, delay_ms: u64, task: Task) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        let key = (self.now_ms.saturating_add(delay_ms), seq);
        self.timers.insert(key, (id, task));
        self.timer_keys.insert(id, key);
        id
    }

    /// Cancel a pending timer; returns false if it already ran or never existed
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timer_keys.remove(&id) {
            Some(key) => self.timers.remove(&key).is_some(),
            None => false,
        }
    }

    /// Due time of the earliest pending timer
    pub fn next_due(&self) -> Option<u64> {
        self.timers.keys().next().map(|(due, _)| *due)
    }

    /// Take the earliest timer due at or before `limit_ms`, advancing the clock to it
    pub fn pop_timer_until(&mut self, limit_ms: u64) -> Option<Task> {
        let key = *self.timers.keys().next()?;
        if key.0 > limit_ms {
            return None;
        }
        let (id, task) = self.timers.remove(&key)?;
        self.timer_keys.remove(&id);
        self.now_ms = self.now_ms.max(key.0);
        Some(task)
    }

    /// Move the clock forward without running anything
    pub fn advance_to(&mut self, ms: u64) {
        self.now_ms = self.now_ms.max(ms);
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.timers.is_empty()
    }

    /// Drop every queued task
    pub fn clear(&mut self) {
        self.microtasks.clear();
        self.timers.clear();
        self.timer_keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn test_timers_ordered_by_due_then_schedule() {
        let mut lp = EventLoop::new();
        let late = lp.schedule(10, noop());
        let early = lp.schedule(0, noop());
        let tie = lp.schedule(0, noop());

        assert_eq!(lp.next_due(), Some(0));
        assert!(lp.cancel(tie));
        assert!(!lp.cancel(tie));
        assert!(lp.pop_timer_until(0).is_some());
        assert!(lp.pop_timer_until(5).is_none());
        assert!(lp.pop_timer_until(u64::MAX).is_some());
        assert_eq!(lp.now_ms(), 10);
        assert!(lp.is_idle());
        let _ = (late, early);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut lp = EventLoop::new();
        lp.queue_microtask(noop());
        lp.schedule(5, noop());
        lp.clear();
        assert!(lp.is_idle());
    }
}
