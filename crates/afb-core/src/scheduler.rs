//! Scheduler
//!
//! Virtual event loop: a timer queue ordered by deadline and a microtask
//! queue. Tasks are plain data; the owner decides what running one means.

use std::collections::{BTreeMap, HashMap, VecDeque};

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Timer and microtask queues
#[derive(Debug)]
pub struct Scheduler<T> {
    /// Keyed by (deadline, sequence) so equal deadlines run in FIFO order
    timers: BTreeMap<(u64, u64), T>,
    deadlines: HashMap<TimerId, u64>,
    microtasks: VecDeque<T>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            timers: BTreeMap::new(),
            deadlines: HashMap::new(),
            microtasks: VecDeque::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run `delay_ms` after `now`
    pub fn set_timeout(&mut self, now: u64, delay_ms: u64, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = now.saturating_add(delay_ms);
        let id = TimerId(seq);
        self.timers.insert((deadline, seq), task);
        self.deadlines.insert(id, deadline);
        tracing::trace!(timer = seq, deadline, "timer scheduled");
        id
    }

    /// Cancel a timer, returning its task if it had not run yet
    pub fn clear_timer(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id)?;
        self.timers.remove(&(deadline, id.0))
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn deadline_of(&self, id: TimerId) -> Option<u64> {
        self.deadlines.get(&id).copied()
    }

    pub fn queue_microtask(&mut self, task: T) {
        self.microtasks.push_back(task);
    }

    pub fn pop_microtask(&mut self) -> Option<T> {
        self.microtasks.pop_front()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Remove and return the earliest timer due at `now`, with its deadline
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, T)> {
        let &(deadline, seq) = self.timers.keys().next()?;
        if deadline > now {
            return None;
        }
        let task = self.timers.remove(&(deadline, seq))?;
        self.deadlines.remove(&TimerId(seq));
        tracing::trace!(timer = seq, deadline, "timer fired");
        Some((deadline, task))
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.timers.is_empty() || !self.microtasks.is_empty()
    }

    /// Drop every timer and microtask
    pub fn clear(&mut self) {
        self.timers.clear();
        self.deadlines.clear();
        self.microtasks.clear();
    }
}
