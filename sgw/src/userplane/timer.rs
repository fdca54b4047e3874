//! timer - flush timers and the event scheduler they are registered with
//!
//! Time is a [`Duration`] since an arbitrary epoch chosen by whoever drives the engine, so the same code
//! runs against the wall clock or against simulated time.

use crate::MessageClass;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::net::IpAddr;
use std::time::Duration;

/// Asks for a queue to be flushed.  Ignored on expiry if the queue has been flushed since it was armed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlushTimer {
    pub destination: IpAddr,
    pub message_class: MessageClass,
    pub generation: u64,
}

pub trait Scheduler {
    /// Hand `timer` back to the engine once time reaches `deadline`.
    fn schedule(&mut self, deadline: Duration, timer: FlushTimer);
}

/// Timers ordered by deadline, then by the order they were scheduled in.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Duration, u64, FlushTimer)>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Remove and return the earliest timer whose deadline is not after `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<FlushTimer> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse((_, _, timer))| timer)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, deadline: Duration, timer: FlushTimer) {
        self.heap.push(Reverse((deadline, self.next_seq, timer)));
        self.next_seq += 1;
    }
}
