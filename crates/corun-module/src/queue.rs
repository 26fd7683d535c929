//! Completion queue implementations.
//!
//! `SharedCompletionQueue` backs the real bus: a bounded lock-free
//! queue subsystem workers push into and the driver drains.
//! `SimCompletionQueue` backs the simulation bus: a mutex-guarded list
//! drained in insertion order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam_queue::ArrayQueue;

use corun_core::completion::CompletionSink;
use corun_core::entry::Cqe;

/// Bounded multi-producer completion queue of the real bus.
pub struct SharedCompletionQueue {
    queue: ArrayQueue<Cqe>,
    closed: AtomicBool,
}

impl SharedCompletionQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "size must be positive");
        Self {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pop(&self) -> Option<Cqe> {
        self.queue.pop()
    }

    /// Refuse further completions; entries already queued stay
    /// poppable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl CompletionSink for SharedCompletionQueue {
    fn complete(&self, cqe: Cqe) -> Result<(), Cqe> {
        if self.is_closed() {
            return Err(cqe);
        }
        self.queue.push(cqe)
    }
}

/// Single-threaded completion list of the simulation bus.
pub struct SimCompletionQueue {
    entries: Mutex<VecDeque<Cqe>>,
}

impl SimCompletionQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, cqe: Cqe) {
        self.entries
            .lock()
            .expect("completion list poisoned")
            .push_back(cqe);
    }

    pub fn pop(&self) -> Option<Cqe> {
        self.entries
            .lock()
            .expect("completion list poisoned")
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("completion list poisoned").len()
    }
}

impl Default for SimCompletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSink for SimCompletionQueue {
    fn complete(&self, cqe: Cqe) -> Result<(), Cqe> {
        self.push(cqe);
        Ok(())
    }
}
