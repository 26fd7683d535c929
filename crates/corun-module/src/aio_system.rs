//! `AioSystem` — the real AIO bus.
//!
//! Routes submission entries to the subsystem registered under the
//! payload's kind and aggregates worker completions into one bounded
//! shared queue. Overflowing a subsystem's submission queue synthesizes
//! a *submission queue full* error completion, delivered inline on the
//! dispatching caller.

use std::sync::Arc;

use log::{debug, warn};

use corun_core::aio::Aio;
use corun_core::completion::CompletionSink;
use corun_core::entry::{Cqe, Sqe};
use corun_core::error::BusError;
use corun_core::subsystem::Subsystem;

use crate::queue::SharedCompletionQueue;

pub struct AioSystem {
    cq: Arc<SharedCompletionQueue>,
    /// Registration order; also the flush order.
    subsystems: Vec<Box<dyn Subsystem>>,
    started: bool,
}

impl AioSystem {
    pub fn new(capacity: usize) -> Self {
        Self {
            cq: Arc::new(SharedCompletionQueue::new(capacity)),
            subsystems: Vec::new(),
            started: false,
        }
    }

    /// Register a subsystem under its kind. Pre-start only; a duplicate
    /// kind or a submission queue larger than the shared completion
    /// queue is a configuration bug.
    pub fn attach(&mut self, subsystem: Box<dyn Subsystem>) {
        assert!(!self.started, "attach subsystems before start");
        assert!(
            subsystem.capacity() <= self.cq.capacity(),
            "subsystem capacity must not exceed the aio capacity"
        );
        assert!(
            self.subsystems.iter().all(|s| s.kind() != subsystem.kind()),
            "subsystem is already registered"
        );
        debug!("attached subsystem {:?}", subsystem.kind());
        self.subsystems.push(subsystem);
    }

    pub fn capacity(&self) -> usize {
        self.cq.capacity()
    }
}

impl Aio for AioSystem {
    fn dispatch(&mut self, sqe: Sqe) {
        let kind = sqe.kind();
        let subsystem = self
            .subsystems
            .iter_mut()
            .find(|s| s.kind() == kind)
            .unwrap_or_else(|| panic!("invalid aio submission: unknown kind {kind:?}"));
        if let Err(rejected) = subsystem.enqueue(sqe) {
            debug!("subsystem {kind:?} submission queue full");
            rejected.reject(BusError::SubmissionQueueFull);
        }
    }

    fn dequeue(&mut self, max: usize) -> Vec<Cqe> {
        let mut cqes = Vec::new();
        while cqes.len() < max {
            match self.cq.pop() {
                Some(cqe) => cqes.push(cqe),
                None => break,
            }
        }
        cqes
    }

    fn flush(&mut self, now: u64) {
        for subsystem in &mut self.subsystems {
            subsystem.flush(now);
        }
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let sink: Arc<dyn CompletionSink> = Arc::clone(&self.cq) as Arc<dyn CompletionSink>;
        for subsystem in &mut self.subsystems {
            subsystem.start(Arc::clone(&sink));
        }
        debug!("aio started with {} subsystems", self.subsystems.len());
    }

    fn shutdown(&mut self) {
        for subsystem in &mut self.subsystems {
            subsystem.shutdown();
        }
        self.cq.close();
        let mut undelivered = 0usize;
        while self.cq.pop().is_some() {
            undelivered += 1;
        }
        if undelivered > 0 {
            warn!("aio shut down with {undelivered} undelivered completions");
        }
        self.started = false;
    }
}
