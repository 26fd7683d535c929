//! One-shot result channel between the scheduler and a submitter.
//!
//! The scheduler resolves the sink exactly once with the computation's
//! terminal outcome; the submitter may block on the handle. Built on
//! `Mutex` + `Condvar` so the handle works from any thread without
//! pulling the reader into the scheduler's tick.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::entry::Outcome;

struct Shared {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

/// Create a connected sink/handle pair.
pub fn outcome_channel() -> (OutcomeSink, JoinHandle) {
    let shared = Arc::new(Shared {
        outcome: Mutex::new(None),
        ready: Condvar::new(),
    });
    (
        OutcomeSink {
            shared: Arc::clone(&shared),
        },
        JoinHandle { shared },
    )
}

/// Write side; owned by the scheduler, consumed on resolution.
pub struct OutcomeSink {
    shared: Arc<Shared>,
}

impl OutcomeSink {
    /// Resolve the paired handle. Consumes the sink, so a sink resolves
    /// at most once.
    pub fn resolve(self, outcome: Outcome) {
        let mut slot = self.shared.outcome.lock().expect("outcome lock poisoned");
        assert!(slot.is_none(), "outcome sink resolved twice");
        *slot = Some(outcome);
        self.shared.ready.notify_all();
    }
}

/// Read side; resolves once with the computation's terminal outcome.
pub struct JoinHandle {
    shared: Arc<Shared>,
}

impl JoinHandle {
    /// Block until the computation terminates.
    pub fn wait(&self) -> Outcome {
        let mut slot = self.shared.outcome.lock().expect("outcome lock poisoned");
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .expect("outcome lock poisoned");
        }
    }

    /// Block up to `timeout`; `None` if the computation is still live.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let mut slot = self.shared.outcome.lock().expect("outcome lock poisoned");
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            let (guard, result) = self
                .shared
                .ready
                .wait_timeout(slot, timeout)
                .expect("outcome lock poisoned");
            slot = guard;
            if result.timed_out() {
                return slot.as_ref().cloned();
            }
        }
    }

    /// Non-blocking probe.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.shared
            .outcome
            .lock()
            .expect("outcome lock poisoned")
            .clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.try_outcome().is_some()
    }
}

impl std::fmt::Debug for JoinHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
