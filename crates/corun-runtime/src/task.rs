//! Internal computation records.
//!
//! A `TaskRecord` wraps a user state machine with the bookkeeping the
//! scheduler needs: the value to inject on the next resumption, the
//! terminal outcome once the machine is done, the shared final-value
//! cell completion callbacks write into, and the pending-promise stack.
//!
//! The pending-promise stack exists because a computation yields the
//! same promise twice — once when it receives it after requesting work,
//! once to await it. Promises handed to the machine are recorded; any
//! still pending when the machine terminates are returned to the
//! scheduler as awaits, in LIFO order, before the terminal outcome.
//! A computation therefore never completes ahead of work it spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use corun_core::computation::{Computation, Promise, Resume, Step, Yieldable};
use corun_core::entry::Outcome;

/// Scheduler-internal identity of a computation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TaskId(pub(crate) u64);

/// One-shot cell holding a record's final value.
///
/// Set at most once — by the scheduler when a machine terminates, or by
/// a completion callback for synthetic I/O records. Read by the
/// scheduler's unblock pass. Shared through an `Arc` because the cell
/// travels inside the SQE callback across the bus.
pub(crate) struct FinalCell {
    set: AtomicBool,
    slot: Mutex<Option<Outcome>>,
}

impl FinalCell {
    fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn set(&self, outcome: Outcome) {
        let mut slot = self.slot.lock().expect("final cell poisoned");
        assert!(slot.is_none(), "final value set twice");
        *slot = Some(outcome);
        self.set.store(true, Ordering::Release);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    pub(crate) fn get(&self) -> Option<Outcome> {
        if !self.is_set() {
            return None;
        }
        self.slot.lock().expect("final cell poisoned").clone()
    }
}

/// What one advance of a record produced.
pub(crate) enum Advanced {
    Yield(Yieldable),
    Final(Outcome),
}

pub(crate) struct TaskRecord {
    /// The user state machine; `None` for synthetic records standing in
    /// for external I/O.
    machine: Option<Box<dyn Computation>>,
    /// Value to inject on the next resumption; `None` means the machine
    /// has not started yet.
    pub(crate) next: Option<Resume>,
    /// The machine's terminal outcome, held back until the pending
    /// promises are drained.
    done: Option<Outcome>,
    /// Published final value; what awaiters and the unblock pass see.
    pub(crate) final_cell: Arc<FinalCell>,
    /// Promises handed to the machine and not yet yielded back.
    pend: Vec<Promise>,
    /// A minted promise still references this record.
    pub(crate) has_promise: bool,
}

impl TaskRecord {
    pub(crate) fn new(machine: Box<dyn Computation>) -> Self {
        Self {
            machine: Some(machine),
            next: None,
            done: None,
            final_cell: Arc::new(FinalCell::new()),
            pend: Vec::new(),
            has_promise: false,
        }
    }

    /// Record standing in for external work; never stepped, its final
    /// value arrives through the completion callback.
    pub(crate) fn synthetic() -> Self {
        Self {
            machine: None,
            next: None,
            done: None,
            final_cell: Arc::new(FinalCell::new()),
            pend: Vec::new(),
            has_promise: false,
        }
    }

    pub(crate) fn outcome(&self) -> Option<Outcome> {
        self.final_cell.get()
    }

    /// Resume the machine with the stored `next` value and classify the
    /// result.
    ///
    /// Once the machine has terminated, remaining pending promises are
    /// returned as awaits (LIFO) before the terminal outcome.
    pub(crate) fn advance(&mut self) -> Advanced {
        if self.done.is_some() {
            if let Some(p) = self.pend.pop() {
                return Advanced::Yield(Yieldable::Await(p));
            }
            return Advanced::Final(self.done.clone().expect("checked above"));
        }

        let input = match self.next.take() {
            None => Resume::Start,
            Some(Resume::Promise(p)) => {
                self.pend.push(p);
                Resume::Promise(p)
            }
            Some(other) => other,
        };

        let machine = self
            .machine
            .as_mut()
            .expect("synthetic record cannot be resumed");
        match machine.resume(input) {
            Step::Yield(Yieldable::Await(p)) => {
                // The machine yielded a promise it was handed earlier;
                // that promise is no longer pending.
                if let Some(at) = self.pend.iter().position(|q| *q == p) {
                    self.pend.remove(at);
                }
                Advanced::Yield(Yieldable::Await(p))
            }
            Step::Yield(other) => Advanced::Yield(other),
            Step::Done(outcome) => {
                self.done = Some(outcome);
                if let Some(p) = self.pend.pop() {
                    return Advanced::Yield(Yieldable::Await(p));
                }
                Advanced::Final(self.done.clone().expect("just set"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corun_core::entry::Payload;
    use std::sync::Arc;

    /// Yields a thunk, then terminates without awaiting the promise.
    struct FireAndForget {
        yielded: bool,
    }

    impl Computation for FireAndForget {
        fn resume(&mut self, input: Resume) -> Step {
            if !self.yielded {
                assert!(matches!(input, Resume::Start));
                self.yielded = true;
                return Step::Yield(Yieldable::Submit(Payload::thunk(|| "side effect")));
            }
            assert!(matches!(input, Resume::Promise(_)));
            Step::Done(Ok(Arc::new(42u32)))
        }
    }

    #[test]
    fn pending_promises_drain_before_the_terminal_outcome() {
        let mut record = TaskRecord::new(Box::new(FireAndForget { yielded: false }));

        match record.advance() {
            Advanced::Yield(Yieldable::Submit(payload)) => {
                assert_eq!(payload.kind(), "function");
            }
            _ => panic!("expected a submission"),
        }

        // The scheduler hands the promise back; the machine finishes
        // without awaiting it.
        record.next = Some(Resume::Promise(Promise(1)));
        match record.advance() {
            Advanced::Yield(Yieldable::Await(p)) => assert_eq!(p, Promise(1)),
            _ => panic!("expected the unawaited promise to surface"),
        }

        // Only after the implicit await resolves does the terminal
        // value appear.
        record.next = Some(Resume::Value(Arc::new(())));
        match record.advance() {
            Advanced::Final(outcome) => {
                assert_eq!(outcome.unwrap().downcast_ref::<u32>(), Some(&42));
            }
            _ => panic!("expected the terminal outcome"),
        }
    }

    #[test]
    fn final_cell_sets_once() {
        let cell = FinalCell::new();
        assert!(!cell.is_set());
        assert!(cell.get().is_none());
        cell.set(Ok(Arc::new(1u8)));
        assert!(cell.is_set());
        assert!(cell.get().is_some());
    }

    #[test]
    #[should_panic(expected = "final value set twice")]
    fn final_cell_rejects_second_set() {
        let cell = FinalCell::new();
        cell.set(Ok(Arc::new(1u8)));
        cell.set(Ok(Arc::new(2u8)));
    }
}
