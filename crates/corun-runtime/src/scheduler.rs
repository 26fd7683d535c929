//! Main scheduler implementation
//!
//! Owns the in-flight computation records, the ready deque, the await
//! table, the promise index, and the sink index. Each call to
//! `run_until_blocked` drives the ready deque to a fixed point.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use log::{debug, trace};

use corun_core::aio::Aio;
use corun_core::computation::{Computation, Promise, Resume, Yieldable};
use corun_core::entry::{Callback, Outcome, Sqe};
use corun_core::error::SubmitError;
use corun_core::handle::{outcome_channel, JoinHandle, OutcomeSink};

use crate::config::SchedulerConfig;
use crate::task::{Advanced, TaskId, TaskRecord};

/// A submission awaiting admission into the current tick.
type Admission = (Box<dyn Computation>, OutcomeSink);

struct Inbox {
    queue: ArrayQueue<Admission>,
    closed: AtomicBool,
}

/// Cloneable submission endpoint; usable from any thread.
#[derive(Clone)]
pub struct SubmitHandle {
    inbox: Arc<Inbox>,
}

impl SubmitHandle {
    /// Submit a computation. The handle resolves once with the
    /// computation's terminal value or error.
    pub fn submit(&self, computation: Box<dyn Computation>) -> Result<JoinHandle, SubmitError> {
        if self.inbox.closed.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }
        let (sink, handle) = outcome_channel();
        self.inbox
            .queue
            .push((computation, sink))
            .map_err(|_| SubmitError::InboxFull)?;
        Ok(handle)
    }
}

/// An entry of the ready deque: a live record, or a freshly admitted
/// record still carrying its external result sink.
enum ReadyItem {
    Task(TaskId),
    Admit(TaskId, OutcomeSink),
}

impl ReadyItem {
    fn id(&self) -> TaskId {
        match self {
            ReadyItem::Task(id) | ReadyItem::Admit(id, _) => *id,
        }
    }
}

/// The cooperative executor.
///
/// Single-threaded: all structures are owned, `step` is the only
/// mutator. The bus is owned too, so one thread drives dispatching,
/// completion draining, and ticking (see `corun-executor`).
pub struct Scheduler<A: Aio> {
    aio: A,
    inbox: Arc<Inbox>,
    /// Runnable items. New work is pushed at the front, work is popped
    /// from the back: strict FIFO.
    ready: VecDeque<ReadyItem>,
    /// `(blocker, blocked)` pairs, insertion order; at most one waiter
    /// per blocker.
    awaiting: Vec<(TaskId, TaskId)>,
    /// Unresolved promises to their backing records.
    promises: HashMap<Promise, TaskId>,
    /// External result sinks for admitted computations.
    sinks: HashMap<TaskId, OutcomeSink>,
    /// Live records.
    tasks: HashMap<TaskId, TaskRecord>,
    next_task: u64,
    next_promise: u64,
}

impl<A: Aio> Scheduler<A> {
    pub fn new(aio: A, config: SchedulerConfig) -> Self {
        config.validate().expect("invalid scheduler configuration");
        Self {
            aio,
            inbox: Arc::new(Inbox {
                queue: ArrayQueue::new(config.inbox_capacity),
                closed: AtomicBool::new(false),
            }),
            ready: VecDeque::new(),
            awaiting: Vec::new(),
            promises: HashMap::new(),
            sinks: HashMap::new(),
            tasks: HashMap::new(),
            next_task: 0,
            next_promise: 0,
        }
    }

    /// A cloneable submission endpoint for other threads.
    pub fn handle(&self) -> SubmitHandle {
        SubmitHandle {
            inbox: Arc::clone(&self.inbox),
        }
    }

    /// Submit a computation from the owning thread.
    pub fn submit(&self, computation: Box<dyn Computation>) -> Result<JoinHandle, SubmitError> {
        self.handle().submit(computation)
    }

    /// The owned bus, for completion draining and flushing.
    pub fn aio_mut(&mut self) -> &mut A {
        &mut self.aio
    }

    /// Occupancy: runnable + awaiting + not-yet-admitted.
    pub fn total(&self) -> usize {
        self.ready.len() + self.awaiting.len() + self.inbox.queue.len()
    }

    /// One tick: admit, revive, then step until the ready deque is
    /// empty.
    pub fn run_until_blocked(&mut self, now: u64) {
        assert!(self.ready.is_empty(), "tick entered with runnable work");

        // Admit pending submissions.
        let backlog = self.inbox.queue.len();
        for _ in 0..backlog {
            let Some((machine, sink)) = self.inbox.queue.pop() else {
                break;
            };
            let id = self.mint_task(TaskRecord::new(machine));
            self.ready.push_front(ReadyItem::Admit(id, sink));
        }

        // Revive waiters whose blocker now has a final value.
        let parked = std::mem::take(&mut self.awaiting);
        let mut still_waiting = Vec::with_capacity(parked.len());
        for (blocker, blocked) in parked {
            let outcome = self
                .tasks
                .get(&blocker)
                .expect("awaited record missing")
                .outcome();
            match outcome {
                Some(outcome) => {
                    trace!("unblocking task {} (blocker {})", blocked.0, blocker.0);
                    let record = self.tasks.get_mut(&blocked).expect("waiter missing");
                    record.next = Some(resume_input(outcome));
                    self.ready.push_front(ReadyItem::Task(blocked));
                    self.reap_if_settled(blocker);
                }
                None => still_waiting.push((blocker, blocked)),
            }
        }
        self.awaiting = still_waiting;

        trace!("tick t={now}: {} runnable", self.ready.len());
        while self.step() {}

        assert!(self.ready.is_empty(), "tick left runnable work behind");
    }

    /// Refuse further submissions and verify quiescence.
    pub fn shutdown(&mut self) {
        self.inbox.closed.store(true, Ordering::Release);
        self.aio.shutdown();
        assert!(self.inbox.queue.is_empty(), "shutdown with queued submissions");
        assert!(self.ready.is_empty(), "shutdown with runnable computations");
        assert!(self.awaiting.is_empty(), "shutdown with blocked computations");
        assert!(self.promises.is_empty(), "shutdown with unresolved promises");
        assert!(self.sinks.is_empty(), "shutdown with unresolved sinks");
        assert!(self.tasks.is_empty(), "shutdown with live records");
        debug!("scheduler shut down");
    }

    /// Pop the back of the ready deque and drive that record one
    /// resumption. Returns false when the deque is empty.
    fn step(&mut self) -> bool {
        let Some(item) = self.ready.pop_back() else {
            return false;
        };
        let id = item.id();
        if let ReadyItem::Admit(_, sink) = item {
            debug_assert!(
                self.tasks[&id].next.is_none(),
                "admitted record already resumed"
            );
            self.sinks.insert(id, sink);
        }

        let record = self.tasks.get_mut(&id).expect("ready record missing");
        debug_assert!(
            !record.final_cell.is_set(),
            "stepping a settled computation"
        );
        let advanced = record.advance();

        match advanced {
            Advanced::Final(outcome) => {
                trace!("task {} terminated", id.0);
                self.settle(id, outcome);
            }

            Advanced::Yield(Yieldable::Await(promise)) => {
                let blocker = self
                    .promises
                    .remove(&promise)
                    .unwrap_or_else(|| panic!("promise {} backs no computation", promise.0));
                let blocker_record = self.tasks.get_mut(&blocker).expect("blocker missing");
                blocker_record.has_promise = false;
                match blocker_record.outcome() {
                    Some(outcome) => {
                        let record = self.tasks.get_mut(&id).expect("record vanished");
                        record.next = Some(resume_input(outcome));
                        self.ready.push_front(ReadyItem::Task(id));
                        self.reap_if_settled(blocker);
                    }
                    None => {
                        debug_assert!(
                            self.awaiting.iter().all(|(b, _)| *b != blocker),
                            "one waiter per blocker"
                        );
                        trace!("task {} awaiting {}", id.0, blocker.0);
                        self.awaiting.push((blocker, id));
                    }
                }
            }

            Advanced::Yield(Yieldable::Child(machine)) => {
                let child = self.mint_task(TaskRecord::new(machine));
                let promise = self.mint_promise(child);
                trace!("task {} spawned child {}", id.0, child.0);
                // The child runs before the parent continues: child
                // first, parent after it, pops from the back.
                self.ready.push_front(ReadyItem::Task(child));
                let record = self.tasks.get_mut(&id).expect("record vanished");
                record.next = Some(Resume::Promise(promise));
                self.ready.push_front(ReadyItem::Task(id));
            }

            Advanced::Yield(Yieldable::Submit(payload)) => {
                let child = self.mint_task(TaskRecord::synthetic());
                let promise = self.mint_promise(child);
                trace!(
                    "task {} submitted {:?} as {}",
                    id.0,
                    payload.kind(),
                    child.0
                );
                let cell = Arc::clone(&self.tasks[&child].final_cell);
                let callback: Callback = Box::new(move |outcome| cell.set(outcome));
                self.aio.dispatch(Sqe::new(payload, callback));
                let record = self.tasks.get_mut(&id).expect("record vanished");
                record.next = Some(Resume::Promise(promise));
                self.ready.push_front(ReadyItem::Task(id));
            }
        }

        true
    }

    /// Publish a record's terminal outcome: set the final cell, resolve
    /// the external sink if one is registered, and drop the record once
    /// nothing references it.
    fn settle(&mut self, id: TaskId, outcome: Outcome) {
        let record = self.tasks.get_mut(&id).expect("settling a missing record");
        record.final_cell.set(outcome.clone());
        if let Some(sink) = self.sinks.remove(&id) {
            debug!(
                "task {} resolved ({})",
                id.0,
                if outcome.is_ok() { "ok" } else { "err" }
            );
            sink.resolve(outcome);
        }
        self.reap_if_settled(id);
    }

    /// Destroy a settled record once no promise, sink, waiter, or ready
    /// entry can still reach it. The promise index is the source of
    /// truth for reachability.
    fn reap_if_settled(&mut self, id: TaskId) {
        let Some(record) = self.tasks.get(&id) else {
            return;
        };
        let reachable = record.has_promise
            || self.sinks.contains_key(&id)
            || self.awaiting.iter().any(|(blocker, _)| *blocker == id);
        if record.final_cell.is_set() && !reachable {
            self.tasks.remove(&id);
        }
    }

    fn mint_task(&mut self, record: TaskRecord) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        self.tasks.insert(id, record);
        id
    }

    fn mint_promise(&mut self, backing: TaskId) -> Promise {
        let promise = Promise(self.next_promise);
        self.next_promise += 1;
        self.promises.insert(promise, backing);
        self.tasks
            .get_mut(&backing)
            .expect("minting a promise for a missing record")
            .has_promise = true;
        promise
    }
}

fn resume_input(outcome: Outcome) -> Resume {
    match outcome {
        Ok(value) => Resume::Value(value),
        Err(error) => Resume::Failure(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corun_core::computation::Step;
    use corun_core::entry::{Cqe, Payload};
    use corun_core::error::BusError;
    use std::sync::Mutex;

    /// Records dispatched entries; the test decides when and how they
    /// complete.
    struct StubAio {
        dispatched: Vec<Sqe>,
        shut_down: bool,
    }

    impl StubAio {
        fn new() -> Self {
            Self {
                dispatched: Vec::new(),
                shut_down: false,
            }
        }
    }

    impl Aio for StubAio {
        fn dispatch(&mut self, sqe: Sqe) {
            self.dispatched.push(sqe);
        }

        fn dequeue(&mut self, _max: usize) -> Vec<Cqe> {
            Vec::new()
        }

        fn flush(&mut self, _now: u64) {}

        fn start(&mut self) {}

        fn shutdown(&mut self) {
            self.shut_down = true;
        }
    }

    /// Run every dispatched thunk and invoke its callback with the
    /// produced value.
    fn run_thunks(scheduler: &mut Scheduler<StubAio>) -> usize {
        let sqes: Vec<Sqe> = scheduler.aio_mut().dispatched.drain(..).collect();
        let count = sqes.len();
        for sqe in sqes {
            let (payload, callback) = sqe.into_parts();
            match payload {
                Payload::Thunk(thunk) => callback(Ok(thunk())),
                Payload::Typed(_) => panic!("stub bus only executes thunks"),
            }
        }
        count
    }

    /// Fail every dispatched entry with the given error.
    fn fail_dispatched(scheduler: &mut Scheduler<StubAio>, error: BusError) {
        let sqes: Vec<Sqe> = scheduler.aio_mut().dispatched.drain(..).collect();
        for sqe in sqes {
            sqe.reject(error.clone());
        }
    }

    /// `p = yield payload; v = yield p; return v`
    struct SubmitAwait {
        payload: Option<Payload>,
        state: u8,
    }

    impl SubmitAwait {
        fn new(payload: Payload) -> Box<Self> {
            Box::new(Self {
                payload: Some(payload),
                state: 0,
            })
        }
    }

    impl Computation for SubmitAwait {
        fn resume(&mut self, input: Resume) -> Step {
            match self.state {
                0 => {
                    assert!(matches!(input, Resume::Start));
                    self.state = 1;
                    Step::Yield(Yieldable::Submit(self.payload.take().expect("payload")))
                }
                1 => {
                    let Resume::Promise(promise) = input else {
                        panic!("expected the minted promise");
                    };
                    self.state = 2;
                    Step::Yield(Yieldable::Await(promise))
                }
                2 => {
                    self.state = 3;
                    match input {
                        Resume::Value(value) => Step::Done(Ok(value)),
                        Resume::Failure(error) => Step::Done(Err(error)),
                        _ => panic!("expected a resolution"),
                    }
                }
                _ => unreachable!("resumed past termination"),
            }
        }
    }

    /// Spawns a nested computation and returns its value.
    struct Nest {
        child: Option<Box<dyn Computation>>,
        state: u8,
    }

    impl Computation for Nest {
        fn resume(&mut self, input: Resume) -> Step {
            match self.state {
                0 => {
                    self.state = 1;
                    Step::Yield(Yieldable::Child(self.child.take().expect("child")))
                }
                1 => {
                    let Resume::Promise(promise) = input else {
                        panic!("expected the child's promise");
                    };
                    self.state = 2;
                    Step::Yield(Yieldable::Await(promise))
                }
                2 => match input {
                    Resume::Value(value) => Step::Done(Ok(value)),
                    Resume::Failure(error) => Step::Done(Err(error)),
                    _ => panic!("expected a resolution"),
                },
                _ => unreachable!(),
            }
        }
    }

    /// Submits a thunk but terminates without awaiting its promise.
    struct FireAndForget {
        state: u8,
    }

    impl Computation for FireAndForget {
        fn resume(&mut self, input: Resume) -> Step {
            match self.state {
                0 => {
                    self.state = 1;
                    Step::Yield(Yieldable::Submit(Payload::thunk(|| ())))
                }
                1 => {
                    assert!(matches!(input, Resume::Promise(_)));
                    self.state = 2;
                    Step::Done(Ok(Arc::new(42u32)))
                }
                _ => unreachable!(),
            }
        }
    }

    /// Logs every resumption it sees; for fairness assertions.
    struct Chatty {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        state: u8,
    }

    impl Chatty {
        fn log(&self, event: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{event}", self.name));
        }
    }

    impl Computation for Chatty {
        fn resume(&mut self, input: Resume) -> Step {
            match self.state {
                0 => {
                    self.log("start");
                    self.state = 1;
                    Step::Yield(Yieldable::Submit(Payload::thunk(|| ())))
                }
                1 => {
                    let Resume::Promise(promise) = input else {
                        panic!("expected the minted promise");
                    };
                    self.log("promise");
                    self.state = 2;
                    Step::Yield(Yieldable::Await(promise))
                }
                2 => {
                    self.log("value");
                    self.state = 3;
                    Step::Done(Ok(Arc::new(())))
                }
                _ => unreachable!(),
            }
        }
    }

    fn scheduler() -> Scheduler<StubAio> {
        Scheduler::new(StubAio::new(), SchedulerConfig::default())
    }

    #[test]
    fn thunk_round_trip() {
        let mut scheduler = scheduler();
        let handle = scheduler
            .submit(SubmitAwait::new(Payload::thunk(|| "foo".to_string())))
            .unwrap();
        assert_eq!(scheduler.total(), 1);

        scheduler.run_until_blocked(0);
        assert_eq!(scheduler.total(), 1, "blocked on the in-flight thunk");
        assert!(!handle.is_resolved());

        assert_eq!(run_thunks(&mut scheduler), 1);
        scheduler.run_until_blocked(1);
        assert_eq!(scheduler.total(), 0);

        let value = handle.wait().unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "foo");
        scheduler.shutdown();
    }

    #[test]
    fn yield_pair_delivers_the_exact_value() {
        let mut scheduler = scheduler();
        let handle = scheduler
            .submit(SubmitAwait::new(Payload::thunk(|| 7u64)))
            .unwrap();
        scheduler.run_until_blocked(0);
        run_thunks(&mut scheduler);
        scheduler.run_until_blocked(1);
        assert_eq!(handle.wait().unwrap().downcast_ref::<u64>(), Some(&7));
        scheduler.shutdown();
    }

    #[test]
    fn unawaited_work_completes_before_the_parent_resolves() {
        let mut scheduler = scheduler();
        let handle = scheduler.submit(Box::new(FireAndForget { state: 0 })).unwrap();

        scheduler.run_until_blocked(0);
        assert!(
            !handle.is_resolved(),
            "terminal value held back while the spawned thunk is in flight"
        );

        run_thunks(&mut scheduler);
        scheduler.run_until_blocked(1);
        assert_eq!(handle.wait().unwrap().downcast_ref::<u32>(), Some(&42));
        scheduler.shutdown();
    }

    #[test]
    fn nested_computation_resolves_through_the_parent() {
        let mut scheduler = scheduler();
        let handle = scheduler
            .submit(Box::new(Nest {
                child: Some(SubmitAwait::new(Payload::thunk(|| "hello, world!".to_string()))),
                state: 0,
            }))
            .unwrap();

        for now in 0..10 {
            scheduler.run_until_blocked(now);
            run_thunks(&mut scheduler);
            if handle.is_resolved() {
                break;
            }
        }

        let value = handle.wait().unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), "hello, world!");
        assert_eq!(scheduler.total(), 0);
        scheduler.shutdown();
    }

    #[test]
    fn ready_deque_is_fifo() {
        let mut scheduler = scheduler();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = scheduler
            .submit(Box::new(Chatty {
                name: "a",
                log: Arc::clone(&log),
                state: 0,
            }))
            .unwrap();
        let b = scheduler
            .submit(Box::new(Chatty {
                name: "b",
                log: Arc::clone(&log),
                state: 0,
            }))
            .unwrap();

        scheduler.run_until_blocked(0);
        run_thunks(&mut scheduler);
        scheduler.run_until_blocked(1);

        assert!(a.is_resolved() && b.is_resolved());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:start",
                "b:start",
                "a:promise",
                "b:promise",
                "a:value",
                "b:value"
            ],
            "the computation admitted first makes progress first"
        );
        scheduler.shutdown();
    }

    #[test]
    fn failed_completion_resumes_as_an_error() {
        let mut scheduler = scheduler();
        let handle = scheduler
            .submit(SubmitAwait::new(Payload::thunk(|| ())))
            .unwrap();
        scheduler.run_until_blocked(0);
        fail_dispatched(&mut scheduler, BusError::Subsystem("boom".into()));
        scheduler.run_until_blocked(1);
        assert_eq!(
            handle.wait().err().unwrap(),
            BusError::Subsystem("boom".into())
        );
        scheduler.shutdown();
    }

    #[test]
    fn inbox_overflow_fails_the_submitter() {
        let mut scheduler = Scheduler::new(
            StubAio::new(),
            SchedulerConfig::default().inbox_capacity(1),
        );
        let first = scheduler.submit(SubmitAwait::new(Payload::thunk(|| 1u8)));
        assert!(first.is_ok());
        let second = scheduler.submit(SubmitAwait::new(Payload::thunk(|| 2u8)));
        assert_eq!(second.unwrap_err(), SubmitError::InboxFull);

        scheduler.run_until_blocked(0);
        run_thunks(&mut scheduler);
        scheduler.run_until_blocked(1);
        assert_eq!(first.unwrap().wait().unwrap().downcast_ref::<u8>(), Some(&1));
        scheduler.shutdown();
    }

    #[test]
    fn shutdown_refuses_submissions() {
        let mut scheduler = scheduler();
        scheduler.shutdown();
        let result = scheduler.submit(SubmitAwait::new(Payload::thunk(|| ())));
        assert_eq!(result.unwrap_err(), SubmitError::ShutDown);
    }

    #[test]
    #[should_panic(expected = "backs no computation")]
    fn awaiting_a_foreign_promise_is_a_protocol_violation() {
        struct AwaitBogus;

        impl Computation for AwaitBogus {
            fn resume(&mut self, _input: Resume) -> Step {
                Step::Yield(Yieldable::Await(Promise(9999)))
            }
        }

        let mut scheduler = scheduler();
        let _handle = scheduler.submit(Box::new(AwaitBogus)).unwrap();
        scheduler.run_until_blocked(0);
    }
}
