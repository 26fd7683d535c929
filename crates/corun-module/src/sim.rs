//! `SimAio` — deterministic simulation variant of the AIO bus.
//!
//! Same contract as `AioSystem`, but built for reproducible tests:
//! nothing happens until `flush`, and every random choice flows through
//! one seeded PRNG. `dispatch` inserts the entry at a random position
//! in a pending list; `flush` partitions the pending entries by
//! destination kind, samples a fault per entry with probability `p`,
//! and processes the survivors synchronously in one batch per kind.
//!
//! A pre-processing fault replaces the entry's completion with
//! *simulated failure before processing*, emitted in the entry's
//! original position; the entry is not passed to `process`. A
//! post-processing fault replaces the produced completion with
//! *simulated failure after processing*.
//!
//! Given a seed and a sequence of `dispatch`/`flush` calls, the CQE
//! stream is a pure function of the inputs.

use std::sync::Arc;

use log::debug;

use corun_core::aio::Aio;
use corun_core::completion::CompletionSink;
use corun_core::entry::{Cqe, Kind, Payload, Sqe, Value};
use corun_core::error::BusError;
use corun_core::subsystem::Subsystem;

use crate::queue::SimCompletionQueue;

/// Where an injected fault lands relative to `process`.
enum Fault {
    Before,
    After,
}

/// Per-entry plan for one kind batch, in original entry order.
enum Lane {
    /// Pre-faulted; the entry is kept for its callback.
    Faulted(Sqe),
    /// Processed; `post` marks a post-processing fault substitution.
    Processed { post: bool },
}

pub struct SimAio {
    rng: fastrand::Rng,
    fault_probability: f64,
    subsystems: Vec<Box<dyn Subsystem>>,
    pending: Vec<Sqe>,
    completed: Arc<SimCompletionQueue>,
}

impl SimAio {
    /// A simulation bus drawing all randomness from `seed`. Each
    /// dispatched entry faults with probability `fault_probability`,
    /// landing uniformly before or after processing.
    pub fn new(seed: u64, fault_probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&fault_probability),
            "fault probability must be within [0, 1]"
        );
        Self {
            rng: fastrand::Rng::with_seed(seed),
            fault_probability,
            subsystems: Vec::new(),
            pending: Vec::new(),
            completed: Arc::new(SimCompletionQueue::new()),
        }
    }

    /// Register a subsystem under its kind.
    pub fn attach(&mut self, subsystem: Box<dyn Subsystem>) {
        assert!(
            self.subsystems.iter().all(|s| s.kind() != subsystem.kind()),
            "subsystem is already registered"
        );
        self.subsystems.push(subsystem);
    }

    /// Run one payload through its subsystem's `process` synchronously,
    /// bypassing dispatch, faults, and the completion queue. Panics if
    /// the subsystem completed it with an error.
    pub fn check(&mut self, payload: Payload) -> Value {
        let kind = payload.kind();
        let subsystem = find_subsystem(&mut self.subsystems, kind);
        let sqe = Sqe::new(payload, Box::new(|_| {}));
        let mut cqes = subsystem.process(vec![sqe]);
        assert_eq!(cqes.len(), 1, "process must return one completion per entry");
        cqes.remove(0)
            .into_result()
            .expect("check payload completed with an error")
    }

    fn sample_fault(&mut self) -> Option<Fault> {
        if self.rng.f64() < self.fault_probability {
            Some(match self.rng.u8(0..=1) {
                0 => Fault::Before,
                _ => Fault::After,
            })
        } else {
            None
        }
    }
}

impl Aio for SimAio {
    /// Buffer the entry at a random position; nothing is dispatched
    /// until `flush`.
    fn dispatch(&mut self, sqe: Sqe) {
        let at = self.rng.usize(0..=self.pending.len());
        self.pending.insert(at, sqe);
    }

    fn dequeue(&mut self, max: usize) -> Vec<Cqe> {
        let mut cqes = Vec::new();
        while cqes.len() < max {
            match self.completed.pop() {
                Some(cqe) => cqes.push(cqe),
                None => break,
            }
        }
        cqes
    }

    fn flush(&mut self, now: u64) {
        // Partition by destination kind, first-occurrence order.
        let mut batches: Vec<(Kind, Vec<Sqe>)> = Vec::new();
        for sqe in self.pending.drain(..) {
            let kind = sqe.kind();
            match batches.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, batch)) => batch.push(sqe),
                None => batches.push((kind, vec![sqe])),
            }
        }

        for (kind, sqes) in batches {
            assert!(
                self.subsystems.iter().any(|s| s.kind() == kind),
                "invalid aio submission: unknown kind {kind:?}"
            );
            debug!("sim flush t={now}: {} entries for {kind:?}", sqes.len());

            let mut lanes = Vec::with_capacity(sqes.len());
            let mut to_process = Vec::new();
            for sqe in sqes {
                match self.sample_fault() {
                    Some(Fault::Before) => lanes.push(Lane::Faulted(sqe)),
                    Some(Fault::After) => {
                        lanes.push(Lane::Processed { post: true });
                        to_process.push(sqe);
                    }
                    None => {
                        lanes.push(Lane::Processed { post: false });
                        to_process.push(sqe);
                    }
                }
            }

            let expected = to_process.len();
            let produced = if to_process.is_empty() {
                Vec::new()
            } else {
                find_subsystem(&mut self.subsystems, kind).process(to_process)
            };
            assert_eq!(
                produced.len(),
                expected,
                "process must return one completion per entry"
            );

            let mut produced = produced.into_iter();
            for lane in lanes {
                let cqe = match lane {
                    Lane::Faulted(sqe) => {
                        let (_payload, callback) = sqe.into_parts();
                        Cqe::new(Err(BusError::FailedBeforeProcessing), callback)
                    }
                    Lane::Processed { post } => {
                        let mut cqe = produced.next().expect("completion count verified");
                        if post {
                            cqe.override_result(Err(BusError::FailedAfterProcessing));
                        }
                        cqe
                    }
                };
                self.completed.push(cqe);
            }
        }
    }

    fn start(&mut self) {
        let sink: Arc<dyn CompletionSink> = Arc::clone(&self.completed) as Arc<dyn CompletionSink>;
        for subsystem in &mut self.subsystems {
            subsystem.start(Arc::clone(&sink));
        }
    }

    fn shutdown(&mut self) {
        for subsystem in &mut self.subsystems {
            subsystem.shutdown();
        }
    }
}

fn find_subsystem<'a>(
    subsystems: &'a mut [Box<dyn Subsystem>],
    kind: Kind,
) -> &'a mut Box<dyn Subsystem> {
    subsystems
        .iter_mut()
        .find(|s| s.kind() == kind)
        .unwrap_or_else(|| panic!("invalid aio submission: unknown kind {kind:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::{EchoCompletion, EchoSubmission, EchoSubsystem};
    use crate::function::FunctionSubsystem;
    use corun_core::entry::Outcome;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts `process` calls; completes every entry with `()`.
    struct ProbeSubsystem {
        calls: Arc<AtomicUsize>,
    }

    #[derive(Debug)]
    struct ProbeSubmission;

    impl corun_core::entry::Submission for ProbeSubmission {
        fn kind(&self) -> Kind {
            "probe"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    impl Subsystem for ProbeSubsystem {
        fn kind(&self) -> Kind {
            "probe"
        }

        fn capacity(&self) -> usize {
            100
        }

        fn start(&mut self, _sink: Arc<dyn CompletionSink>) {}

        fn shutdown(&mut self) {}

        fn enqueue(&mut self, _sqe: Sqe) -> Result<(), Sqe> {
            unreachable!("the simulation bus processes synchronously")
        }

        fn flush(&mut self, _now: u64) {}

        fn process(&mut self, sqes: Vec<Sqe>) -> Vec<Cqe> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sqes.into_iter()
                .map(|sqe| {
                    let (_payload, callback) = sqe.into_parts();
                    Cqe::new(Ok(Arc::new(()) as Value), callback)
                })
                .collect()
        }
    }

    /// Dispatch `n` probe entries at fault probability `p` and flush
    /// once; returns the completion errors (`None` = success) and the
    /// number of `process` calls.
    fn run_probe(seed: u64, p: f64, n: usize) -> (Vec<Option<BusError>>, usize) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut sim = SimAio::new(seed, p);
        sim.attach(Box::new(ProbeSubsystem {
            calls: Arc::clone(&calls),
        }));
        for _ in 0..n {
            sim.dispatch(Sqe::new(
                Payload::typed(ProbeSubmission),
                Box::new(|_: Outcome| {}),
            ));
        }
        sim.flush(0);
        let results = sim
            .dequeue(n + 1)
            .into_iter()
            .map(|cqe| cqe.into_result().err())
            .collect();
        (results, calls.load(Ordering::SeqCst))
    }

    #[test]
    fn zero_probability_injects_no_faults() {
        let (results, calls) = run_probe(12, 0.0, 8);
        assert_eq!(results.len(), 8, "one completion per submission");
        assert!(results.iter().all(|r| r.is_none()));
        assert_eq!(calls, 1, "one batch per kind per flush");
    }

    #[test]
    fn fixed_seed_reproduces_the_completion_stream() {
        let (first, _) = run_probe(42, 0.5, 16);
        let (second, _) = run_probe(42, 0.5, 16);
        assert_eq!(first, second);
    }

    #[test]
    fn full_probability_can_fault_everything_before_processing() {
        let seed = (0..1024)
            .find(|&seed| {
                let (results, _) = run_probe(seed, 1.0, 2);
                results
                    .iter()
                    .all(|r| *r == Some(BusError::FailedBeforeProcessing))
            })
            .expect("some seed faults every entry before processing");
        let (results, calls) = run_probe(seed, 1.0, 2);
        assert!(results
            .iter()
            .all(|r| *r == Some(BusError::FailedBeforeProcessing)));
        assert_eq!(calls, 0, "pre-faulted entries never reach process");
    }

    #[test]
    fn post_faults_replace_produced_completions() {
        let seed = (0..1024)
            .find(|&seed| {
                let (results, _) = run_probe(seed, 1.0, 2);
                results
                    .iter()
                    .any(|r| *r == Some(BusError::FailedAfterProcessing))
            })
            .expect("some seed faults an entry after processing");
        let (results, calls) = run_probe(seed, 1.0, 2);
        assert!(results.iter().all(|r| r.is_some()), "p=1 faults every entry");
        assert_eq!(calls, 1, "the surviving entries were processed");
    }

    #[test]
    fn shuffled_dispatch_preserves_completion_parity() {
        let mut sim = SimAio::new(7, 0.0);
        sim.attach(Box::new(EchoSubsystem::new(100, 1)));
        sim.attach(Box::new(FunctionSubsystem::new(100, 1)));

        let delivered = Arc::new(AtomicUsize::new(0));
        for i in 0..5 {
            let delivered = Arc::clone(&delivered);
            sim.dispatch(Sqe::new(
                Payload::typed(EchoSubmission::new(format!("e{i}"))),
                Box::new(move |outcome: Outcome| {
                    outcome.unwrap();
                    delivered.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        }
        for _ in 0..3 {
            let delivered = Arc::clone(&delivered);
            sim.dispatch(Sqe::new(
                Payload::thunk(|| 1u8),
                Box::new(move |outcome: Outcome| {
                    outcome.unwrap();
                    delivered.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        }

        sim.flush(0);
        let cqes = sim.dequeue(100);
        assert_eq!(cqes.len(), 8, "exactly one completion per submission");
        for cqe in cqes {
            cqe.complete();
        }
        assert_eq!(delivered.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn check_runs_one_payload_synchronously() {
        let mut sim = SimAio::new(3, 1.0);
        sim.attach(Box::new(EchoSubsystem::new(100, 1)));
        let value = sim.check(Payload::typed(EchoSubmission::new("ping")));
        assert_eq!(
            value.downcast_ref::<EchoCompletion>().unwrap().data,
            "ping"
        );
    }
}
