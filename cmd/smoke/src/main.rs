//! corun End-to-End Smoke Test
//!
//! Tests the full stack:
//!   Part A — Bus round trips: echo and thunk submissions
//!   Part B — Nested computations and implicit joins
//!   Part C — Backpressure: submission queue overflow
//!   Part D — Deterministic simulation: reproducibility and faults
//!
//! Run: ./target/release/smoke

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use corun::ops::SubmitAndAwait;
use corun::{
    Aio, AioSystem, BusError, Computation, EchoCompletion, EchoSubmission, EchoSubsystem,
    FunctionSubsystem, Outcome, Payload, Resume, Runtime, RuntimeConfig, SimAio, Sqe, Step,
    Yieldable,
};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
        }
    }

    fn section(&self, name: &str) {
        println!("\n{LINE}");
        println!("  {name}");
        println!("{LINE}");
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok {
            self.pass(name);
        } else {
            self.fail(name, reason);
        }
    }

    fn summary(&self) {
        println!("\n{LINE}");
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{LINE}");
    }
}

fn echo_runtime() -> Runtime<AioSystem> {
    let mut aio = AioSystem::new(100);
    aio.attach(Box::new(EchoSubsystem::new(100, 1)));
    aio.attach(Box::new(FunctionSubsystem::new(100, 1)));
    let mut runtime = Runtime::new(aio, RuntimeConfig::default());
    runtime.start();
    runtime
}

// ════════════════════════════════════════════════════════════
// Part A: Bus round trips
// ════════════════════════════════════════════════════════════

fn test_round_trips(t: &mut TestRunner) {
    t.section("Part A: Bus round trips");
    let mut runtime = echo_runtime();

    let handle = runtime
        .submit(SubmitAndAwait::boxed(Payload::typed(EchoSubmission::new(
            "foo",
        ))))
        .expect("submit");
    match handle.wait() {
        Ok(value) => t.check(
            "echo round trip",
            value
                .downcast_ref::<EchoCompletion>()
                .is_some_and(|echo| echo.data == "foo"),
            "wrong completion",
        ),
        Err(error) => t.fail("echo round trip", &error.to_string()),
    }

    let handle = runtime
        .submit(SubmitAndAwait::boxed(Payload::thunk(|| "foo".to_string())))
        .expect("submit");
    match handle.wait() {
        Ok(value) => t.check(
            "thunk execution",
            value.downcast_ref::<String>().is_some_and(|s| s == "foo"),
            "wrong value",
        ),
        Err(error) => t.fail("thunk execution", &error.to_string()),
    }

    runtime.shutdown();
    t.pass("runtime shutdown after round trips");
}

// ════════════════════════════════════════════════════════════
// Part B: Nested computations
// ════════════════════════════════════════════════════════════

struct Inner {
    n: u32,
    state: u8,
    thunk_ran: Arc<AtomicBool>,
}

impl Computation for Inner {
    fn resume(&mut self, input: Resume) -> Step {
        match self.state {
            0 => {
                self.state = 1;
                let flag = Arc::clone(&self.thunk_ran);
                Step::Yield(Yieldable::Submit(Payload::thunk(move || {
                    flag.store(true, Ordering::SeqCst);
                    "hello, world!".to_string()
                })))
            }
            1 => {
                let Resume::Promise(promise) = input else {
                    panic!("expected a promise");
                };
                self.state = 2;
                Step::Yield(Yieldable::Await(promise))
            }
            2 => Step::Done(Ok(Arc::new(self.n))),
            _ => unreachable!(),
        }
    }
}

struct Outer {
    child: Option<Box<dyn Computation>>,
    state: u8,
}

impl Computation for Outer {
    fn resume(&mut self, input: Resume) -> Step {
        match self.state {
            0 => {
                self.state = 1;
                Step::Yield(Yieldable::Child(self.child.take().expect("child")))
            }
            1 => {
                let Resume::Promise(promise) = input else {
                    panic!("expected a promise");
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

fn test_nested(t: &mut TestRunner) {
    t.section("Part B: Nested computations");
    let mut runtime = echo_runtime();

    let thunk_ran = Arc::new(AtomicBool::new(false));
    let handle = runtime
        .submit(Box::new(Outer {
            child: Some(Box::new(Inner {
                n: 5,
                state: 0,
                thunk_ran: Arc::clone(&thunk_ran),
            })),
            state: 0,
        }))
        .expect("submit");

    match handle.wait() {
        Ok(value) => {
            t.check(
                "nested computation value",
                value.downcast_ref::<u32>() == Some(&5),
                "wrong value",
            );
            t.check(
                "inner thunk observed before resolution",
                thunk_ran.load(Ordering::SeqCst),
                "thunk did not run",
            );
        }
        Err(error) => t.fail("nested computation value", &error.to_string()),
    }

    runtime.shutdown();
}

// ════════════════════════════════════════════════════════════
// Part C: Backpressure
// ════════════════════════════════════════════════════════════

fn test_overflow(t: &mut TestRunner) {
    t.section("Part C: Backpressure");

    let mut aio = AioSystem::new(100);
    aio.attach(Box::new(EchoSubsystem::new(1, 1)));

    aio.dispatch(Sqe::new(
        Payload::typed(EchoSubmission::new("first")),
        Box::new(|_: Outcome| {}),
    ));

    let rejected = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&rejected);
    aio.dispatch(Sqe::new(
        Payload::typed(EchoSubmission::new("second")),
        Box::new(move |outcome: Outcome| {
            if outcome.err() == Some(BusError::SubmissionQueueFull) {
                observed.fetch_add(1, Ordering::SeqCst);
            }
        }),
    ));

    t.check(
        "overflow rejected synchronously",
        rejected.load(Ordering::SeqCst) == 1,
        "no inline rejection",
    );
}

// ════════════════════════════════════════════════════════════
// Part D: Deterministic simulation
// ════════════════════════════════════════════════════════════

fn sim_errors(seed: u64, p: f64, n: usize) -> Vec<Option<BusError>> {
    let mut sim = SimAio::new(seed, p);
    sim.attach(Box::new(EchoSubsystem::new(100, 1)));
    for i in 0..n {
        sim.dispatch(Sqe::new(
            Payload::typed(EchoSubmission::new(format!("m{i}"))),
            Box::new(|_: Outcome| {}),
        ));
    }
    sim.flush(0);
    sim.dequeue(n + 1)
        .into_iter()
        .map(|cqe| cqe.into_result().err())
        .collect()
}

fn test_simulation(t: &mut TestRunner) {
    t.section("Part D: Deterministic simulation");

    let clean = sim_errors(12, 0.0, 6);
    t.check(
        "p=0 injects no faults",
        clean.len() == 6 && clean.iter().all(|e| e.is_none()),
        "unexpected faults",
    );

    let first = sim_errors(42, 0.5, 12);
    let second = sim_errors(42, 0.5, 12);
    t.check(
        "fixed seed reproduces the stream",
        first == second,
        "streams diverged",
    );

    let faulted = sim_errors(42, 1.0, 6);
    t.check(
        "p=1 faults every entry",
        faulted.len() == 6 && faulted.iter().all(|e| e.is_some()),
        "an entry escaped",
    );
}

fn main() {
    env_logger::init();
    let mut t = TestRunner::new();

    test_round_trips(&mut t);
    test_nested(&mut t);
    test_overflow(&mut t);
    test_simulation(&mut t);

    t.summary();
    if t.failed > 0 {
        std::process::exit(1);
    }
}
