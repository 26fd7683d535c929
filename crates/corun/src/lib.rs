//! # corun - Cooperative Computation Runtime
//!
//! A small asynchronous-I/O runtime: user-defined resumable
//! computations are multiplexed by a single-threaded cooperative
//! scheduler over a set of pluggable I/O subsystems, all reached
//! through one submission/completion queue bus.
//!
//! ## Quick Start
//!
//! ```ignore
//! use corun::{AioSystem, EchoSubsystem, FunctionSubsystem, Runtime, RuntimeConfig};
//!
//! fn main() {
//!     let mut aio = AioSystem::new(100);
//!     aio.attach(Box::new(EchoSubsystem::new(100, 1)));
//!     aio.attach(Box::new(FunctionSubsystem::new(100, 1)));
//!
//!     let mut runtime = Runtime::new(aio, RuntimeConfig::default());
//!     runtime.start();
//!
//!     // `MyComputation` implements corun::Computation.
//!     let handle = runtime.submit(Box::new(MyComputation::new())).unwrap();
//!     println!("{:?}", handle.wait());
//!
//!     runtime.shutdown();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       User Code                             │
//! │         Computation::resume — yield, await, return          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ submit() → JoinHandle
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Scheduler                             │
//! │    ready deque, await table, promise index, sink index      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ dispatch(SQE) ▲ dequeue(CQE)
//!                              ▼               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AIO bus                              │
//! │        routes by kind, shared completion queue              │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │   echo    │      │ function  │      │  custom   │
//!    │ subsystem │      │ subsystem │      │ subsystem │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```
//!
//! The driver thread (one per runtime) loops: drain completions, tick
//! the scheduler, flush the bus.

pub mod ops;

// Re-export core types
pub use corun_core::computation::{Computation, Promise, Resume, Step, Yieldable};
pub use corun_core::entry::{
    Callback, Cqe, Kind, Outcome, Payload, Sqe, Submission, Thunk, Value, FUNCTION_KIND,
};
pub use corun_core::error::{BusError, SubmitError};
pub use corun_core::handle::JoinHandle;
pub use corun_core::{aio::Aio, completion::CompletionSink, subsystem::Subsystem};

// Re-export runtime types
pub use corun_runtime::{Scheduler, SchedulerConfig, SubmitHandle};

// Re-export executor types
pub use corun_executor::{driver_loop, Driver, DriverConfig};

// Re-export default implementations
pub use corun_module::{
    AioSystem, EchoCompletion, EchoSubmission, EchoSubsystem, FunctionSubsystem, SimAio, ECHO_KIND,
};

use log::info;

/// Configuration for a runtime: scheduler plus driver settings.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub driver: DriverConfig,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn driver(mut self, config: DriverConfig) -> Self {
        self.driver = config;
        self
    }
}

/// A fully assembled corun system: bus, scheduler, and driver thread.
///
/// `start` brings up the subsystems and the driver; `submit` hands a
/// computation to the scheduler and returns its join handle;
/// `shutdown` waits for every submitted computation to resolve, then
/// tears the stack down.
pub struct Runtime<A: Aio + 'static> {
    scheduler: Option<Scheduler<A>>,
    handle: SubmitHandle,
    driver: Option<Driver>,
    config: RuntimeConfig,
}

impl<A: Aio + 'static> Runtime<A> {
    pub fn new(aio: A, config: RuntimeConfig) -> Self {
        let scheduler = Scheduler::new(aio, config.scheduler.clone());
        let handle = scheduler.handle();
        Self {
            scheduler: Some(scheduler),
            handle,
            driver: None,
            config,
        }
    }

    /// Start the bus subsystems and the driver thread.
    pub fn start(&mut self) {
        let mut scheduler = self.scheduler.take().expect("runtime already started");
        scheduler.aio_mut().start();
        self.driver = Some(Driver::spawn(scheduler, self.config.driver.clone()));
        info!("runtime started");
    }

    /// Submit a computation; the handle resolves with its terminal
    /// value or error.
    pub fn submit(&self, computation: Box<dyn Computation>) -> Result<JoinHandle, SubmitError> {
        self.handle.submit(computation)
    }

    /// A cloneable submission endpoint for other threads.
    pub fn handle(&self) -> SubmitHandle {
        self.handle.clone()
    }

    /// Wait for the scheduler to drain, then stop driver, scheduler,
    /// and bus.
    pub fn shutdown(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.shutdown();
            info!("runtime shut down");
        }
    }
}
