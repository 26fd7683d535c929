//! # corun-runtime — The cooperative scheduler
//!
//! A deterministic, single-threaded executor that drives resumable
//! computations through their yield points. Each tick it:
//!
//! ```text
//! 1. Admit submissions from the bounded inbox into the ready deque
//! 2. Revive waiters whose blocker now has a final value
//! 3. Pop from the back of the ready deque and step, until empty
//! ```
//!
//! Stepping a computation routes whatever it yields: nested
//! computations become child records run before the parent continues,
//! I/O payloads become submission entries dispatched to the AIO bus,
//! and promises block the computation until the referenced work has a
//! final value.
//!
//! The scheduler's data structures are non-shared; `step` is the only
//! mutator. The sole cross-thread inputs are the submission inbox and
//! the final-value cells written by completion callbacks.

pub mod config;
pub mod scheduler;

mod task;

pub use config::SchedulerConfig;
pub use scheduler::{Scheduler, SubmitHandle};
