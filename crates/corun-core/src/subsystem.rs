//! Subsystem capability contract.
//!
//! A subsystem registers under a string kind and services the
//! submission entries routed to it. How it services them is its own
//! business — worker threads, inline execution, batching — as long as
//! the completion-parity contract below holds.
//!
//! # Implementors
//!
//! - `FunctionSubsystem` (corun-module): invokes thunk payloads and
//!   completes with the produced value.
//! - `EchoSubsystem` (corun-module): completes `EchoSubmission` with
//!   an `EchoCompletion` carrying the same data.

use std::sync::Arc;

use crate::completion::CompletionSink;
use crate::entry::{Cqe, Kind, Sqe};

/// Processes one kind of submission entry and emits completions.
///
/// **Contract:**
/// - For each accepted `Sqe`, exactly one `Cqe` carrying the `Sqe`'s
///   callback is eventually delivered to the sink handed to `start`,
///   in submission order per worker.
/// - `enqueue` must NEVER block; a full submission queue hands the
///   entry back.
/// - `process` is the synchronous transform used by the simulation
///   bus; it must return one `Cqe` per input, in order, and is also
///   what workers apply entry by entry.
pub trait Subsystem: Send {
    /// Routing key this subsystem registered under.
    fn kind(&self) -> Kind;

    /// Maximum in-flight submissions the subsystem will accept.
    fn capacity(&self) -> usize;

    /// Start background workers, delivering completions to `sink`.
    fn start(&mut self, sink: Arc<dyn CompletionSink>);

    /// Stop accepting work, drain the submission queue, join workers.
    fn shutdown(&mut self);

    /// Non-blocking submission. `Err` returns the rejected entry so
    /// the bus can synthesize a failure completion from it.
    fn enqueue(&mut self, sqe: Sqe) -> Result<(), Sqe>;

    /// Opportunity to perform time-based work; no-op for simple
    /// subsystems.
    fn flush(&mut self, now: u64);

    /// Synchronously transform a batch of submissions into
    /// completions, one per input, in order.
    fn process(&mut self, sqes: Vec<Sqe>) -> Vec<Cqe>;
}
