//! AIO bus contract.
//!
//! The bus routes submission entries to the subsystem that registered
//! the payload's kind and aggregates their completions into one shared
//! queue. The scheduler only dispatches; the driver dequeues and
//! flushes.
//!
//! # Implementors
//!
//! - `AioSystem` (corun-module): the real bus. Subsystem workers run
//!   on their own threads and publish completions as they finish.
//! - `SimAio` (corun-module): deterministic simulation. Dispatch only
//!   buffers; `flush` shuffles, injects faults from a seeded PRNG, and
//!   processes synchronously.

use crate::entry::{Cqe, Sqe};

/// Submission/completion queue fabric over registered subsystems.
///
/// **Contract:**
/// - `dispatch` routes by payload kind (thunks to `"function"`). An
///   unregistered kind is a routing bug and panics. A full subsystem
///   queue synthesizes a *submission queue full* error completion and
///   invokes the entry's callback inline on the caller.
/// - `dequeue` is non-blocking and returns completions in FIFO order
///   within a tick.
/// - `flush` forwards the time scalar to every registered subsystem,
///   in registration order.
pub trait Aio: Send {
    /// Route one submission entry to its subsystem.
    fn dispatch(&mut self, sqe: Sqe);

    /// Drain up to `max` completion entries, non-blocking.
    fn dequeue(&mut self, max: usize) -> Vec<Cqe>;

    /// Forward a flush tick to every registered subsystem.
    fn flush(&mut self, now: u64);

    /// Forward lifecycle start to every registered subsystem.
    fn start(&mut self);

    /// Shut down subsystems, close the completion queue, and drain.
    fn shutdown(&mut self);
}
