//! Completion delivery abstraction.
//!
//! A `CompletionSink` is the bus-owned endpoint subsystem workers push
//! completion entries into. It is the sole cross-thread channel in the
//! system: workers publish, the driver pulls via the bus's `dequeue`.
//!
//! # Implementors
//!
//! - `SharedCompletionQueue` (corun-module): bounded lock-free queue
//!   backing the real bus.
//! - `SimCompletionQueue` (corun-module): mutex-guarded list backing
//!   the deterministic simulation bus.

use crate::entry::Cqe;

/// Accepts completion entries from subsystem workers.
///
/// **Contract:**
/// - `complete` must NEVER block. A full or closed sink hands the
///   entry back; the caller decides whether to retry.
/// - Entries are delivered to the consumer in the order they were
///   accepted (FIFO).
pub trait CompletionSink: Send + Sync {
    /// Non-blocking push. `Err` returns the entry on a full or closed
    /// sink.
    fn complete(&self, cqe: Cqe) -> Result<(), Cqe>;
}
