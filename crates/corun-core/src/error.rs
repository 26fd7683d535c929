//! corun error types.

use thiserror::Error;

/// Errors that travel through completion entries and resumptions.
///
/// These are first-class values: a `Cqe` carries one in place of an
/// output, a callback receives it, and the target computation observes
/// it as an error resumption. Clonable so one terminal error can be
/// delivered to an awaiter and to an external result sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Subsystem submission queue full; synthesized by the bus.
    #[error("aio submission queue full")]
    SubmissionQueueFull,
    /// Injected by the simulation bus before `process` ran.
    #[error("simulated failure before processing")]
    FailedBeforeProcessing,
    /// Injected by the simulation bus in place of a produced completion.
    #[error("simulated failure after processing")]
    FailedAfterProcessing,
    /// Produced by a subsystem's `process`; opaque payload.
    #[error("subsystem error: {0}")]
    Subsystem(String),
    /// Raised by user code inside a computation.
    #[error("computation error: {0}")]
    Computation(String),
}

/// Errors returned to a submitter by `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The scheduler inbox is at capacity.
    #[error("scheduler inbox full")]
    InboxFull,
    /// The scheduler refuses further submissions.
    #[error("scheduler is shut down")]
    ShutDown,
}
