//! The resumable computation protocol.
//!
//! A computation is a state machine the scheduler drives through its
//! suspension points: each `resume` either yields a request or
//! terminates with a final outcome. The protocol a computation sees is
//! strict:
//!
//! 1. Yield a payload or a nested computation; the next resumption
//!    delivers the [`Promise`] minted for it.
//! 2. Yield that promise back to block; the next resumption delivers
//!    the resolved value (or an error resumption on failure).
//!
//! The scheduler branches on the [`Yieldable`] tag and never inspects
//! the machine's internals.

use std::fmt;

use crate::entry::{Outcome, Payload, Value};
use crate::error::BusError;

/// Opaque handle to a pending computation or I/O submission.
///
/// Minted by the scheduler and handed to the yielding computation;
/// resolved exactly once, with either a value or an error. The numeric
/// identity is scheduler-internal — user code only stores a promise and
/// yields it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Promise(pub u64);

/// The value a computation is resumed with.
pub enum Resume {
    /// First resumption; nothing has been requested yet.
    Start,
    /// A resolved value: a completion output or a child's final value.
    Value(Value),
    /// The promise minted for the computation's previous request.
    Promise(Promise),
    /// An error resumption; uncaught, it should become the machine's
    /// terminal outcome.
    Failure(BusError),
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resume::Start => write!(f, "Start"),
            Resume::Value(_) => write!(f, "Value(..)"),
            Resume::Promise(p) => write!(f, "Promise({})", p.0),
            Resume::Failure(e) => write!(f, "Failure({e})"),
        }
    }
}

/// A request produced at a suspension point.
pub enum Yieldable {
    /// Spawn a nested computation; the promise for it arrives next.
    Child(Box<dyn Computation>),
    /// Block until the referenced computation or I/O has a final value.
    Await(Promise),
    /// Submit an I/O payload to the bus; the promise for it arrives next.
    Submit(Payload),
}

impl fmt::Debug for Yieldable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yieldable::Child(_) => write!(f, "Child(..)"),
            Yieldable::Await(p) => write!(f, "Await({})", p.0),
            Yieldable::Submit(payload) => write!(f, "Submit({})", payload.kind()),
        }
    }
}

/// The observable result of one resumption.
pub enum Step {
    /// The machine suspended with a request.
    Yield(Yieldable),
    /// The machine terminated with a final value or error.
    Done(Outcome),
}

/// A resumable state machine producing a terminal value or error.
///
/// **Contract:**
/// - `resume` is only called again after the previous call returned
///   `Step::Yield`; a machine is never resumed past `Step::Done`.
/// - The first call carries `Resume::Start`.
/// - After yielding a payload or a child, the machine must accept a
///   `Resume::Promise` and eventually yield that promise back; the
///   resumption after that carries the resolved value.
pub trait Computation: Send {
    fn resume(&mut self, input: Resume) -> Step;
}
