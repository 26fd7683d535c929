//! Submission and completion entry types.
//!
//! An `Sqe` pairs a payload with a continuation callback; a `Cqe` pairs
//! the result with the same callback. They are the *lingua franca*
//! between the scheduler, the AIO bus, and every subsystem: for each
//! `Sqe` dispatched through the bus, exactly one `Cqe` carrying its
//! callback is eventually delivered to the shared completion queue.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::BusError;

/// Routing key. A payload's kind selects the subsystem that registered
/// the same kind.
pub type Kind = &'static str;

/// Distinguished kind for thunk payloads (arbitrary deferred calls).
pub const FUNCTION_KIND: Kind = "function";

/// A dynamically typed value produced by a subsystem or a computation.
///
/// Shared so one terminal value can be handed to an awaiter and to an
/// external result sink. Downcast with `Any::downcast_ref` or
/// `Arc::downcast`.
pub type Value = Arc<dyn Any + Send + Sync>;

/// The result carried by a `Cqe` and delivered to callbacks, awaiters,
/// and join handles.
pub type Outcome = Result<Value, BusError>;

/// A deferred call routed to the `"function"` subsystem.
pub type Thunk = Box<dyn FnOnce() -> Value + Send>;

/// Continuation invoked exactly once with the completion outcome.
pub type Callback = Box<dyn FnOnce(Outcome) + Send>;

/// A typed submission payload.
///
/// Implementors expose the routing kind plus the downcast plumbing a
/// subsystem needs to recover the concrete type from `Box<dyn Submission>`.
pub trait Submission: Any + Send {
    /// Routing key; must match a registered subsystem.
    fn kind(&self) -> Kind;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// The payload of a submission entry: a thunk or a typed value.
pub enum Payload {
    /// Deferred call; routed to [`FUNCTION_KIND`].
    Thunk(Thunk),
    /// Typed value; routed by its own kind.
    Typed(Box<dyn Submission>),
}

impl Payload {
    /// Wrap a deferred call, boxing its output as a [`Value`].
    pub fn thunk<F, T>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        T: Any + Send + Sync,
    {
        Payload::Thunk(Box::new(move || Arc::new(f()) as Value))
    }

    /// Wrap a typed submission.
    pub fn typed<S: Submission>(submission: S) -> Self {
        Payload::Typed(Box::new(submission))
    }

    /// The routing key for this payload.
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Thunk(_) => FUNCTION_KIND,
            Payload::Typed(s) => s.kind(),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Thunk(_) => write!(f, "Payload::Thunk"),
            Payload::Typed(s) => write!(f, "Payload::Typed({})", s.kind()),
        }
    }
}

/// A submission entry.
///
/// Built by the scheduler (or a test harness), dispatched through the
/// AIO bus, consumed by a subsystem's `process`.
pub struct Sqe {
    payload: Payload,
    callback: Callback,
}

impl Sqe {
    pub fn new(payload: Payload, callback: Callback) -> Self {
        Self { payload, callback }
    }

    /// Routing key of the carried payload.
    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }

    /// Split into payload and callback, for `process` implementations.
    pub fn into_parts(self) -> (Payload, Callback) {
        (self.payload, self.callback)
    }

    /// Invoke the callback with an error, consuming the entry.
    ///
    /// Used by the bus to synthesize failure completions inline, e.g.
    /// when a subsystem's submission queue is full.
    pub fn reject(self, error: BusError) {
        (self.callback)(Err(error));
    }
}

impl fmt::Debug for Sqe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sqe").field("kind", &self.kind()).finish()
    }
}

/// A completion entry.
///
/// Carries the originating `Sqe`'s callback and either the subsystem's
/// output or an error.
pub struct Cqe {
    result: Outcome,
    callback: Callback,
}

impl Cqe {
    pub fn new(result: Outcome, callback: Callback) -> Self {
        Self { result, callback }
    }

    pub fn result(&self) -> &Outcome {
        &self.result
    }

    /// Replace the carried result, keeping the callback.
    ///
    /// Used by the simulation bus to substitute injected faults for
    /// produced completions.
    pub fn override_result(&mut self, result: Outcome) {
        self.result = result;
    }

    /// Deliver the result to the callback, consuming the entry.
    pub fn complete(self) {
        (self.callback)(self.result);
    }

    /// Take the result without invoking the callback.
    pub fn into_result(self) -> Outcome {
        self.result
    }
}

impl fmt::Debug for Cqe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(_) => f.debug_struct("Cqe").field("result", &"ok").finish(),
            Err(e) => f.debug_struct("Cqe").field("result", e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Ping;

    impl Submission for Ping {
        fn kind(&self) -> Kind {
            "ping"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    #[test]
    fn thunk_payloads_route_to_function() {
        let payload = Payload::thunk(|| 7u32);
        assert_eq!(payload.kind(), FUNCTION_KIND);
    }

    #[test]
    fn typed_payloads_route_by_their_kind() {
        let payload = Payload::typed(Ping);
        assert_eq!(payload.kind(), "ping");
    }

    #[test]
    fn typed_payloads_downcast() {
        let payload = Payload::typed(Ping);
        match payload {
            Payload::Typed(s) => assert!(s.into_any().downcast::<Ping>().is_ok()),
            Payload::Thunk(_) => unreachable!(),
        }
    }

    #[test]
    fn reject_invokes_callback_with_error() {
        let hit = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&hit);
        let sqe = Sqe::new(
            Payload::thunk(|| ()),
            Box::new(move |outcome| {
                assert_eq!(outcome.err().unwrap(), BusError::SubmissionQueueFull);
                observed.store(true, Ordering::SeqCst);
            }),
        );
        sqe.reject(BusError::SubmissionQueueFull);
        assert!(hit.load(Ordering::SeqCst));
    }
}
