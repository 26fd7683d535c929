//! Reusable computations for common patterns.

use corun_core::computation::{Computation, Resume, Step, Yieldable};
use corun_core::entry::Payload;

enum State {
    Created,
    AwaitingPromise,
    AwaitingValue,
    Terminated,
}

/// The canonical yield pair: submit one payload, await its completion,
/// terminate with the result.
///
/// ```ignore
/// let handle = runtime.submit(SubmitAndAwait::boxed(Payload::thunk(|| 2 + 2)))?;
/// ```
pub struct SubmitAndAwait {
    payload: Option<Payload>,
    state: State,
}

impl SubmitAndAwait {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            state: State::Created,
        }
    }

    pub fn boxed(payload: Payload) -> Box<dyn Computation> {
        Box::new(Self::new(payload))
    }
}

impl Computation for SubmitAndAwait {
    fn resume(&mut self, input: Resume) -> Step {
        match self.state {
            State::Created => {
                self.state = State::AwaitingPromise;
                Step::Yield(Yieldable::Submit(
                    self.payload.take().expect("payload present at start"),
                ))
            }
            State::AwaitingPromise => {
                let Resume::Promise(promise) = input else {
                    panic!("expected the promise minted for the submission");
                };
                self.state = State::AwaitingValue;
                Step::Yield(Yieldable::Await(promise))
            }
            State::AwaitingValue => {
                self.state = State::Terminated;
                match input {
                    Resume::Value(value) => Step::Done(Ok(value)),
                    Resume::Failure(error) => Step::Done(Err(error)),
                    _ => panic!("expected the completion of the submission"),
                }
            }
            State::Terminated => unreachable!("resumed past termination"),
        }
    }
}
