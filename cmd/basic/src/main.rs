//! Basic corun example
//!
//! Demonstrates the three yield variants: submitting thunks, awaiting
//! promises, and spawning a nested computation.

use std::sync::Arc;

use corun::ops::SubmitAndAwait;
use corun::{
    AioSystem, Computation, EchoSubsystem, FunctionSubsystem, Payload, Resume, Runtime,
    RuntimeConfig, Step, Yieldable,
};

/// Runs one thunk through the bus, then terminates with `n`.
struct Inner {
    n: u32,
    state: u8,
}

impl Computation for Inner {
    fn resume(&mut self, input: Resume) -> Step {
        match self.state {
            0 => {
                self.state = 1;
                Step::Yield(Yieldable::Submit(Payload::thunk(|| {
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
            2 => {
                let Resume::Value(value) = input else {
                    panic!("expected the thunk's value");
                };
                println!(
                    "[inner] thunk completed: {:?}",
                    value.downcast_ref::<String>().unwrap()
                );
                Step::Done(Ok(Arc::new(self.n)))
            }
            _ => unreachable!(),
        }
    }
}

/// Spawns `Inner` as a nested computation and returns its value.
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
                    panic!("expected the child's promise");
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

fn main() {
    env_logger::init();

    println!("=== corun Basic Example ===\n");

    let mut aio = AioSystem::new(100);
    aio.attach(Box::new(EchoSubsystem::new(100, 1)));
    aio.attach(Box::new(FunctionSubsystem::new(100, 1)));

    let mut runtime = Runtime::new(aio, RuntimeConfig::default());
    runtime.start();

    // A plain thunk round trip.
    let handle = runtime
        .submit(SubmitAndAwait::boxed(Payload::thunk(|| {
            "hello, world".to_string()
        })))
        .expect("submit");
    let value = handle.wait().expect("thunk result");
    println!("thunk     -> {:?}", value.downcast_ref::<String>().unwrap());

    // An echo round trip.
    let handle = runtime
        .submit(SubmitAndAwait::boxed(Payload::typed(
            corun::EchoSubmission::new("hello, world"),
        )))
        .expect("submit");
    let value = handle.wait().expect("echo result");
    println!(
        "echo      -> {:?}",
        value.downcast_ref::<corun::EchoCompletion>().unwrap().data
    );

    // A nested computation returning through a thunk hop.
    let handle = runtime
        .submit(Box::new(Outer {
            child: Some(Box::new(Inner { n: 5, state: 0 })),
            state: 0,
        }))
        .expect("submit");
    let value = handle.wait().expect("nested result");
    println!("nested    -> {:?}", value.downcast_ref::<u32>().unwrap());

    runtime.shutdown();
    println!("\nDone.");
}
