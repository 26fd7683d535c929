//! Echo round-trip example
//!
//! Submits a batch of echo computations and prints what comes back.

use corun::ops::SubmitAndAwait;
use corun::{
    AioSystem, EchoCompletion, EchoSubmission, EchoSubsystem, FunctionSubsystem, Payload, Runtime,
    RuntimeConfig,
};

fn main() {
    env_logger::init();

    let count: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);

    println!("=== corun Echo Example ({count} round trips) ===\n");

    let mut aio = AioSystem::new(100);
    aio.attach(Box::new(EchoSubsystem::new(100, 2)));
    aio.attach(Box::new(FunctionSubsystem::new(100, 1)));

    let mut runtime = Runtime::new(aio, RuntimeConfig::default());
    runtime.start();

    let handles: Vec<_> = (0..count)
        .map(|i| {
            runtime
                .submit(SubmitAndAwait::boxed(Payload::typed(EchoSubmission::new(
                    format!("message-{i}"),
                ))))
                .expect("submit")
        })
        .collect();

    for (i, handle) in handles.iter().enumerate() {
        match handle.wait() {
            Ok(value) => {
                let echo = value.downcast_ref::<EchoCompletion>().expect("echo");
                println!("[{i}] {}", echo.data);
            }
            Err(error) => println!("[{i}] error: {error}"),
        }
    }

    runtime.shutdown();
}
