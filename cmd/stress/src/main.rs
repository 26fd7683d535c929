//! Stress test - many computations
//!
//! Submits a large number of thunk round trips, respecting inbox
//! backpressure, and reports throughput.

use std::time::Instant;

use corun::ops::SubmitAndAwait;
use corun::{
    AioSystem, DriverConfig, FunctionSubsystem, Payload, Runtime, RuntimeConfig, SchedulerConfig,
    SubmitError,
};

fn main() {
    env_logger::init();

    let count: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    println!("=== corun Stress Test ===\n");
    println!("Submitting {count} computations...");

    let mut aio = AioSystem::new(1024);
    aio.attach(Box::new(FunctionSubsystem::new(1024, 4)));

    let config = RuntimeConfig::new()
        .scheduler(SchedulerConfig::new().inbox_capacity(256))
        .driver(DriverConfig::new().dequeue_size(1024));
    let mut runtime = Runtime::new(aio, config);
    runtime.start();

    let start = Instant::now();
    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        loop {
            match runtime.submit(SubmitAndAwait::boxed(Payload::thunk(move || i as u64))) {
                Ok(handle) => {
                    handles.push(handle);
                    break;
                }
                // Inbox full: the driver drains it every tick.
                Err(SubmitError::InboxFull) => std::thread::yield_now(),
                Err(error) => panic!("submit failed: {error}"),
            }
        }
        if (i + 1) % 1000 == 0 {
            print!("\rSubmitted: {}/{}", i + 1, count);
        }
    }
    let submit_time = start.elapsed();
    println!("\rSubmitted: {count}/{count} in {submit_time:?}");

    let mut ok = 0usize;
    let mut failed = 0usize;
    for handle in &handles {
        match handle.wait() {
            Ok(_) => ok += 1,
            Err(_) => failed += 1,
        }
    }
    let total_time = start.elapsed();

    println!("Resolved:  {ok} ok, {failed} failed");
    println!("Elapsed:   {total_time:?}");
    println!(
        "Rate:      {:.0} computations/sec",
        count as f64 / total_time.as_secs_f64()
    );

    runtime.shutdown();
}
