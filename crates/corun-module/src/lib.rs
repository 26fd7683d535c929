//! # corun-module — Default implementations of the corun contracts
//!
//! - [`AioSystem`] — the real AIO bus: subsystem registry, dispatch by
//!   payload kind, bounded shared completion queue.
//! - [`SimAio`] — deterministic simulation bus: seeded-PRNG shuffled
//!   dispatch, injected pre/post-processing faults, synchronous
//!   processing on `flush`.
//! - [`EchoSubsystem`] — completes `EchoSubmission` with an
//!   `EchoCompletion` carrying the same data.
//! - [`FunctionSubsystem`] — invokes thunk payloads and completes with
//!   the produced value.
//!
//! Every component depends only on the `corun-core` traits; the
//! scheduler and driver don't change when one of these is swapped.

pub mod aio_system;
pub mod echo;
pub mod function;
pub mod queue;
pub mod sim;

mod worker;

pub use aio_system::AioSystem;
pub use echo::{EchoCompletion, EchoSubmission, EchoSubsystem, ECHO_KIND};
pub use function::FunctionSubsystem;
pub use sim::SimAio;
