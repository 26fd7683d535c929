//! # corun-core — Trait definitions for corun
//!
//! This crate defines the trait boundaries for every axis of variability
//! in the corun system. Each trait models one capability dimension.
//! Default implementations live in `corun-module`; the scheduler and
//! driver are generic over the traits defined here.
//!
//! ## Design principle
//!
//! > "Program to the interface. The scheduler branches on tags,
//! >  never on the internals of a computation or a subsystem."
//!
//! The scheduler (`corun-runtime`) and the driver (`corun-executor`)
//! depend on traits from this crate, never on concrete types. Swapping
//! the real bus for the deterministic simulation bus is a type
//! parameter change.

pub mod aio;
pub mod completion;
pub mod computation;
pub mod entry;
pub mod error;
pub mod handle;
pub mod subsystem;
