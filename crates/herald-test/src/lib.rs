//! Herald Test Harness - Fixtures, fuzzing and end-to-end checks
//!
//! This crate provides:
//! - Guild and event fixtures
//! - A recording role service
//! - Randomized role move fuzzing
//! - Multi-session clusters over a shared pub/sub fabric

pub mod fixtures;
pub mod integration;
pub mod role_fuzzer;

pub use fixtures::*;
pub use integration::*;
pub use role_fuzzer::*;
