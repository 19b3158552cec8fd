//! Testing utilities and mock implementations
//!
//! Mock workers for exercising the dispatcher without spawning threads.

pub mod mocks;

pub use mocks::*;
