//! Listing computations offloaded by the dispatcher
//!
//! The functions here are pure and synchronous. They are the reference
//! behavior for both the in-process fallback and the background worker.

pub mod fallback;

pub use fallback::{execute, extract_features, process_properties};
