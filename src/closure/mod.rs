//! Closure domain types
//!
//! What the coordinator hands out (task descriptors and closure
//! descriptions), what the runner reports back, and how a closure's entry
//! point is derived.

mod entrypoint;
mod types;

pub use entrypoint::*;
pub use types::*;
