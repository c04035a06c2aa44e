//! Closure execution
//!
//! Turns a resolved entry point plus task inputs into an interpreter run
//! and the closure's output mapping.

mod runner;

pub use runner::*;
