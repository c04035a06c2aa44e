//! Coordinator communication module
//!
//! Handles the coordinator's HTTP task API:
//! - Fetching the task descriptor and the closure description
//! - Reporting STARTED / FINISHED / FAILED back to the task URI

mod client;
mod reporter;

pub use client::*;
pub use reporter::*;
