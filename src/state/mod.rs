//! Probe state module.
//!
//! Holds the target model and the latest-result store that the scheduler
//! writes and the exporter reads.

mod models;
mod store;

pub use models::*;
pub use store::*;
