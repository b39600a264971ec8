//! davisx daemon: frame source, processing loop and archive wiring

pub mod config;
pub mod scheduler;

pub use config::*;
pub use scheduler::*;
