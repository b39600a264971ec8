//! Core types, frame decoding and rollups for Davis ISS radio frames
//!
//! This crate is pure: it performs no I/O and keeps no global state. All
//! mutable state lives in [`StationProcessor`], owned by the single task
//! that processes readings in arrival order.

pub mod decode;
pub mod pipeline;
pub mod rain;
pub mod rollups;
pub mod types;
pub mod units;
pub mod upload;
pub mod window;

pub use decode::*;
pub use pipeline::*;
pub use rain::*;
pub use rollups::*;
pub use types::*;
pub use units::*;
pub use upload::*;
pub use window::*;
