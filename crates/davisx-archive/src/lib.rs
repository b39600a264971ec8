//! Ten minute archive buckets
//!
//! Every reading lands in the bucket covering its ten minute interval. The
//! bucket keeps each field's samples with their offsets from the bucket
//! start, and recomputes average/min/max from the full list on every write.

pub mod bucket;
pub mod retry;
pub mod store;
pub mod writer;

pub use bucket::*;
pub use retry::*;
pub use store::*;
pub use writer::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive write failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Archive store error: {0}")]
    Store(#[from] StoreError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
