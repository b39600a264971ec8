//! Bucketed archive writer

use crate::bucket::ArchiveBucket;
use crate::retry::RetryPolicy;
use crate::store::{BucketStore, CasOutcome, StoreError, StoreResult};
use crate::{ArchiveError, ArchiveResult};
use davisx_core::{bucket_offset_seconds, BucketKey, Reading};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Conflicting writers re-read the bucket this many times per attempt
const MAX_CAS_ROUNDS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new bucket was created for the reading
    Created,
    /// The reading was appended to an existing bucket
    Updated,
    /// The reading was already in the bucket
    AlreadyPresent,
}

/// Appends readings to their ten minute bucket
///
/// Each write is a read-modify-write guarded by the store's compare-and-swap,
/// retried with backoff on transient store failures.
#[derive(Clone)]
pub struct ArchiveWriter {
    store: Arc<dyn BucketStore>,
    policy: RetryPolicy,
}

impl ArchiveWriter {
    pub fn new(store: Arc<dyn BucketStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append one reading to the bucket covering its timestamp
    #[instrument(skip(self, reading), fields(key = tracing::field::Empty))]
    pub async fn upsert(&self, reading: &Reading) -> ArchiveResult<UpsertOutcome> {
        let key = BucketKey::for_timestamp(reading.timestamp);
        let offset = bucket_offset_seconds(reading.timestamp);
        tracing::Span::current().record("key", tracing::field::display(&key));

        let result = self
            .policy
            .run(
                || self.try_upsert(key, reading, offset),
                StoreError::is_transient,
                |attempt, error, delay| {
                    warn!(
                        key = %key,
                        attempt,
                        error = %error,
                        "Archive write failed, retrying in {:?}",
                        delay
                    );
                },
            )
            .await;

        match result {
            Ok(outcome) => {
                debug!("Archived reading into {}: {:?}", key, outcome);
                Ok(outcome)
            }
            Err(failed) if failed.error.is_transient() => Err(ArchiveError::RetriesExhausted {
                attempts: failed.attempts,
                source: failed.error,
            }),
            Err(failed) => Err(ArchiveError::Store(failed.error)),
        }
    }

    async fn try_upsert(
        &self,
        key: BucketKey,
        reading: &Reading,
        offset: f64,
    ) -> StoreResult<UpsertOutcome> {
        for _ in 0..MAX_CAS_ROUNDS {
            let (expected, bucket, outcome) = match self.store.load(&key).await? {
                None => (
                    None,
                    ArchiveBucket::from_reading(key, reading, offset),
                    UpsertOutcome::Created,
                ),
                Some(current) if current.value.contains_sample(reading, offset) => {
                    return Ok(UpsertOutcome::AlreadyPresent);
                }
                Some(current) => {
                    let mut bucket = current.value;
                    bucket.apply(reading, offset);
                    (Some(current.version), bucket, UpsertOutcome::Updated)
                }
            };

            match self.store.compare_and_swap(&key, expected, &bucket).await? {
                CasOutcome::Committed => return Ok(outcome),
                CasOutcome::Conflict => debug!("Bucket {} changed underneath, re-reading", key),
            }
        }
        Err(StoreError::Contention(key))
    }
}
