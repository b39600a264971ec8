//! Bucket storage backends

use crate::bucket::ArchiveBucket;
use async_trait::async_trait;
use davisx_core::BucketKey;
use davisx_db::{DbClient, DbError};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Stored value paired with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Result of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed,
    /// The stored version no longer matches the expected one
    Conflict,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Bucket {0} stayed contended")]
    Contention(BucketKey),

    #[error("Bucket document error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Failures a later attempt may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Contention(_))
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        if e.is_transient() {
            StoreError::Transient(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed document store with atomic conditional writes
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Current bucket under `key` with its version
    async fn load(&self, key: &BucketKey) -> StoreResult<Option<Versioned<ArchiveBucket>>>;

    /// Write `bucket` if the stored version is still `expected`
    ///
    /// `None` means the bucket must not exist yet.
    async fn compare_and_swap(
        &self,
        key: &BucketKey,
        expected: Option<u64>,
        bucket: &ArchiveBucket,
    ) -> StoreResult<CasOutcome>;
}

/// Process local store, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<BucketKey, Versioned<ArchiveBucket>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &BucketKey) -> Option<ArchiveBucket> {
        self.buckets.lock().await.get(key).map(|v| v.value.clone())
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.lock().await.is_empty()
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn load(&self, key: &BucketKey) -> StoreResult<Option<Versioned<ArchiveBucket>>> {
        Ok(self.buckets.lock().await.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &BucketKey,
        expected: Option<u64>,
        bucket: &ArchiveBucket,
    ) -> StoreResult<CasOutcome> {
        let mut buckets = self.buckets.lock().await;
        let current = buckets.get(key).map(|v| v.version);
        if current != expected {
            return Ok(CasOutcome::Conflict);
        }
        let version = expected.map_or(1, |v| v + 1);
        buckets.insert(
            *key,
            Versioned {
                version,
                value: bucket.clone(),
            },
        );
        Ok(CasOutcome::Committed)
    }
}

/// MySQL backed store, one row per station and bucket
#[derive(Clone)]
pub struct MySqlBucketStore {
    client: DbClient,
    station: String,
}

impl MySqlBucketStore {
    pub fn new(client: DbClient, station: impl Into<String>) -> Self {
        Self {
            client,
            station: station.into(),
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }
}

#[async_trait]
impl BucketStore for MySqlBucketStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn load(&self, key: &BucketKey) -> StoreResult<Option<Versioned<ArchiveBucket>>> {
        let Some(row) = self.client.fetch_bucket(&self.station, key).await? else {
            return Ok(None);
        };
        let value: ArchiveBucket = serde_json::from_str(&row.doc)?;
        let version = u64::try_from(row.version)
            .map_err(|_| StoreError::Backend(format!("negative version {}", row.version)))?;
        Ok(Some(Versioned { version, value }))
    }

    #[instrument(skip(self, key, bucket), fields(key = %key))]
    async fn compare_and_swap(
        &self,
        key: &BucketKey,
        expected: Option<u64>,
        bucket: &ArchiveBucket,
    ) -> StoreResult<CasOutcome> {
        let doc = serde_json::to_string(bucket)?;
        let applied = match expected {
            None => self.client.insert_bucket(&self.station, key, &doc).await?,
            Some(version) => {
                let version = i64::try_from(version)
                    .map_err(|_| StoreError::Backend(format!("version {} out of range", version)))?;
                self.client
                    .update_bucket(&self.station, key, version, &doc)
                    .await?
            }
        };
        debug!("Compare-and-swap on {} applied: {}", key, applied);
        Ok(if applied {
            CasOutcome::Committed
        } else {
            CasOutcome::Conflict
        })
    }
}
