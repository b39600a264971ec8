//! Versioned bucket queries

use crate::schema::{key_columns, BucketRow, CREATE_BUCKET_TABLE};
use crate::{DbClient, DbResult};
use davisx_core::BucketKey;
use tracing::{debug, instrument};

impl DbClient {
    /// Create the bucket table if it does not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> DbResult<()> {
        sqlx::query(CREATE_BUCKET_TABLE).execute(self.pool()).await?;
        Ok(())
    }

    /// Fetch the bucket stored under `key`
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn fetch_bucket(&self, station: &str, key: &BucketKey) -> DbResult<Option<BucketRow>> {
        let [month, day, hour, minute] = key_columns(key);
        let row = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT station, year, month, day, hour, minute, version, doc
            FROM archive_bucket
            WHERE station = ? AND year = ? AND month = ? AND day = ? AND hour = ? AND minute = ?
            "#,
        )
        .bind(station)
        .bind(key.year)
        .bind(month)
        .bind(day)
        .bind(hour)
        .bind(minute)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Insert a new bucket at version 1
    ///
    /// Returns `false` when a row with the same key already exists.
    #[instrument(skip(self, key, doc), fields(key = %key))]
    pub async fn insert_bucket(&self, station: &str, key: &BucketKey, doc: &str) -> DbResult<bool> {
        let [month, day, hour, minute] = key_columns(key);
        let result = sqlx::query(
            r#"
            INSERT INTO archive_bucket (station, year, month, day, hour, minute, version, doc)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(station)
        .bind(key.year)
        .bind(month)
        .bind(day)
        .bind(hour)
        .bind(minute)
        .bind(doc)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => {
                debug!("Inserted bucket {}", key);
                Ok(true)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("Bucket {} already exists", key);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a bucket only if it is still at `expected_version`
    ///
    /// Returns `false` when another writer updated the row first.
    #[instrument(skip(self, key, doc), fields(key = %key))]
    pub async fn update_bucket(
        &self,
        station: &str,
        key: &BucketKey,
        expected_version: i64,
        doc: &str,
    ) -> DbResult<bool> {
        let [month, day, hour, minute] = key_columns(key);
        let result = sqlx::query(
            r#"
            UPDATE archive_bucket
            SET version = version + 1, doc = ?
            WHERE station = ? AND year = ? AND month = ? AND day = ? AND hour = ? AND minute = ?
              AND version = ?
            "#,
        )
        .bind(doc)
        .bind(station)
        .bind(key.year)
        .bind(month)
        .bind(day)
        .bind(hour)
        .bind(minute)
        .bind(expected_version)
        .execute(self.pool())
        .await?;

        let updated = result.rows_affected() == 1;
        debug!(
            "Bucket {} update at version {}: {}",
            key,
            expected_version,
            if updated { "applied" } else { "conflict" }
        );
        Ok(updated)
    }
}
