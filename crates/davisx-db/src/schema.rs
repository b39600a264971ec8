//! Bucket table layout
//!
//! The document column is plain text rather than a JSON column so the row
//! decodes without the sqlx `json` feature.

use davisx_core::BucketKey;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored archive bucket
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BucketRow {
    /// Station the bucket belongs to
    pub station: String,

    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,

    /// Incremented on every successful write
    pub version: i64,

    /// Serialized bucket document
    pub doc: String,
}

/// Key columns bound in the order used by every bucket query
pub(crate) fn key_columns(key: &BucketKey) -> [i32; 4] {
    [
        key.month as i32,
        key.day as i32,
        key.hour as i32,
        key.minute as i32,
    ]
}

/// DDL for the bucket table
pub const CREATE_BUCKET_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS archive_bucket (
    station VARCHAR(64) NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    day INT NOT NULL,
    hour INT NOT NULL,
    minute INT NOT NULL,
    version BIGINT NOT NULL,
    doc LONGTEXT NOT NULL,
    PRIMARY KEY (station, year, month, day, hour, minute)
)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_columns_follow_bucket_key() {
        let key = BucketKey {
            year: 2024,
            month: 3,
            day: 1,
            hour: 12,
            minute: 10,
        };
        assert_eq!(key_columns(&key), [3, 1, 12, 10]);
    }

    #[test]
    fn test_table_is_keyed_per_station_bucket() {
        assert!(CREATE_BUCKET_TABLE.contains("archive_bucket"));
        assert!(CREATE_BUCKET_TABLE.contains("PRIMARY KEY (station, year, month, day, hour, minute)"));
    }
}
