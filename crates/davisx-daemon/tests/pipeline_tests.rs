//! End-to-end tests of the processing loop against the in-memory archive

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use davisx_archive::{
    ArchiveBucket, ArchiveField, ArchiveWriter, BucketStore, CasOutcome, MemoryStore, MetaField,
    RetryPolicy, StoreError, StoreResult, UpsertOutcome, Versioned,
};
use davisx_core::{BucketKey, StationProcessor, UploadRecord, UploadSettings, Uploader, WindowSettings};
use davisx_daemon::{FrameOutcome, Scheduler};
use davisx_ingest::{create_frame_channel, RawFrame};

const TEMP_18F: &str = "0 FFC0 80 3 80 0B 40 0 0 0 0 0";
const HUMIDITY_34_8: &str = "0 FFC0 A0 3 80 5C 10 0 0 0 0 0";

fn at(offset_ms: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::milliseconds(offset_ms)
}

fn frame(line: &str, offset_ms: i64) -> RawFrame {
    RawFrame {
        line: line.to_string(),
        received_at: at(offset_ms),
    }
}

fn rain_line(counter: u8) -> String {
    format!("0 FFC0 E0 3 80 {:X} 0 0 0 0 0 0", counter)
}

fn processor() -> StationProcessor {
    StationProcessor::new(
        &WindowSettings::default(),
        0.01,
        UploadSettings {
            station_id: "KXX123".into(),
            password: "pw".into(),
            realtime_freq: Some(2.5),
        },
    )
}

#[derive(Default)]
struct RecordingUploader {
    records: Mutex<Vec<UploadRecord>>,
    fail: bool,
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, record: &UploadRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(anyhow!("503 Service Unavailable"));
        }
        Ok(())
    }
}

/// Store whose writes always fail with a connectivity error
struct UnreachableStore;

#[async_trait]
impl BucketStore for UnreachableStore {
    async fn load(&self, _key: &BucketKey) -> StoreResult<Option<Versioned<ArchiveBucket>>> {
        Err(StoreError::Transient("connection refused".into()))
    }

    async fn compare_and_swap(
        &self,
        _key: &BucketKey,
        _expected: Option<u64>,
        _bucket: &ArchiveBucket,
    ) -> StoreResult<CasOutcome> {
        Err(StoreError::Transient("connection refused".into()))
    }
}

#[tokio::test]
async fn test_frames_flow_to_archive_and_upload() {
    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(RecordingUploader::default());
    let (tx, rx) = create_frame_channel(16);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(store.clone(), RetryPolicy::immediate(3)),
    )
    .with_uploader(uploader.clone());

    tx.send(frame(TEMP_18F, 0)).await.unwrap();
    tx.send(frame(HUMIDITY_34_8, 2_500)).await.unwrap();
    tx.send(frame(&rain_line(120), 5_000)).await.unwrap();
    tx.send(frame(&rain_line(125), 7_500)).await.unwrap();
    tx.send(frame(TEMP_18F, 10_000)).await.unwrap();
    drop(tx);

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.archived, 5);
    assert_eq!(stats.malformed, 0);
    assert_eq!(stats.uploads, 5);

    let bucket = store.get(&BucketKey::for_timestamp(at(0))).await.unwrap();
    let temp = bucket.field(ArchiveField::Temperature).unwrap();
    assert_eq!(temp.values, vec![18.0, 18.0]);
    assert_eq!(temp.times, vec![0.0, 10.0]);
    assert_eq!(bucket.field(ArchiveField::Humidity).unwrap().values, vec![34.8]);
    assert_eq!(bucket.field(ArchiveField::Rain).unwrap().values, vec![120.0, 125.0]);
    assert_eq!(bucket.field(ArchiveField::WindSpeed).unwrap().values.len(), 5);
    assert_eq!(bucket.meta[&MetaField::Datetime].values.len(), 5);

    let records = uploader.records.lock().unwrap();
    assert_eq!(records.len(), 5);
    let last = records.iter().max_by_key(|r| r.date_utc).unwrap();
    assert_eq!(last.temp_f, Some(18.0));
    assert_eq!(last.humidity, Some(34.8));
    assert!(last.dewpoint_f.is_some());
    assert!((last.rain_in - 0.05).abs() < 1e-9);
    assert_eq!(last.realtime_freq, Some(2.5));
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let (_tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(store.clone(), RetryPolicy::immediate(3)),
    );

    assert_eq!(
        scheduler.process_frame(&frame("0 FFC0 80 3 80", 0)).await,
        FrameOutcome::Malformed
    );
    assert_eq!(
        scheduler.process_frame(&frame("0 FFC0 80 3 80 0B 40 0 0 0 0 ZZ", 100)).await,
        FrameOutcome::Malformed
    );
    assert_eq!(
        scheduler.process_frame(&frame(TEMP_18F, 200)).await,
        FrameOutcome::Archived(UpsertOutcome::Created)
    );

    let stats = scheduler.stats();
    assert_eq!(stats.frames, 3);
    assert_eq!(stats.malformed, 2);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_upload_failure_does_not_block_archive() {
    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(RecordingUploader {
        fail: true,
        ..Default::default()
    });
    let (tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(store.clone(), RetryPolicy::immediate(3)),
    )
    .with_uploader(uploader.clone());

    tx.send(frame(TEMP_18F, 0)).await.unwrap();
    tx.send(frame(TEMP_18F, 2_500)).await.unwrap();
    drop(tx);

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.archived, 2);
    assert_eq!(uploader.records.lock().unwrap().len(), 2);

    let bucket = store.get(&BucketKey::for_timestamp(at(0))).await.unwrap();
    assert_eq!(bucket.field(ArchiveField::Temperature).unwrap().len(), 2);
}

#[tokio::test]
async fn test_archive_failure_does_not_stop_processing() {
    let uploader = Arc::new(RecordingUploader::default());
    let (tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(Arc::new(UnreachableStore), RetryPolicy::immediate(2)),
    )
    .with_uploader(uploader.clone());

    tx.send(frame(TEMP_18F, 0)).await.unwrap();
    tx.send(frame(HUMIDITY_34_8, 2_500)).await.unwrap();
    drop(tx);

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.archive_failures, 2);
    assert_eq!(stats.archived, 0);
    assert_eq!(uploader.records.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_shutdown_handle_stops_run() {
    let (tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(Arc::new(MemoryStore::new()), RetryPolicy::immediate(3)),
    );

    scheduler.shutdown_handle().trigger();
    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.frames, 0);
    assert!(tx.is_closed());
}

#[tokio::test]
async fn test_journal_sink_receives_readings() {
    let dir = tempfile::tempdir().unwrap();
    let sink = davisx_sinks::FsSink::new(dir.path()).unwrap();
    let (tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(Arc::new(MemoryStore::new()), RetryPolicy::immediate(3)),
    )
    .with_sink(Box::new(sink));

    tx.send(frame(TEMP_18F, 0)).await.unwrap();
    tx.send(frame("garbage", 1_000)).await.unwrap();
    drop(tx);
    scheduler.run().await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("readings.jsonl")).unwrap();
    assert_eq!(content.lines().count(), 1);
}

#[tokio::test]
async fn test_finished_uploads_are_reaped_during_backlog() {
    let uploader = Arc::new(RecordingUploader::default());
    let (_tx, rx) = create_frame_channel(4);
    let mut scheduler = Scheduler::new(
        rx,
        processor(),
        ArchiveWriter::new(Arc::new(MemoryStore::new()), RetryPolicy::immediate(3)),
    )
    .with_uploader(uploader.clone());

    for i in 0..10 {
        scheduler.process_frame(&frame(TEMP_18F, i * 2_500)).await;
        assert_eq!(scheduler.pending_uploads(), 1);

        // Let the spawned upload finish before the next frame
        for _ in 0..100 {
            if uploader.records.lock().unwrap().len() == i as usize + 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
    }
    assert_eq!(uploader.records.lock().unwrap().len(), 10);
    assert_eq!(scheduler.stats().uploads, 10);
}
