//! Frame processing loop

use anyhow::Result;
use davisx_archive::{ArchiveWriter, UpsertOutcome};
use davisx_core::{FrameDecoder, Sink, StationProcessor, Uploader};
use davisx_ingest::{FrameReceiver, RawFrame};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Malformed,
    Archived(UpsertOutcome),
    ArchiveFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames: u64,
    pub malformed: u64,
    pub archived: u64,
    pub archive_failures: u64,
    pub uploads: u64,
}

/// Requests a running scheduler to stop
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Scheduler pulls frames off the channel and runs each through decode,
/// the rolling windows, upload and the archive, one at a time
pub struct Scheduler {
    frames: FrameReceiver,
    processor: StationProcessor,
    writer: ArchiveWriter,
    uploader: Option<Arc<dyn Uploader>>,
    sinks: Vec<Box<dyn Sink>>,
    uploads: JoinSet<()>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(frames: FrameReceiver, processor: StationProcessor, writer: ArchiveWriter) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            frames,
            processor,
            writer,
            uploader: None,
            sinks: Vec::new(),
            uploads: JoinSet::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            stats: SchedulerStats::default(),
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn processor(&self) -> &StationProcessor {
        &self.processor
    }

    /// Upload tasks spawned and not yet reaped
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Run until the frame source closes or shutdown is requested
    pub async fn run(&mut self) -> Result<SchedulerStats> {
        info!("Scheduler started");
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Shutdown requested");
                    break;
                }
                frame = self.frames.recv() => match frame {
                    Some(frame) => {
                        self.process_frame(&frame).await;
                    }
                    None => {
                        info!("Frame source closed");
                        break;
                    }
                },
                Some(joined) = self.uploads.join_next(), if !self.uploads.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Upload task ended abnormally: {}", e);
                    }
                }
            }
        }

        self.stop().await;
        Ok(self.stats)
    }

    /// Decode one frame and feed it to every destination
    ///
    /// Upload and archive failures are logged and do not affect each other.
    pub async fn process_frame(&mut self, frame: &RawFrame) -> FrameOutcome {
        self.stats.frames += 1;
        self.reap_uploads();

        let reading = match FrameDecoder::decode(&frame.line, frame.received_at) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(line = %frame.line, "Dropping frame: {}", e);
                return FrameOutcome::Malformed;
            }
        };
        if !reading.sensor.is_known() {
            debug!("Frame carries {}", reading.sensor);
        }

        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(&reading).await {
                warn!("Reading sink failed: {:#}", e);
            }
        }

        if let (Some(record), Some(uploader)) = (self.processor.observe(&reading), &self.uploader) {
            self.stats.uploads += 1;
            let uploader = Arc::clone(uploader);
            self.uploads.spawn(async move {
                if let Err(e) = uploader.upload(&record).await {
                    warn!("Upload failed: {:#}", e);
                }
            });
        }

        match self.writer.upsert(&reading).await {
            Ok(outcome) => {
                self.stats.archived += 1;
                FrameOutcome::Archived(outcome)
            }
            Err(e) => {
                self.stats.archive_failures += 1;
                error!(
                    "Archive write dropped for reading at {}: {}",
                    reading.timestamp, e
                );
                FrameOutcome::ArchiveFailed
            }
        }
    }

    fn reap_uploads(&mut self) {
        while let Some(joined) = self.uploads.try_join_next() {
            if let Err(e) = joined {
                warn!("Upload task ended abnormally: {}", e);
            }
        }
    }

    /// Stop accepting frames and wait for in-flight uploads
    pub async fn stop(&mut self) {
        info!("Stopping scheduler...");
        self.frames.close();

        while let Some(joined) = self.uploads.join_next().await {
            if let Err(e) = joined {
                warn!("Upload task ended abnormally: {}", e);
            }
        }

        info!(
            frames = self.stats.frames,
            malformed = self.stats.malformed,
            archived = self.stats.archived,
            archive_failures = self.stats.archive_failures,
            "Scheduler stopped"
        );
    }
}
