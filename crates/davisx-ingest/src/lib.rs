//! Frame sources for the ISS receiver
//!
//! A driver yields one text line per received radio frame. Drivers run in
//! their own task and hand lines to the processing loop through a bounded
//! channel, stamped with the wall-clock time of receipt.

pub mod serial;
pub mod simulator;
pub mod udp;

pub use serial::*;
pub use simulator::*;
pub use udp::*;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Driver error: {0}")]
    DriverError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Frame source reached end of stream")]
    EndOfStream,
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::CommunicationError(e.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Trait for all frame sources
#[async_trait::async_trait]
pub trait StationDriver: Send + Sync {
    /// Driver name/identifier
    fn name(&self) -> &str;

    /// Open the underlying source
    async fn start(&mut self) -> IngestResult<()>;

    /// Close the source and release its resources
    async fn stop(&mut self) -> IngestResult<()>;

    /// Next non-empty frame line, without line terminator
    async fn get_frame(&mut self) -> IngestResult<String>;

    /// Check if driver is currently active
    fn is_active(&self) -> bool;
}

/// One frame line with its time of receipt
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub line: String,
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn now(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            received_at: Utc::now(),
        }
    }
}

pub type FrameReceiver = mpsc::Receiver<RawFrame>;
pub type FrameSender = mpsc::Sender<RawFrame>;

/// Create a new frame channel with specified buffer size
pub fn create_frame_channel(buffer_size: usize) -> (FrameSender, FrameReceiver) {
    mpsc::channel(buffer_size.max(1))
}

/// Strip line terminators; `None` for lines carrying nothing
pub fn clean_line(line: &str) -> Option<&str> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Drive `driver` until its source ends or the receiver is dropped
///
/// Timeouts are not fatal; any other driver error stops the pump.
pub async fn pump_frames(mut driver: Box<dyn StationDriver>, tx: FrameSender) -> IngestResult<()> {
    driver.start().await?;
    info!("Driver {} started", driver.name());

    let result = loop {
        match driver.get_frame().await {
            Ok(line) => {
                debug!(driver = driver.name(), "Frame received: {}", line);
                if tx.send(RawFrame::now(line)).await.is_err() {
                    break Ok(());
                }
            }
            Err(IngestError::Timeout) => continue,
            Err(IngestError::EndOfStream) => {
                info!("Driver {} reached end of stream", driver.name());
                break Ok(());
            }
            Err(e) => {
                warn!("Driver {} failed: {}", driver.name(), e);
                break Err(e);
            }
        }
    };

    driver.stop().await?;
    info!("Driver {} stopped", driver.name());
    result
}
