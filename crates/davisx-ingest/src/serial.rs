//! Line-oriented serial device driver
//!
//! Reads receiver output from a character device (or any file) that is
//! already configured for the receiver's line settings.

use crate::{clean_line, IngestError, IngestResult, StationDriver};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct SerialDriver {
    device: PathBuf,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
}

impl SerialDriver {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            reader: None,
            buf: Vec::with_capacity(128),
        }
    }

    pub fn device(&self) -> &std::path::Path {
        &self.device
    }
}

#[async_trait::async_trait]
impl StationDriver for SerialDriver {
    fn name(&self) -> &str {
        "serial"
    }

    async fn start(&mut self) -> IngestResult<()> {
        if self.reader.is_some() {
            return Err(IngestError::DriverError("already started".into()));
        }
        let file = File::open(&self.device).await.map_err(|e| {
            IngestError::CommunicationError(format!("{}: {}", self.device.display(), e))
        })?;
        self.reader = Some(BufReader::new(file));
        tracing::info!("Serial driver reading {}", self.device.display());
        Ok(())
    }

    async fn stop(&mut self) -> IngestResult<()> {
        self.reader = None;
        Ok(())
    }

    async fn get_frame(&mut self) -> IngestResult<String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| IngestError::DriverError("not active".into()))?;
        loop {
            self.buf.clear();
            if reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Err(IngestError::EndOfStream);
            }
            // Radio noise can corrupt bytes; the decoder rejects such lines
            let line = String::from_utf8_lossy(&self.buf);
            if let Some(frame) = clean_line(&line) {
                return Ok(frame.to_string());
            }
        }
    }

    fn is_active(&self) -> bool {
        self.reader.is_some()
    }
}
