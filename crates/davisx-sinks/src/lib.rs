use anyhow::Result;
#[cfg(feature = "wunderground")]
pub mod wunderground;

#[cfg(feature = "wunderground")]
pub use wunderground::*;

use davisx_core::{Reading, Sink};
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Journal of decoded readings, one JSON object per line
pub struct FsSink {
    file: PathBuf,
}

impl FsSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        let file = dir.join("readings.jsonl");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

#[async_trait::async_trait]
impl Sink for FsSink {
    async fn emit(&mut self, reading: &Reading) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)?;
        let line = serde_json::to_string(reading)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        Ok(())
    }
}
