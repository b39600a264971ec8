use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StationConfig {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    /// `serial`, `udp` or `simulator`
    pub driver: Option<String>,
    pub device: Option<String>,
    pub udp_bind: Option<String>,
    pub simulator_interval_ms: Option<u64>,
    pub queue_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RainConfig {
    /// Inches of rain per bucket tip
    pub bucket_size: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WindowsConfig {
    /// Interval between ISS transmissions
    pub sample_period_secs: Option<f64>,
    pub wind_short_secs: Option<f64>,
    pub wind_long_secs: Option<f64>,
    pub rain_hour_secs: Option<f64>,
    pub rain_day_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveConfig {
    pub database_url: Option<String>,
    pub max_attempts: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub backoff_offset_secs: Option<u64>,
    pub backoff_max_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadConfig {
    pub enabled: Option<bool>,
    pub station_id: Option<String>,
    pub password: Option<String>,
    pub realtime: Option<bool>,
    pub rtfreq: Option<f64>,
    /// Overrides the endpoint chosen from `realtime`
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SinksConfig {
    /// Directory for the JSON-lines reading journal
    pub fs_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogConfig {
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub station: Option<StationConfig>,
    pub ingest: Option<IngestConfig>,
    pub rain: Option<RainConfig>,
    pub windows: Option<WindowsConfig>,
    pub archive: Option<ArchiveConfig>,
    pub upload: Option<UploadConfig>,
    pub sinks: Option<SinksConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppConfig {
    /// Load configuration from DAVISX_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DAVISX_CONFIG").unwrap_or_else(|_| "davisx.toml".to_string());
        Self::load_from(path)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&s)?
        } else {
            AppConfig::default()
        };
        Ok(cfg)
    }

    /// Station identifier used as the archive partition (default "iss")
    pub fn station_id(&self) -> String {
        self.station
            .as_ref()
            .and_then(|s| s.id.clone())
            .unwrap_or_else(|| "iss".to_string())
    }

    /// Frame source (default simulator)
    pub fn driver(&self) -> String {
        self.ingest
            .as_ref()
            .and_then(|i| i.driver.clone())
            .unwrap_or_else(|| "simulator".to_string())
    }

    /// Serial device path (default /dev/ttyUSB0)
    pub fn device(&self) -> String {
        self.ingest
            .as_ref()
            .and_then(|i| i.device.clone())
            .unwrap_or_else(|| "/dev/ttyUSB0".to_string())
    }

    /// UDP bind address (default 0.0.0.0:5555)
    pub fn udp_bind(&self) -> String {
        self.ingest
            .as_ref()
            .and_then(|i| i.udp_bind.clone())
            .unwrap_or_else(|| "0.0.0.0:5555".to_string())
    }

    pub fn simulator_interval_ms(&self) -> u64 {
        self.ingest
            .as_ref()
            .and_then(|i| i.simulator_interval_ms)
            .unwrap_or(2500)
    }

    /// Frame channel capacity (default 64)
    pub fn queue_size(&self) -> usize {
        self.ingest.as_ref().and_then(|i| i.queue_size).unwrap_or(64)
    }

    pub fn rain_bucket_size(&self) -> f64 {
        self.rain.as_ref().and_then(|r| r.bucket_size).unwrap_or(0.01)
    }

    pub fn sample_period_secs(&self) -> f64 {
        self.windows
            .as_ref()
            .and_then(|w| w.sample_period_secs)
            .unwrap_or(2.5)
    }

    /// Short wind window for the 2 minute average (default 120 s)
    pub fn wind_short_secs(&self) -> f64 {
        self.windows
            .as_ref()
            .and_then(|w| w.wind_short_secs)
            .unwrap_or(120.0)
    }

    /// Long wind window for gusts and the 10 minute average (default 600 s)
    pub fn wind_long_secs(&self) -> f64 {
        self.windows
            .as_ref()
            .and_then(|w| w.wind_long_secs)
            .unwrap_or(600.0)
    }

    pub fn rain_hour_secs(&self) -> f64 {
        self.windows
            .as_ref()
            .and_then(|w| w.rain_hour_secs)
            .unwrap_or(3600.0)
    }

    pub fn rain_day_secs(&self) -> f64 {
        self.windows
            .as_ref()
            .and_then(|w| w.rain_day_secs)
            .unwrap_or(86400.0)
    }

    pub fn database_url(&self) -> Option<String> {
        self.archive.as_ref().and_then(|a| a.database_url.clone())
    }

    pub fn max_attempts(&self) -> u32 {
        self.archive.as_ref().and_then(|a| a.max_attempts).unwrap_or(16)
    }

    pub fn backoff_base_secs(&self) -> u64 {
        self.archive
            .as_ref()
            .and_then(|a| a.backoff_base_secs)
            .unwrap_or(1)
    }

    pub fn backoff_offset_secs(&self) -> u64 {
        self.archive
            .as_ref()
            .and_then(|a| a.backoff_offset_secs)
            .unwrap_or(15)
    }

    pub fn backoff_max_secs(&self) -> u64 {
        self.archive
            .as_ref()
            .and_then(|a| a.backoff_max_secs)
            .unwrap_or(900)
    }

    pub fn upload_enabled(&self) -> bool {
        self.upload.as_ref().and_then(|u| u.enabled).unwrap_or(false)
    }

    /// Realtime (rapid-fire) updates, on unless disabled
    pub fn upload_realtime(&self) -> bool {
        self.upload.as_ref().and_then(|u| u.realtime).unwrap_or(true)
    }

    pub fn upload_rtfreq(&self) -> f64 {
        self.upload.as_ref().and_then(|u| u.rtfreq).unwrap_or(2.5)
    }

    pub fn fs_dir(&self) -> Option<String> {
        self.sinks.as_ref().and_then(|s| s.fs_dir.clone())
    }

    pub fn log_json(&self) -> bool {
        self.log.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}
