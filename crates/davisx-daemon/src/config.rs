//! Daemon configuration: TOML file with environment overrides

use anyhow::{bail, Context, Result};
use davisx_archive::RetryPolicy;
use davisx_config::AppConfig;
use davisx_core::{UploadSettings, WindowSettings, MIN_SAMPLE_PERIOD_SECS};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum DriverKind {
    Serial { device: PathBuf },
    Udp { bind: SocketAddr },
    Simulator { interval_ms: u64 },
}

/// Upload target, present only when uploads are enabled
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTarget {
    pub settings: UploadSettings,
    pub realtime: bool,
    /// Explicit endpoint overriding the realtime/standard choice
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Archive partition name
    pub station: String,

    pub driver: DriverKind,

    /// Frame channel capacity
    pub queue_size: usize,

    pub rain_bucket_size: f64,
    pub windows: WindowSettings,

    /// MySQL database connection URL; in-memory archive when unset
    pub database_url: Option<String>,
    pub retry: RetryPolicy,

    pub upload: Option<UploadTarget>,

    /// Reading journal directory
    pub fs_dir: Option<PathBuf>,

    pub log_json: bool,
}

impl DaemonConfig {
    /// Load DAVISX_CONFIG and apply environment overrides
    pub fn load() -> Result<Self> {
        let app = AppConfig::load().context("Failed to read configuration file")?;
        Self::from_app(&app, |key| env::var(key).ok())
    }

    /// Build from a parsed file, reading overrides through `var`
    ///
    /// Recognised overrides: DATABASE_URL, STATION_DRIVER, WU_ID, WU_PASSWORD.
    pub fn from_app(app: &AppConfig, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let driver_name = var("STATION_DRIVER").unwrap_or_else(|| app.driver());
        let driver = match driver_name.as_str() {
            "serial" => DriverKind::Serial {
                device: PathBuf::from(app.device()),
            },
            "udp" => DriverKind::Udp {
                bind: app
                    .udp_bind()
                    .parse::<SocketAddr>()
                    .with_context(|| format!("Invalid udp_bind {}", app.udp_bind()))?,
            },
            "simulator" => DriverKind::Simulator {
                interval_ms: app.simulator_interval_ms(),
            },
            other => bail!("Unknown driver: {}", other),
        };

        let windows = WindowSettings {
            sample_period_secs: app.sample_period_secs(),
            wind_short_secs: app.wind_short_secs(),
            wind_long_secs: app.wind_long_secs(),
            rain_hour_secs: app.rain_hour_secs(),
            rain_day_secs: app.rain_day_secs(),
        };
        check_windows(&windows)?;

        let upload_cfg = app.upload.clone().unwrap_or_default();
        let upload = if app.upload_enabled() {
            let station_id = var("WU_ID").or(upload_cfg.station_id);
            let password = var("WU_PASSWORD").or(upload_cfg.password);
            let (Some(station_id), Some(password)) = (station_id, password) else {
                bail!("Upload enabled but station_id/password are not set");
            };
            let realtime = app.upload_realtime();
            Some(UploadTarget {
                settings: UploadSettings {
                    station_id,
                    password,
                    realtime_freq: realtime.then(|| app.upload_rtfreq()),
                },
                realtime,
                url: upload_cfg.url,
            })
        } else {
            None
        };

        Ok(Self {
            station: app.station_id(),
            driver,
            queue_size: app.queue_size(),
            rain_bucket_size: app.rain_bucket_size(),
            windows,
            database_url: var("DATABASE_URL").or_else(|| app.database_url()),
            retry: RetryPolicy {
                max_attempts: app.max_attempts(),
                base_delay: Duration::from_secs(app.backoff_base_secs()),
                offset: Duration::from_secs(app.backoff_offset_secs()),
                max_delay: Duration::from_secs(app.backoff_max_secs()),
            },
            upload,
            fs_dir: app.fs_dir().map(PathBuf::from),
            log_json: app.log_json(),
        })
    }
}

fn check_windows(windows: &WindowSettings) -> Result<()> {
    let period = windows.sample_period_secs;
    if period.is_nan() || period < MIN_SAMPLE_PERIOD_SECS {
        bail!(
            "sample_period_secs must be at least {}, got {}",
            MIN_SAMPLE_PERIOD_SECS,
            period
        );
    }
    for (name, span) in [
        ("wind_short_secs", windows.wind_short_secs),
        ("wind_long_secs", windows.wind_long_secs),
        ("rain_hour_secs", windows.rain_hour_secs),
        ("rain_day_secs", windows.rain_day_secs),
    ] {
        if !span.is_finite() || span < period {
            bail!("{} must cover at least one sample period, got {}", name, span);
        }
    }
    Ok(())
}
