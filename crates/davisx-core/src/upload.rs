//! Weather Underground upload record
//!
//! The record is rebuilt from the sliding windows for every frame. The
//! service expects temperature and humidity on every update, so the last
//! values seen are carried forward between frames.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rollups::{RainSpan, WindSpan, WindowAggregator};
use crate::types::Reading;
use crate::units::dewpoint_f;

/// Value sent as `softwaretype`
pub const SOFTWARE_TYPE: &str = concat!("davisx-", env!("CARGO_PKG_VERSION"));

/// Station credentials and update mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSettings {
    pub station_id: String,
    pub password: String,
    /// Rapid-fire update frequency in seconds, `None` for standard updates
    pub realtime_freq: Option<f64>,
}

/// One upload parameter set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub station_id: String,
    pub password: String,
    pub realtime_freq: Option<f64>,
    pub date_utc: DateTime<Utc>,
    pub wind_dir: f64,
    pub wind_speed_mph: f64,
    pub wind_gust_mph: f64,
    pub wind_gust_dir: f64,
    pub wind_speed_avg_2m: f64,
    pub wind_dir_avg_2m: f64,
    pub wind_gust_mph_10m: f64,
    pub wind_gust_dir_10m: f64,
    pub temp_f: Option<f64>,
    pub humidity: Option<f64>,
    pub dewpoint_f: Option<f64>,
    /// Rain over the last hour (inches)
    pub rain_in: f64,
    /// Rain since midnight UTC (inches)
    pub daily_rain_in: f64,
}

impl UploadRecord {
    /// Query parameters in the order the service documents them
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ID", self.station_id.clone()),
            ("PASSWORD", self.password.clone()),
            ("softwaretype", SOFTWARE_TYPE.to_string()),
            ("action", "updateraw".to_string()),
        ];
        if let Some(freq) = self.realtime_freq {
            params.push(("realtime", "1".to_string()));
            params.push(("rtfreq", freq.to_string()));
        }
        params.push((
            "dateutc",
            self.date_utc.format("%Y-%m-%d %H:%M:%S").to_string(),
        ));
        params.extend([
            ("winddir", self.wind_dir.to_string()),
            ("windspeedmph", self.wind_speed_mph.to_string()),
            ("windgustmph", self.wind_gust_mph.to_string()),
            ("windgustdir", self.wind_gust_dir.to_string()),
            ("windspdmph_avg2m", self.wind_speed_avg_2m.to_string()),
            ("winddir_avg2m", self.wind_dir_avg_2m.to_string()),
            ("windgustmph_10m", self.wind_gust_mph_10m.to_string()),
            ("windgustdir_10m", self.wind_gust_dir_10m.to_string()),
        ]);
        if let Some(t) = self.temp_f {
            params.push(("tempf", t.to_string()));
        }
        if let Some(h) = self.humidity {
            params.push(("humidity", h.to_string()));
        }
        if let Some(d) = self.dewpoint_f {
            params.push(("dewptf", d.to_string()));
        }
        params.push(("rainin", self.rain_in.to_string()));
        params.push(("dailyrain", self.daily_rain_in.to_string()));
        params
    }
}

/// Builds upload records, remembering the last temperature and humidity
#[derive(Debug, Clone)]
pub struct UploadRecordBuilder {
    settings: UploadSettings,
    last_temp_f: Option<f64>,
    last_humidity: Option<f64>,
}

impl UploadRecordBuilder {
    pub fn new(settings: UploadSettings) -> Self {
        Self {
            settings,
            last_temp_f: None,
            last_humidity: None,
        }
    }

    /// Build the record for `reading`
    ///
    /// The reading must already have been pushed into `windows`; `None` is
    /// returned while the wind windows are still empty.
    pub fn build(
        &mut self,
        reading: &Reading,
        windows: &WindowAggregator,
        rain_amount: impl Fn(u32) -> f64,
    ) -> Option<UploadRecord> {
        if let Some(t) = reading.temperature_f() {
            self.last_temp_f = Some(t);
        }
        if let Some(h) = reading.humidity() {
            self.last_humidity = Some(h);
        }

        let dewpoint = match (self.last_temp_f, self.last_humidity) {
            (Some(t), Some(h)) => dewpoint_f(t, h),
            _ => None,
        };

        Some(UploadRecord {
            station_id: self.settings.station_id.clone(),
            password: self.settings.password.clone(),
            realtime_freq: self.settings.realtime_freq,
            date_utc: reading.timestamp,
            wind_dir: reading.wind_direction_deg,
            wind_speed_mph: reading.wind_speed_mph,
            wind_gust_mph: windows.gust(WindSpan::TwoMinutes)?,
            wind_gust_dir: windows.gust_direction(WindSpan::TwoMinutes)?,
            wind_speed_avg_2m: windows.avg_speed(WindSpan::TwoMinutes)?,
            wind_dir_avg_2m: windows.avg_direction(WindSpan::TwoMinutes)?,
            wind_gust_mph_10m: windows.gust(WindSpan::TenMinutes)?,
            wind_gust_dir_10m: windows.gust_direction(WindSpan::TenMinutes)?,
            temp_f: self.last_temp_f,
            humidity: self.last_humidity,
            dewpoint_f: dewpoint,
            rain_in: rain_amount(windows.rain_tips(RainSpan::Hour)),
            daily_rain_in: rain_amount(windows.rain_tips(RainSpan::Day)),
        })
    }

    pub fn last_temp_f(&self) -> Option<f64> {
        self.last_temp_f
    }

    pub fn last_humidity(&self) -> Option<f64> {
        self.last_humidity
    }
}
