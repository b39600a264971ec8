use anyhow::Result;

use crate::rain::RainTipAccumulator;
use crate::rollups::WindowAggregator;
use crate::types::Reading;
use crate::upload::{UploadRecord, UploadRecordBuilder, UploadSettings};
use crate::window::WindowSettings;

/// Destination for every decoded reading
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn emit(&mut self, reading: &Reading) -> Result<()>;
}

/// Transport for upload records
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, record: &UploadRecord) -> Result<()>;
}

/// Per-station processing state: rain baseline, windows and the
/// carried-forward upload values
///
/// Readings must be observed in arrival order from a single task.
#[derive(Debug, Clone)]
pub struct StationProcessor {
    rain: RainTipAccumulator,
    windows: WindowAggregator,
    uploads: UploadRecordBuilder,
}

impl StationProcessor {
    pub fn new(windows: &WindowSettings, rain_bucket_size: f64, upload: UploadSettings) -> Self {
        Self {
            rain: RainTipAccumulator::new(rain_bucket_size),
            windows: WindowAggregator::new(windows),
            uploads: UploadRecordBuilder::new(upload),
        }
    }

    /// Fold one reading into the windows and build the upload record
    pub fn observe(&mut self, reading: &Reading) -> Option<UploadRecord> {
        let rain_tips = reading.rain_counter().map(|raw| self.rain.observe(raw));
        self.windows.push(reading, rain_tips);

        let rain = &self.rain;
        self.uploads
            .build(reading, &self.windows, |tips| rain.amount(tips))
    }

    pub fn windows(&self) -> &WindowAggregator {
        &self.windows
    }

    pub fn rain(&self) -> &RainTipAccumulator {
        &self.rain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FrameDecoder;
    use crate::rollups::RainSpan;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn processor() -> StationProcessor {
        StationProcessor::new(
            &WindowSettings::default(),
            0.01,
            UploadSettings {
                station_id: "KXX123".into(),
                password: "pw".into(),
                realtime_freq: None,
            },
        )
    }

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn rain_frame(counter: u8) -> String {
        format!("0 FFC0 E0 3 80 {:X} 0 0 0 0 0 0", counter)
    }

    #[test]
    fn test_rain_counter_becomes_rainfall() {
        let mut p = processor();
        let mut last = None;
        for (i, counter) in [120u8, 125, 2, 10].into_iter().enumerate() {
            let reading = FrameDecoder::decode(&rain_frame(counter), ts(i as i64 * 10)).unwrap();
            last = p.observe(&reading);
        }

        assert_eq!(p.windows().rain_tips(RainSpan::Hour), 18);
        let rec = last.unwrap();
        assert!((rec.rain_in - 0.18).abs() < 1e-9);
        assert!((rec.daily_rain_in - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_non_rain_frames_leave_rain_untouched() {
        let mut p = processor();
        let reading = FrameDecoder::decode("0 FFC0 80 3 80 0B 40 0 0 0 0 0", ts(0)).unwrap();
        let rec = p.observe(&reading).unwrap();

        assert_eq!(p.rain().last(), None);
        assert_eq!(rec.temp_f, Some(18.0));
        assert_eq!(rec.wind_speed_mph, 3.0);
        assert_eq!(rec.rain_in, 0.0);
    }
}
