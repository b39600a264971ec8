//! Short-horizon rollups over sliding windows

use chrono::NaiveDate;

use crate::types::Reading;
use crate::window::{SlidingWindow, WindowSettings};

/// Wind spans kept for gusts and averages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindSpan {
    TwoMinutes,
    TenMinutes,
}

/// Rain spans kept for totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RainSpan {
    Hour,
    Day,
}

/// Wind speed and direction from one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSample {
    pub speed_mph: f64,
    pub direction_deg: f64,
}

/// Sliding windows of wind and rain
///
/// Derived values are `None` while the relevant window is empty.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    wind_2m: SlidingWindow<WindSample>,
    wind_10m: SlidingWindow<WindSample>,
    rain_60m: SlidingWindow<u32>,
    rain_day: SlidingWindow<u32>,
    /// UTC date the daily window was last reset
    rain_day_date: Option<NaiveDate>,
}

impl WindowAggregator {
    pub fn new(settings: &WindowSettings) -> Self {
        let period = settings.sample_period_secs;
        Self {
            wind_2m: SlidingWindow::with_span(settings.wind_short_secs, period),
            wind_10m: SlidingWindow::with_span(settings.wind_long_secs, period),
            rain_60m: SlidingWindow::with_span(settings.rain_hour_secs, period),
            rain_day: SlidingWindow::with_span(settings.rain_day_secs, period),
            rain_day_date: None,
        }
    }

    /// Push one reading; `rain_tips` is the tip delta for rain frames
    pub fn push(&mut self, reading: &Reading, rain_tips: Option<u32>) {
        let sample = WindSample {
            speed_mph: reading.wind_speed_mph,
            direction_deg: reading.wind_direction_deg,
        };
        self.wind_2m.push(sample);
        self.wind_10m.push(sample);

        if let Some(tips) = rain_tips {
            let date = reading.timestamp.date_naive();
            match self.rain_day_date {
                Some(day) if day == date => {}
                Some(_) => {
                    self.rain_day.clear();
                    self.rain_day_date = Some(date);
                }
                None => self.rain_day_date = Some(date),
            }
            self.rain_60m.push(tips);
            self.rain_day.push(tips);
        }
    }

    fn wind(&self, span: WindSpan) -> &SlidingWindow<WindSample> {
        match span {
            WindSpan::TwoMinutes => &self.wind_2m,
            WindSpan::TenMinutes => &self.wind_10m,
        }
    }

    fn rain(&self, span: RainSpan) -> &SlidingWindow<u32> {
        match span {
            RainSpan::Hour => &self.rain_60m,
            RainSpan::Day => &self.rain_day,
        }
    }

    /// Sample with the highest speed, earliest one on ties
    fn gust_sample(&self, span: WindSpan) -> Option<WindSample> {
        self.wind(span)
            .iter()
            .fold(None, |best: Option<WindSample>, s| match best {
                Some(b) if b.speed_mph >= s.speed_mph => Some(b),
                _ => Some(*s),
            })
    }

    pub fn gust(&self, span: WindSpan) -> Option<f64> {
        self.gust_sample(span).map(|s| s.speed_mph)
    }

    /// Direction recorded alongside the gust
    pub fn gust_direction(&self, span: WindSpan) -> Option<f64> {
        self.gust_sample(span).map(|s| s.direction_deg)
    }

    pub fn avg_speed(&self, span: WindSpan) -> Option<f64> {
        mean(self.wind(span).iter().map(|s| s.speed_mph))
    }

    /// Arithmetic mean of the recorded directions
    pub fn avg_direction(&self, span: WindSpan) -> Option<f64> {
        mean(self.wind(span).iter().map(|s| s.direction_deg))
    }

    /// Sum of tip deltas currently held for `span`
    pub fn rain_tips(&self, span: RainSpan) -> u32 {
        self.rain(span).iter().sum()
    }

    pub fn wind_len(&self, span: WindSpan) -> usize {
        self.wind(span).len()
    }

    pub fn rain_len(&self, span: RainSpan) -> usize {
        self.rain(span).len()
    }

    pub fn rain_day_date(&self) -> Option<NaiveDate> {
        self.rain_day_date
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
