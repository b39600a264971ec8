//! Core data types for decoded radio frames

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes in the ISS payload carried by every frame
pub const PAYLOAD_LEN: usize = 10;

/// Width of one archive bucket in minutes
pub const BUCKET_MINUTES: u32 = 10;

/// One radio transmission split into its fixed fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Radio channel the packet was heard on
    pub channel: u8,

    /// RSSI exactly as the receiver printed it (16-bit two's complement)
    pub rssi_raw: u16,

    /// ISS payload bytes 0..9
    pub payload: [u8; PAYLOAD_LEN],
}

impl Frame {
    /// Signal strength as a signed value
    pub fn signed_rssi(&self) -> i16 {
        let raw = i32::from(self.rssi_raw);
        let value = if raw & 0x8000 == 0x8000 {
            -((raw ^ 0xFFFF) + 1)
        } else {
            raw
        };
        // value is always within -32768..=32767
        value as i16
    }

    /// The two sensor-specific bytes (payload[3..5])
    pub fn sensor_bytes(&self) -> [u8; 2] {
        [self.payload[3], self.payload[4]]
    }
}

/// Physical quantity carried in the sensor slot of a frame
///
/// The ISS transmits one quantity per packet, selected by the high nibble of
/// payload byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    CapVoltage,
    UvIndex,
    RainSeconds,
    SolarIrradiation,
    PanelVoltage,
    OutsideTemperature,
    WindGust10m,
    OutsideHumidity,
    RainTips,
    Unknown(u8),
}

impl SensorKind {
    pub fn from_id(id: u8) -> Self {
        match id {
            2 => SensorKind::CapVoltage,
            4 => SensorKind::UvIndex,
            5 => SensorKind::RainSeconds,
            6 => SensorKind::SolarIrradiation,
            7 => SensorKind::PanelVoltage,
            8 => SensorKind::OutsideTemperature,
            9 => SensorKind::WindGust10m,
            10 => SensorKind::OutsideHumidity,
            14 => SensorKind::RainTips,
            other => SensorKind::Unknown(other),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            SensorKind::CapVoltage => 2,
            SensorKind::UvIndex => 4,
            SensorKind::RainSeconds => 5,
            SensorKind::SolarIrradiation => 6,
            SensorKind::PanelVoltage => 7,
            SensorKind::OutsideTemperature => 8,
            SensorKind::WindGust10m => 9,
            SensorKind::OutsideHumidity => 10,
            SensorKind::RainTips => 14,
            SensorKind::Unknown(id) => *id,
        }
    }

    /// Sensor name, `None` for ids outside the table
    pub fn name(&self) -> Option<&'static str> {
        match self {
            SensorKind::CapVoltage => Some("cap_voltage"),
            SensorKind::UvIndex => Some("uv_index"),
            SensorKind::RainSeconds => Some("rain_secs"),
            SensorKind::SolarIrradiation => Some("solar_irradiation"),
            SensorKind::PanelVoltage => Some("panel_voltage"),
            SensorKind::OutsideTemperature => Some("outside_temperature"),
            SensorKind::WindGust10m => Some("10m_wind_gust"),
            SensorKind::OutsideHumidity => Some("outside_humidity"),
            SensorKind::RainTips => Some("rain_tips"),
            SensorKind::Unknown(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SensorKind::Unknown(_))
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown (0x{:02x})", self.id()),
        }
    }
}

/// One decoded observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Time the frame was received
    pub timestamp: DateTime<Utc>,

    pub channel: u8,
    pub rssi: i16,

    /// Quantity carried by this frame
    pub sensor: SensorKind,

    /// Decoded value for `sensor`, absent when the sensor has no decoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_value: Option<f64>,

    /// The undecoded sensor bytes
    pub sensor_bytes: [u8; 2],

    /// Every frame carries current wind
    pub wind_speed_mph: f64,
    pub wind_direction_deg: f64,

    pub battery_low: bool,

    /// Originating station index
    pub iss_id: u8,

    /// Full ISS payload as received
    pub payload: [u8; PAYLOAD_LEN],
}

impl Reading {
    /// Value of the given quantity if this frame carries it
    pub fn value_of(&self, kind: SensorKind) -> Option<f64> {
        if self.sensor == kind {
            self.sensor_value
        } else {
            None
        }
    }

    pub fn temperature_f(&self) -> Option<f64> {
        self.value_of(SensorKind::OutsideTemperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.value_of(SensorKind::OutsideHumidity)
    }

    /// Raw wrapping rain tip counter
    pub fn rain_counter(&self) -> Option<u8> {
        self.value_of(SensorKind::RainTips).map(|v| v as u8)
    }

    /// Payload rendered as space separated hex bytes
    pub fn payload_hex(&self) -> String {
        self.payload
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Identity of a ten minute archive bucket (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    /// One of 0, 10, 20, 30, 40, 50
    pub minute: u32,
}

impl BucketKey {
    /// Bucket containing `ts`: minute floored to a multiple of ten
    pub fn for_timestamp(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            minute: BUCKET_MINUTES * (ts.minute() / BUCKET_MINUTES),
        }
    }

    /// Bucket start instant (`HH:MM:00`)
    pub fn start(&self) -> Option<DateTime<Utc>> {
        let naive = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.minute, 0)?;
        Some(Utc.from_utc_datetime(&naive))
    }

    /// Offset of `ts` from the start of its own bucket
    pub fn offset_seconds(ts: DateTime<Utc>) -> f64 {
        bucket_offset_seconds(ts)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// Seconds elapsed between the start of the bucket containing `ts` and `ts`
pub fn bucket_offset_seconds(ts: DateTime<Utc>) -> f64 {
    let whole = (ts.minute() % BUCKET_MINUTES) * 60 + ts.second();
    f64::from(whole) + f64::from(ts.nanosecond()) / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap() + chrono::Duration::milliseconds(ms as i64)
    }

    #[test]
    fn test_signed_rssi() {
        let mut frame = Frame {
            channel: 0,
            rssi_raw: 0x8000,
            payload: [0; PAYLOAD_LEN],
        };
        assert_eq!(frame.signed_rssi(), -32768);

        frame.rssi_raw = 0x0001;
        assert_eq!(frame.signed_rssi(), 1);

        frame.rssi_raw = 0xFFC1;
        assert_eq!(frame.signed_rssi(), -63);

        frame.rssi_raw = 0xFFFF;
        assert_eq!(frame.signed_rssi(), -1);
    }

    #[test]
    fn test_sensor_kind_table() {
        assert_eq!(SensorKind::from_id(8), SensorKind::OutsideTemperature);
        assert_eq!(SensorKind::from_id(14), SensorKind::RainTips);
        assert_eq!(SensorKind::from_id(3), SensorKind::Unknown(3));
        assert_eq!(SensorKind::from_id(9).id(), 9);
        assert!(!SensorKind::from_id(1).is_known());
    }

    #[test]
    fn test_sensor_kind_display() {
        assert_eq!(SensorKind::OutsideHumidity.to_string(), "outside_humidity");
        assert_eq!(SensorKind::Unknown(0x0c).to_string(), "Unknown (0x0c)");
    }

    #[test]
    fn test_bucket_boundary() {
        let before = at(12, 9, 59, 999);
        let key = BucketKey::for_timestamp(before);
        assert_eq!((key.hour, key.minute), (12, 0));
        assert!((bucket_offset_seconds(before) - 599.999).abs() < 1e-6);

        let on = at(12, 10, 0, 0);
        let key = BucketKey::for_timestamp(on);
        assert_eq!((key.hour, key.minute), (12, 10));
        assert_eq!(bucket_offset_seconds(on), 0.0);
    }

    #[test]
    fn test_bucket_start() {
        let key = BucketKey::for_timestamp(at(23, 57, 3, 0));
        assert_eq!(key.start(), Some(at(23, 50, 0, 0)));
        insta::assert_snapshot!(key.to_string(), @"2024-03-01 23:50");
    }

    #[test]
    fn test_bucket_start_invalid_key() {
        let key = BucketKey {
            year: 2024,
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
        };
        assert_eq!(key.start(), None);
    }
}
