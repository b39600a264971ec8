//! Archive bucket document

use chrono::SecondsFormat;
use davisx_core::{BucketKey, Reading, SensorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Numeric fields kept with running statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArchiveField {
    #[serde(rename = "rssi")]
    Rssi,
    #[serde(rename = "windd")]
    WindDirection,
    #[serde(rename = "windv")]
    WindSpeed,
    #[serde(rename = "uv")]
    Uv,
    #[serde(rename = "solar")]
    Solar,
    #[serde(rename = "rain")]
    Rain,
    #[serde(rename = "rainsecs")]
    RainSeconds,
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "rh")]
    Humidity,
    #[serde(rename = "windgust")]
    WindGust,
    #[serde(rename = "soilleaf")]
    SoilLeaf,
    #[serde(rename = "vcap")]
    CapVoltage,
    #[serde(rename = "vsolar")]
    SolarVoltage,
    #[serde(rename = "fei")]
    Fei,
    #[serde(rename = "delta")]
    Delta,
}

impl ArchiveField {
    pub const ALL: [ArchiveField; 15] = [
        ArchiveField::Rssi,
        ArchiveField::WindDirection,
        ArchiveField::WindSpeed,
        ArchiveField::Uv,
        ArchiveField::Solar,
        ArchiveField::Rain,
        ArchiveField::RainSeconds,
        ArchiveField::Temperature,
        ArchiveField::Humidity,
        ArchiveField::WindGust,
        ArchiveField::SoilLeaf,
        ArchiveField::CapVoltage,
        ArchiveField::SolarVoltage,
        ArchiveField::Fei,
        ArchiveField::Delta,
    ];

    /// Field receiving the sensor slot value of a frame
    pub fn for_sensor(kind: SensorKind) -> Option<Self> {
        match kind {
            SensorKind::UvIndex => Some(ArchiveField::Uv),
            SensorKind::SolarIrradiation => Some(ArchiveField::Solar),
            SensorKind::RainTips => Some(ArchiveField::Rain),
            SensorKind::RainSeconds => Some(ArchiveField::RainSeconds),
            SensorKind::OutsideTemperature => Some(ArchiveField::Temperature),
            SensorKind::OutsideHumidity => Some(ArchiveField::Humidity),
            SensorKind::WindGust10m => Some(ArchiveField::WindGust),
            SensorKind::CapVoltage => Some(ArchiveField::CapVoltage),
            SensorKind::PanelVoltage => Some(ArchiveField::SolarVoltage),
            SensorKind::Unknown(_) => None,
        }
    }
}

/// Auxiliary fields kept without statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaField {
    Batt,
    Channel,
    Raw,
    Datetime,
}

impl MetaField {
    pub const ALL: [MetaField; 4] = [
        MetaField::Batt,
        MetaField::Channel,
        MetaField::Raw,
        MetaField::Datetime,
    ];
}

/// Numeric values present in a reading
pub fn numeric_values(reading: &Reading) -> Vec<(ArchiveField, f64)> {
    let mut values = vec![
        (ArchiveField::Rssi, f64::from(reading.rssi)),
        (ArchiveField::WindDirection, reading.wind_direction_deg),
        (ArchiveField::WindSpeed, reading.wind_speed_mph),
    ];
    if let (Some(field), Some(v)) = (ArchiveField::for_sensor(reading.sensor), reading.sensor_value) {
        values.push((field, v));
    }
    values
}

/// Meta values present in a reading
pub fn meta_values(reading: &Reading) -> Vec<(MetaField, Value)> {
    vec![
        (MetaField::Batt, Value::Bool(reading.battery_low)),
        (MetaField::Channel, Value::from(reading.channel)),
        (MetaField::Raw, Value::String(reading.payload_hex())),
        (MetaField::Datetime, observation_time(reading)),
    ]
}

fn observation_time(reading: &Reading) -> Value {
    Value::String(reading.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Samples of one numeric field
///
/// `values` and `times` are index aligned; the statistics always describe
/// the full `values` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSeries {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub values: Vec<f64>,
    pub times: Vec<f64>,
}

impl FieldSeries {
    pub fn push(&mut self, value: f64, offset: f64) {
        self.values.push(value);
        self.times.push(offset);
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.values.is_empty() {
            self.average = None;
            self.min = None;
            self.max = None;
            return;
        }
        let sum: f64 = self.values.iter().sum();
        self.average = Some(sum / self.values.len() as f64);
        self.min = Some(self.values.iter().copied().fold(f64::INFINITY, f64::min));
        self.max = Some(self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Samples of one auxiliary field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaSeries {
    pub values: Vec<Value>,
    pub times: Vec<f64>,
}

impl MetaSeries {
    pub fn push(&mut self, value: Value, offset: f64) {
        self.values.push(value);
        self.times.push(offset);
    }
}

/// Persisted ten minute bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveBucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub data: BTreeMap<ArchiveField, FieldSeries>,
    pub meta: BTreeMap<MetaField, MetaSeries>,
}

impl ArchiveBucket {
    /// Empty bucket with every field present
    pub fn empty(key: BucketKey) -> Self {
        Self {
            year: key.year,
            month: key.month,
            day: key.day,
            hour: key.hour,
            minute: key.minute,
            data: ArchiveField::ALL
                .iter()
                .map(|f| (*f, FieldSeries::default()))
                .collect(),
            meta: MetaField::ALL
                .iter()
                .map(|f| (*f, MetaSeries::default()))
                .collect(),
        }
    }

    /// New bucket seeded with its first reading
    pub fn from_reading(key: BucketKey, reading: &Reading, offset: f64) -> Self {
        let mut bucket = Self::empty(key);
        bucket.apply(reading, offset);
        bucket
    }

    pub fn key(&self) -> BucketKey {
        BucketKey {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
        }
    }

    /// Append the reading's present fields at `offset` seconds
    ///
    /// Absent fields are left untouched rather than zero filled.
    pub fn apply(&mut self, reading: &Reading, offset: f64) {
        for (field, value) in numeric_values(reading) {
            self.data.entry(field).or_default().push(value, offset);
        }
        for (field, value) in meta_values(reading) {
            self.meta.entry(field).or_default().push(value, offset);
        }
    }

    /// Whether this exact reading was already applied
    ///
    /// Matches on observation time, offset and raw payload, so a write that
    /// was persisted but not acknowledged is not appended twice on retry.
    pub fn contains_sample(&self, reading: &Reading, offset: f64) -> bool {
        let (Some(times), Some(raw)) = (
            self.meta.get(&MetaField::Datetime),
            self.meta.get(&MetaField::Raw),
        ) else {
            return false;
        };
        let when = observation_time(reading);
        let payload = Value::String(reading.payload_hex());

        times
            .values
            .iter()
            .zip(&times.times)
            .enumerate()
            .any(|(i, (v, t))| *v == when && *t == offset && raw.values.get(i) == Some(&payload))
    }

    pub fn field(&self, field: ArchiveField) -> Option<&FieldSeries> {
        self.data.get(&field)
    }

    /// Number of readings applied
    pub fn sample_count(&self) -> usize {
        self.meta
            .get(&MetaField::Datetime)
            .map(|m| m.values.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use davisx_core::{bucket_offset_seconds, FrameDecoder};

    fn at(m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, m, s).unwrap()
    }

    fn temp_frame(tenths_f: i16) -> String {
        let raw = (tenths_f * 16).to_be_bytes();
        format!("0 FFC0 80 4 80 {:X} {:X} 0 0 0 0 0", raw[0], raw[1])
    }

    fn temp_reading(ts: DateTime<Utc>, temp_f: i16) -> Reading {
        FrameDecoder::decode(&temp_frame(temp_f * 10), ts).unwrap()
    }

    #[test]
    fn test_new_bucket_seeds_present_fields() {
        let ts = at(3, 20);
        let reading = temp_reading(ts, 10);
        let key = BucketKey::for_timestamp(ts);
        let bucket = ArchiveBucket::from_reading(key, &reading, bucket_offset_seconds(ts));

        let temp = bucket.field(ArchiveField::Temperature).unwrap();
        assert_eq!(temp.values, vec![10.0]);
        assert_eq!(temp.times, vec![200.0]);
        assert_eq!((temp.average, temp.min, temp.max), (Some(10.0), Some(10.0), Some(10.0)));

        let uv = bucket.field(ArchiveField::Uv).unwrap();
        assert!(uv.is_empty());
        assert_eq!((uv.average, uv.min, uv.max), (None, None, None));

        assert_eq!(bucket.data.len(), 15);
        assert_eq!(bucket.meta.len(), 4);
        assert_eq!(bucket.sample_count(), 1);
        assert_eq!(bucket.key(), key);
    }

    #[test]
    fn test_statistics_follow_values() {
        let key = BucketKey::for_timestamp(at(0, 0));
        let mut bucket = ArchiveBucket::empty(key);
        for (i, t) in [10, 20, 30].into_iter().enumerate() {
            let ts = at(0, 0) + Duration::seconds(i as i64 * 10);
            bucket.apply(&temp_reading(ts, t), bucket_offset_seconds(ts));
        }

        let temp = bucket.field(ArchiveField::Temperature).unwrap();
        assert_eq!(temp.values, vec![10.0, 20.0, 30.0]);
        assert_eq!(temp.times, vec![0.0, 10.0, 20.0]);
        assert_eq!(temp.average, Some(20.0));
        assert_eq!(temp.min, Some(10.0));
        assert_eq!(temp.max, Some(30.0));

        // wind is in every frame
        assert_eq!(bucket.field(ArchiveField::WindSpeed).unwrap().values, vec![4.0; 3]);
    }

    #[test]
    fn test_values_and_times_stay_aligned() {
        let key = BucketKey::for_timestamp(at(0, 0));
        let mut bucket = ArchiveBucket::empty(key);
        bucket.apply(&temp_reading(at(0, 5), 50), 5.0);
        let uv = FrameDecoder::decode("0 FFC0 40 4 80 0 C0 0 0 0 0 0", at(0, 7)).unwrap();
        bucket.apply(&uv, 7.0);

        for series in bucket.data.values() {
            assert_eq!(series.values.len(), series.times.len());
        }
        for series in bucket.meta.values() {
            assert_eq!(series.values.len(), series.times.len());
        }
        assert_eq!(bucket.field(ArchiveField::Temperature).unwrap().len(), 1);
        assert_eq!(bucket.field(ArchiveField::Uv).unwrap().times, vec![7.0]);
        assert_eq!(bucket.field(ArchiveField::Rssi).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_sensor_only_archives_wind_and_meta() {
        let reading = FrameDecoder::decode("C FFC1 30 5 BF FF C1 8A F3 20 FF FF", at(1, 0)).unwrap();
        let bucket = ArchiveBucket::from_reading(BucketKey::for_timestamp(at(1, 0)), &reading, 60.0);

        let populated: Vec<ArchiveField> = bucket
            .data
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(f, _)| *f)
            .collect();
        assert_eq!(
            populated,
            vec![ArchiveField::Rssi, ArchiveField::WindDirection, ArchiveField::WindSpeed]
        );
        assert_eq!(
            bucket.meta[&MetaField::Raw].values,
            vec![Value::String("30 05 BF FF C1 8A F3 20 FF FF".into())]
        );
    }

    #[test]
    fn test_contains_sample() {
        let ts = at(4, 0);
        let reading = temp_reading(ts, 60);
        let mut bucket = ArchiveBucket::from_reading(BucketKey::for_timestamp(ts), &reading, 240.0);

        assert!(bucket.contains_sample(&reading, 240.0));

        let later = temp_reading(ts + Duration::seconds(3), 60);
        assert!(!bucket.contains_sample(&later, 243.0));
        bucket.apply(&later, 243.0);
        assert!(bucket.contains_sample(&later, 243.0));

        let same_time_other_payload = temp_reading(ts, 61);
        assert!(!bucket.contains_sample(&same_time_other_payload, 240.0));
    }

    #[test]
    fn test_document_shape() {
        let ts = at(2, 30);
        let bucket = ArchiveBucket::from_reading(BucketKey::for_timestamp(ts), &temp_reading(ts, 10), 150.0);
        let doc = serde_json::to_value(&bucket).unwrap();

        assert_eq!(doc["minute"], 0);
        assert_eq!(doc["data"]["temp"]["values"], serde_json::json!([10.0]));
        assert_eq!(doc["data"]["temp"]["average"], 10.0);
        assert!(doc["data"]["fei"]["average"].is_null());
        assert_eq!(doc["data"]["windd"]["times"], serde_json::json!([150.0]));
        assert_eq!(doc["meta"]["batt"]["values"], serde_json::json!([false]));
        assert_eq!(doc["meta"]["channel"]["values"], serde_json::json!([0]));
        assert_eq!(
            doc["meta"]["datetime"]["values"],
            serde_json::json!(["2024-03-01T12:02:30.000Z"])
        );

        let back: ArchiveBucket = serde_json::from_value(doc).unwrap();
        assert_eq!(back, bucket);
    }
}
