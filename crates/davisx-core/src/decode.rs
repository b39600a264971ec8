//! Frame decoding
//!
//! A receiver line looks like `C FFC1 30 5 BF FF C1 8A F3 20 FF FF`: the
//! channel, the RSSI as a 16-bit two's complement value, then the ten ISS
//! payload bytes, all in hex.

use chrono::{DateTime, Utc};

use crate::types::{Frame, Reading, SensorKind, PAYLOAD_LEN};
use crate::units::round_to;

/// Tokens in a well-formed frame line
pub const FRAME_TOKENS: usize = 2 + PAYLOAD_LEN;

/// Solar irradiation scale for the 10-bit sensor reading
const SOLAR_SCALE: f64 = 1.757936;

/// A frame that could not be decoded (the MalformedFrame case)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: expected 12 tokens, found {found}")]
    TokenCount { found: usize },

    #[error("Malformed frame: token {index} is not hex: {token:?}")]
    InvalidToken { index: usize, token: String },
}

/// Turns receiver lines into readings
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Split a receiver line into its fixed fields
    pub fn parse_line(line: &str) -> Result<Frame, DecodeError> {
        let tokens: Vec<&str> = line
            .trim_end_matches(['\r', '\n'])
            .split(' ')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() != FRAME_TOKENS {
            return Err(DecodeError::TokenCount {
                found: tokens.len(),
            });
        }

        let channel = parse_hex::<u8>(&tokens, 0)?;
        let rssi_raw = parse_hex::<u16>(&tokens, 1)?;
        let mut payload = [0u8; PAYLOAD_LEN];
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte = parse_hex::<u8>(&tokens, i + 2)?;
        }

        Ok(Frame {
            channel,
            rssi_raw,
            payload,
        })
    }

    /// Decode a parsed frame received at `timestamp`
    pub fn decode_frame(frame: &Frame, timestamp: DateTime<Utc>) -> Reading {
        let header = frame.payload[0];
        let sensor = SensorKind::from_id(header >> 4);
        let sensor_bytes = frame.sensor_bytes();

        Reading {
            timestamp,
            channel: frame.channel,
            rssi: frame.signed_rssi(),
            sensor,
            sensor_value: sensor.decode(sensor_bytes),
            sensor_bytes,
            wind_speed_mph: f64::from(frame.payload[1]),
            wind_direction_deg: round_to(linear_map(f64::from(frame.payload[2]), 0.0, 255.0, 0.0, 359.0), 1),
            battery_low: header & 0x8 == 0x8,
            iss_id: header & 0x7,
            payload: frame.payload,
        }
    }

    /// Parse and decode one receiver line
    pub fn decode(line: &str, timestamp: DateTime<Utc>) -> Result<Reading, DecodeError> {
        let frame = Self::parse_line(line)?;
        Ok(Self::decode_frame(&frame, timestamp))
    }
}

impl SensorKind {
    /// Decode the two sensor bytes for this quantity
    pub fn decode(&self, bytes: [u8; 2]) -> Option<f64> {
        let [b0, b1] = bytes;
        let ten_bit = f64::from((u32::from(b0) << 8) + (u32::from(b1) >> 6));

        match self {
            SensorKind::OutsideTemperature => {
                Some(round_to(f64::from(i16::from_be_bytes(bytes)) / 160.0, 2))
            }
            SensorKind::UvIndex => Some(round_to(ten_bit / 50.0, 2)),
            SensorKind::SolarIrradiation => Some(round_to(ten_bit * SOLAR_SCALE, 2)),
            SensorKind::WindGust10m => Some(f64::from(b0)),
            SensorKind::OutsideHumidity => {
                let raw = ((u32::from(b1) >> 4) << 8) + u32::from(b0);
                Some(round_to(f64::from(raw) / 10.0, 1))
            }
            SensorKind::RainTips | SensorKind::RainSeconds => Some(f64::from(b0)),
            SensorKind::CapVoltage | SensorKind::PanelVoltage | SensorKind::Unknown(_) => None,
        }
    }
}

fn parse_hex<T>(tokens: &[&str], index: usize) -> Result<T, DecodeError>
where
    T: FromHex,
{
    T::from_hex(tokens[index]).ok_or_else(|| DecodeError::InvalidToken {
        index,
        token: tokens[index].to_string(),
    })
}

trait FromHex: Sized {
    fn from_hex(s: &str) -> Option<Self>;
}

impl FromHex for u8 {
    fn from_hex(s: &str) -> Option<Self> {
        u8::from_str_radix(s, 16).ok()
    }
}

impl FromHex for u16 {
    fn from_hex(s: &str) -> Option<Self> {
        u16::from_str_radix(s, 16).ok()
    }
}

/// Min-max linear interpolation of `x` from one range into another
fn linear_map(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}
