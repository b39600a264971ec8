//! Simulated ISS receiver for dry runs

use crate::{IngestError, IngestResult, StationDriver};
use tokio::time::{sleep, Duration};

/// Sensor slots in the order the simulator cycles through them
const SENSOR_CYCLE: [u8; 6] = [8, 10, 14, 4, 6, 9];

/// Simulator driver that generates well-formed receiver lines
pub struct SimulatorDriver {
    interval: Duration,
    active: bool,
    sequence: u32,
    rain_counter: u8,
    limit: Option<u32>,
}

impl SimulatorDriver {
    /// Create a new simulator emitting one frame every `interval_ms`
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            active: false,
            sequence: 0,
            rain_counter: 0,
            limit: None,
        }
    }

    /// Stop with end-of-stream after `frames` frames
    pub fn with_limit(mut self, frames: u32) -> Self {
        self.limit = Some(frames);
        self
    }

    fn generate_line(&mut self) -> String {
        let n = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let id = SENSOR_CYCLE[n as usize % SENSOR_CYCLE.len()];
        let wind = 3 + (n % 5) as u8;
        let direction = (n.wrapping_mul(37) % 256) as u8;

        let sensor = match id {
            8 => {
                let tenths_f = 650 + (n % 20) as i16;
                (tenths_f * 16).to_be_bytes()
            }
            10 => {
                let raw = 550 + (n % 50) as u16;
                [(raw & 0xFF) as u8, (((raw >> 8) & 0x0F) as u8) << 4]
            }
            14 => {
                self.rain_counter = (self.rain_counter + (n % 2) as u8) & 0x7F;
                [self.rain_counter, 0]
            }
            9 => [wind + 4, 0],
            _ => [0, ((n % 4) as u8) << 6],
        };

        let payload = [id << 4, wind, direction, sensor[0], sensor[1], 0, 0, 0, 0, 0];
        let rssi = 0xFFC0u16 - (n % 16) as u16;

        let mut tokens = vec![format!("{:X}", 0), format!("{:X}", rssi)];
        tokens.extend(payload.iter().map(|b| format!("{:X}", b)));
        tokens.join(" ")
    }
}

#[async_trait::async_trait]
impl StationDriver for SimulatorDriver {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn start(&mut self) -> IngestResult<()> {
        if self.active {
            return Err(IngestError::DriverError(
                "Driver already started".to_string(),
            ));
        }
        self.active = true;
        tracing::info!("Simulator driver started with {:?} interval", self.interval);
        Ok(())
    }

    async fn stop(&mut self) -> IngestResult<()> {
        if !self.active {
            return Err(IngestError::DriverError(
                "Driver not started".to_string(),
            ));
        }
        self.active = false;
        tracing::info!("Simulator driver stopped");
        Ok(())
    }

    async fn get_frame(&mut self) -> IngestResult<String> {
        if !self.active {
            return Err(IngestError::DriverError("Driver not active".to_string()));
        }
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(IngestError::EndOfStream);
        }

        if !self.interval.is_zero() {
            sleep(self.interval).await;
        }

        Ok(self.generate_line())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
