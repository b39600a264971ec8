//! Rain tip counting
//!
//! The ISS reports rain as a 7-bit counter of bucket tips that counts up and
//! wraps back to zero after 127.

/// Highest value of the wrapping tip counter
pub const MAX_TIPS: u8 = 127;

/// Rainfall per bucket tip (inches) on the standard collector
pub const DEFAULT_BUCKET_SIZE: f64 = 0.01;

/// Converts raw counter values into tips since the previous value
#[derive(Debug, Clone)]
pub struct RainTipAccumulator {
    last: Option<u8>,
    bucket_size: f64,
}

impl RainTipAccumulator {
    pub fn new(bucket_size: f64) -> Self {
        Self {
            last: None,
            bucket_size,
        }
    }

    /// Record a raw counter value and return the tips since the last one
    ///
    /// The first value only establishes the baseline and yields zero.
    pub fn observe(&mut self, raw: u8) -> u32 {
        let cur = raw & MAX_TIPS;
        let delta = match self.last {
            None => 0,
            Some(prev) => tip_delta(prev, cur),
        };
        self.last = Some(cur);
        delta
    }

    /// Rainfall amount for a number of tips
    pub fn amount(&self, tips: u32) -> f64 {
        f64::from(tips) * self.bucket_size
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    /// Last raw counter value seen
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Forget the baseline; the next value yields zero again
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for RainTipAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}

/// Tips between two counter values, allowing for a single wrap
pub fn tip_delta(prev: u8, cur: u8) -> u32 {
    let (prev, cur) = (u32::from(prev), u32::from(cur));
    if cur >= prev {
        cur - prev
    } else {
        (u32::from(MAX_TIPS) - prev) + cur + 1
    }
}
