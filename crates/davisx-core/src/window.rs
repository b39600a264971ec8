//! Fixed capacity sliding windows

/// Seconds between ISS transmissions
pub const SAMPLE_PERIOD_SECS: f64 = 2.5;

/// Shortest sample period accepted from configuration
pub const MIN_SAMPLE_PERIOD_SECS: f64 = 0.1;

/// Upper bound on slots per window
pub const MAX_WINDOW_SLOTS: usize = 1 << 20;

/// Spans (seconds) of the windows kept for the upload record
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub sample_period_secs: f64,
    pub wind_short_secs: f64,
    pub wind_long_secs: f64,
    pub rain_hour_secs: f64,
    pub rain_day_secs: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            sample_period_secs: SAMPLE_PERIOD_SECS,
            wind_short_secs: 120.0,
            wind_long_secs: 600.0,
            rain_hour_secs: 3600.0,
            rain_day_secs: 86400.0,
        }
    }
}

/// Ring buffer holding the most recent `capacity` pushes
///
/// Slots are allocated once; when full, each push overwrites the oldest
/// entry at the write cursor.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    slots: Vec<T>,
    cursor: usize,
    capacity: usize,
    span_secs: f64,
}

impl<T: Copy> SlidingWindow<T> {
    /// Window holding `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
            span_secs: 0.0,
        }
    }

    /// Window covering `span_secs` of samples arriving every `sample_period_secs`
    ///
    /// The slot count is clamped to `1..=MAX_WINDOW_SLOTS`.
    pub fn with_span(span_secs: f64, sample_period_secs: f64) -> Self {
        let capacity = ((span_secs / sample_period_secs) as usize).min(MAX_WINDOW_SLOTS);
        Self {
            span_secs,
            ..Self::new(capacity)
        }
    }

    pub fn push(&mut self, value: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.cursor] = value;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Entries oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = if self.slots.len() < self.capacity {
            (&self.slots[..0], &self.slots[..])
        } else {
            self.slots.split_at(self.cursor)
        };
        older.iter().chain(newer.iter())
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (self.cursor + self.capacity - 1) % self.capacity;
        self.slots.get(idx)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn span_secs(&self) -> f64 {
        self.span_secs
    }
}
