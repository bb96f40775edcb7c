//! Granule-based timing.
//!
//! Elapsed time comes straight from the container's granule position, never
//! from summed page durations, so the offset cannot drift from rounding.

use crate::constants::SAMPLE_RATE;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Converts a count of 48 kHz samples to a duration, exact to the nanosecond.
pub fn samples_to_duration(samples: u64) -> Duration {
    let rate = SAMPLE_RATE as u64;
    let secs = samples / rate;
    let nanos = (samples % rate) * NANOS_PER_SEC / rate;
    Duration::new(secs, nanos as u32)
}

/// Timing derived for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTiming {
    /// Audio carried by the page: `(g - g_prev) / 48000`
    pub page_duration: Duration,
    /// Position in the track after the page: `g / 48000`
    pub elapsed: Duration,
}

/// Tracks the last granule seen in the current track.
///
/// Starts at zero and never moves backwards. Pages without a granule
/// (`None`) keep the previous position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GranuleClock {
    last_granule: u64,
}

impl GranuleClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_granule(&self) -> u64 {
        self.last_granule
    }

    pub fn elapsed(&self) -> Duration {
        samples_to_duration(self.last_granule)
    }

    /// Folds a page's granule into the clock and returns its timing.
    pub fn advance(&mut self, granule: Option<u64>) -> PageTiming {
        let granule = granule.unwrap_or(self.last_granule).max(self.last_granule);
        let delta = granule - self.last_granule;
        self.last_granule = granule;

        PageTiming {
            page_duration: samples_to_duration(delta),
            elapsed: samples_to_duration(granule),
        }
    }
}
