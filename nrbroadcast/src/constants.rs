//! Fixed parameters of the broadcast engine.

use std::time::Duration;

/// Granule rate of Ogg/Opus streams. Every granule delta is a count of
/// 48 kHz samples, whatever the source rate was.
pub const SAMPLE_RATE: u32 = 48_000;

/// Nominal Opus frame length; one page is requested per interval.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Delay before polling the schedule again when nothing is scheduled
pub const IDLE_POLL_MS: u64 = 1_000;

/// Delay after a failed schedule lookup, track acquisition or header parse
pub const BACKOFF_MS: u64 = 1_000;

/// Samples buffered per sink for slow subscribers
pub const SINK_CAPACITY: usize = 256;

/// Number of lock shards in each live registry
pub const REGISTRY_SHARDS: usize = 16;
