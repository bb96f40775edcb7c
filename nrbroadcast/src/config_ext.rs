//! Broadcast engine settings stored in nrconfig
//!
//! The `BroadcastConfigExt` trait adds the engine's tunables to
//! `nrconfig::Config`. Missing values are written back with their default
//! the first time they are read.
//!
//! ```yaml
//! broadcast:
//!   idle_poll_ms: 1000
//!   backoff_ms: 1000
//!   sink_capacity: 256
//!   validate_crc: true
//! ```
//!
//! # Example
//!
//! ```no_run
//! use nrbroadcast::BroadcastConfigExt;
//! use nrconfig::get_config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = get_config().get_broadcast_settings()?;
//! println!("polling every {:?}", settings.idle_poll_delay);
//! # Ok(())
//! # }
//! ```

use crate::constants::{BACKOFF_MS, FRAME_INTERVAL, IDLE_POLL_MS, SINK_CAPACITY};
use anyhow::Result;
use nrconfig::{Config, impl_bool_config, impl_u64_config};
use nrogg::OggReaderOptions;
use std::time::Duration;

/// Runtime parameters shared by every broadcast loop.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Wait before polling again when nothing is scheduled
    pub idle_poll_delay: Duration,
    /// Wait after a transient failure
    pub backoff_delay: Duration,
    /// Pacing interval between two pages
    pub frame_interval: Duration,
    pub sink_capacity: usize,
    pub reader_options: OggReaderOptions,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            idle_poll_delay: Duration::from_millis(IDLE_POLL_MS),
            backoff_delay: Duration::from_millis(BACKOFF_MS),
            frame_interval: FRAME_INTERVAL,
            sink_capacity: SINK_CAPACITY,
            reader_options: OggReaderOptions::default(),
        }
    }
}

/// Broadcast settings accessors for `nrconfig::Config`
pub trait BroadcastConfigExt {
    fn get_broadcast_idle_poll_ms(&self) -> Result<u64>;
    fn set_broadcast_idle_poll_ms(&self, value: u64) -> Result<()>;

    fn get_broadcast_backoff_ms(&self) -> Result<u64>;
    fn set_broadcast_backoff_ms(&self, value: u64) -> Result<()>;

    fn get_broadcast_sink_capacity(&self) -> Result<u64>;
    fn set_broadcast_sink_capacity(&self, value: u64) -> Result<()>;

    fn get_broadcast_validate_crc(&self) -> Result<bool>;
    fn set_broadcast_validate_crc(&self, value: bool) -> Result<()>;

    /// Collects every setting into a [`BroadcastSettings`].
    fn get_broadcast_settings(&self) -> Result<BroadcastSettings>;
}

impl BroadcastConfigExt for Config {
    impl_u64_config!(
        get_broadcast_idle_poll_ms,
        set_broadcast_idle_poll_ms,
        &["broadcast", "idle_poll_ms"],
        IDLE_POLL_MS
    );
    impl_u64_config!(
        get_broadcast_backoff_ms,
        set_broadcast_backoff_ms,
        &["broadcast", "backoff_ms"],
        BACKOFF_MS
    );
    impl_u64_config!(
        get_broadcast_sink_capacity,
        set_broadcast_sink_capacity,
        &["broadcast", "sink_capacity"],
        SINK_CAPACITY as u64
    );
    impl_bool_config!(
        get_broadcast_validate_crc,
        set_broadcast_validate_crc,
        &["broadcast", "validate_crc"],
        true
    );

    fn get_broadcast_settings(&self) -> Result<BroadcastSettings> {
        let capacity = self.get_broadcast_sink_capacity()?.max(1) as usize;
        Ok(BroadcastSettings {
            idle_poll_delay: Duration::from_millis(self.get_broadcast_idle_poll_ms()?),
            backoff_delay: Duration::from_millis(self.get_broadcast_backoff_ms()?),
            frame_interval: FRAME_INTERVAL,
            sink_capacity: capacity,
            reader_options: OggReaderOptions {
                validate_crc: self.get_broadcast_validate_crc()?,
                ..OggReaderOptions::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = config(&dir).get_broadcast_settings().unwrap();

        assert_eq!(settings.idle_poll_delay, Duration::from_secs(1));
        assert_eq!(settings.backoff_delay, Duration::from_secs(1));
        assert_eq!(settings.frame_interval, Duration::from_millis(20));
        assert_eq!(settings.sink_capacity, 256);
        assert!(settings.reader_options.validate_crc);
    }

    #[test]
    fn test_values_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let config = config(&dir);
            config.set_broadcast_backoff_ms(250).unwrap();
            config.set_broadcast_validate_crc(false).unwrap();
        }

        let settings = config(&dir).get_broadcast_settings().unwrap();
        assert_eq!(settings.backoff_delay, Duration::from_millis(250));
        assert!(!settings.reader_options.validate_crc);
    }

    #[test]
    fn test_malformed_value_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        config
            .set_value(
                &["broadcast", "idle_poll_ms"],
                serde_yaml::Value::String("soon".into()),
            )
            .unwrap();

        assert_eq!(config.get_broadcast_idle_poll_ms().unwrap(), IDLE_POLL_MS);
        assert_eq!(
            config.get_value(&["broadcast", "idle_poll_ms"]).unwrap(),
            serde_yaml::Value::Number(IDLE_POLL_MS.into())
        );
    }
}
